//! Property tests for the lane scheduler and archive discovery.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use assert_fs::prelude::*;
use proptest::prelude::*;
use uzdir::core::options::ArchiveExtensions;
use uzdir::core::path_filter::PathFilter;
use uzdir::core::scheduler::{JobOutcome, lane_count, run_all};
use uzdir::infra::progress::LaneBoard;
use uzdir::infra::walk::ArchiveFinder;

proptest! {
    #![proptest_config(ProptestConfig::with_cases(48))]

    #[test]
    fn every_index_runs_exactly_once(
        total in 0usize..40,
        concurrency in 1usize..9,
        fail_mask in any::<u64>(),
    ) {
        let tasks: Vec<PathBuf> = (0..total).map(|i| PathBuf::from(format!("/in/{i}.zip"))).collect();
        let hits: Mutex<HashMap<usize, usize>> = Mutex::new(HashMap::new());
        let in_flight = AtomicUsize::new(0);
        let peak = AtomicUsize::new(0);

        let report = run_all(&tasks, concurrency, &LaneBoard::hidden(), |claim, _| {
            let now = in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            peak.fetch_max(now, Ordering::SeqCst);
            *hits.lock().unwrap().entry(claim.index).or_default() += 1;
            std::thread::sleep(Duration::from_micros(200));
            in_flight.fetch_sub(1, Ordering::SeqCst);

            if fail_mask & (1 << (claim.index % 64)) != 0 {
                JobOutcome::failed(claim.path, Duration::ZERO, "simulated")
            } else {
                JobOutcome::succeeded(claim.path, Duration::ZERO)
            }
        })
        .unwrap();

        let hits = hits.into_inner().unwrap();
        prop_assert_eq!(hits.len(), total);
        prop_assert!(hits.values().all(|n| *n == 1));
        prop_assert_eq!(report.processed + report.errors, total);
        prop_assert_eq!(report.error_paths().len(), report.errors);
        prop_assert_eq!(report.lanes, lane_count(concurrency, total));
        prop_assert!(peak.load(Ordering::SeqCst) <= concurrency);
    }

    #[test]
    fn discovery_counts_only_matching_files(
        matching in 0usize..12,
        other in 0usize..12,
        depth in 0usize..4,
    ) {
        let tmp = assert_fs::TempDir::new().unwrap();
        let mut dir = String::from("root");
        for d in 0..depth {
            dir.push_str(&format!("/level{d}"));
        }
        // Place files alternately at the top and at the deepest level
        for i in 0..matching {
            let base = if i % 2 == 0 { "root" } else { dir.as_str() };
            tmp.child(format!("{base}/archive{i}.zip")).write_str("PK").unwrap();
        }
        for i in 0..other {
            let base = if i % 2 == 0 { dir.as_str() } else { "root" };
            tmp.child(format!("{base}/file{i}.txt")).write_str("x").unwrap();
        }
        std::fs::create_dir_all(tmp.path().join("root")).unwrap();

        let finder = ArchiveFinder::new(
            PathFilter::new(None).unwrap(),
            ArchiveExtensions::parse(".zip").unwrap(),
        );
        let found = finder.find(&tmp.path().join("root")).unwrap();

        prop_assert_eq!(found.archives.len(), matching);
        prop_assert!(found.errors.is_empty());
    }
}
