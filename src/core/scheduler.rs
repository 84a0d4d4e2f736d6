//! Continuous-dispatch scheduler.
//!
//! `min(concurrency, total)` lanes run on a dedicated rayon pool. Each lane
//! loops: claim the next index from a shared atomic cursor, run the job,
//! record the outcome, claim again. A lane exits once the cursor passes the
//! end of the queue, so a lane that finishes early keeps pulling work while
//! a slow job occupies another lane.

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use anyhow::{Context, Result};
use tracing::{debug, error};

use crate::infra::progress::{LaneBar, LaneBoard};

/// One claimed task, as seen by the job running it.
#[derive(Debug, Clone, Copy)]
pub struct Claim<'a> {
    /// Zero-based position in the task queue
    pub index: usize,
    pub total: usize,
    /// Zero-based lane id
    pub lane: usize,
    /// Lane count for this run
    pub lanes: usize,
    pub path: &'a Path,
}

/// Result of one job. Produced exactly once per task.
#[derive(Debug, Clone)]
pub struct JobOutcome {
    pub archive_path: PathBuf,
    pub success: bool,
    pub duration: Duration,
    pub error_detail: Option<String>,
    /// Post-extraction deletions that failed; the job itself still succeeded
    pub filter_failures: Vec<String>,
}

impl JobOutcome {
    pub fn succeeded(archive_path: impl Into<PathBuf>, duration: Duration) -> Self {
        Self {
            archive_path: archive_path.into(),
            success: true,
            duration,
            error_detail: None,
            filter_failures: Vec::new(),
        }
    }

    pub fn with_filter_failures(mut self, failures: Vec<String>) -> Self {
        self.filter_failures = failures;
        self
    }

    pub fn failed(
        archive_path: impl Into<PathBuf>,
        duration: Duration,
        detail: impl Into<String>,
    ) -> Self {
        Self {
            archive_path: archive_path.into(),
            success: false,
            duration,
            error_detail: Some(detail.into()),
            filter_failures: Vec::new(),
        }
    }
}

/// Aggregate of a finished run. Outcomes are in completion order.
#[derive(Debug, Default)]
pub struct RunReport {
    pub processed: usize,
    pub errors: usize,
    pub lanes: usize,
    pub outcomes: Vec<JobOutcome>,
}

impl RunReport {
    fn from_outcomes(outcomes: Vec<JobOutcome>, lanes: usize) -> Self {
        let processed = outcomes.iter().filter(|o| o.success).count();
        Self {
            processed,
            errors: outcomes.len() - processed,
            lanes,
            outcomes,
        }
    }

    /// Failed archives in the order their failures were recorded.
    pub fn error_paths(&self) -> Vec<&Path> {
        self.outcomes
            .iter()
            .filter(|o| !o.success)
            .map(|o| o.archive_path.as_path())
            .collect()
    }

    pub fn total(&self) -> usize {
        self.processed + self.errors
    }

    /// Successful archives whose post-extraction filter left something behind.
    pub fn filter_warnings(&self) -> Vec<&JobOutcome> {
        self.outcomes
            .iter()
            .filter(|o| !o.filter_failures.is_empty())
            .collect()
    }
}

/// Number of lanes a run of `total` tasks gets.
pub fn lane_count(concurrency: usize, total: usize) -> usize {
    concurrency.max(1).min(total)
}

/// Run `work` once for every task, at most `concurrency` at a time.
///
/// A job that panics is recorded as failed; it never takes its lane or its
/// siblings down with it.
pub fn run_all<F>(
    tasks: &[PathBuf],
    concurrency: usize,
    board: &LaneBoard,
    work: F,
) -> Result<RunReport>
where
    F: Fn(Claim<'_>, &LaneBar) -> JobOutcome + Sync,
{
    let total = tasks.len();
    let lanes = lane_count(concurrency, total);
    if lanes == 0 {
        return Ok(RunReport::default());
    }

    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(lanes)
        .thread_name(|i| format!("uzdir-lane-{}", i + 1))
        .build()
        .context("Failed to build lane pool")?;

    let cursor = AtomicUsize::new(0);
    let log: Mutex<Vec<JobOutcome>> = Mutex::new(Vec::with_capacity(total));

    pool.scope(|s| {
        for lane in 0..lanes {
            let bar = board.add_lane();
            let (work, cursor, log) = (&work, &cursor, &log);
            s.spawn(move |_| {
                run_lane(lane, lanes, tasks, cursor, log, &bar, work);
                bar.finish();
            });
        }
    });

    let outcomes = log.into_inner().unwrap_or_else(PoisonError::into_inner);
    Ok(RunReport::from_outcomes(outcomes, lanes))
}

fn run_lane<F>(
    lane: usize,
    lanes: usize,
    tasks: &[PathBuf],
    cursor: &AtomicUsize,
    log: &Mutex<Vec<JobOutcome>>,
    bar: &LaneBar,
    work: &F,
) where
    F: Fn(Claim<'_>, &LaneBar) -> JobOutcome + Sync,
{
    let total = tasks.len();
    loop {
        let index = cursor.fetch_add(1, Ordering::SeqCst);
        if index >= total {
            break;
        }
        let path = tasks[index].as_path();
        let claim = Claim {
            index,
            total,
            lane,
            lanes,
            path,
        };

        let outcome = panic::catch_unwind(AssertUnwindSafe(|| work(claim, bar)))
            .unwrap_or_else(|payload| {
                let detail = panic_message(payload.as_ref());
                error!(lane = lane + 1, "job for {} panicked: {detail}", path.display());
                JobOutcome::failed(path, Duration::ZERO, detail)
            });

        log.lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(outcome);
    }
    debug!(lane = lane + 1, "lane drained");
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        format!("panic: {s}")
    } else if let Some(s) = payload.downcast_ref::<String>() {
        format!("panic: {s}")
    } else {
        "panic".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicBool;
    use std::time::Instant;

    fn tasks(n: usize) -> Vec<PathBuf> {
        (0..n).map(|i| PathBuf::from(format!("/in/{i}.zip"))).collect()
    }

    #[test]
    fn empty_queue_returns_immediately() {
        let report = run_all(&[], 4, &LaneBoard::hidden(), |_, _| {
            panic!("no job should run")
        })
        .unwrap();
        assert_eq!(report.total(), 0);
        assert_eq!(report.lanes, 0);
    }

    #[test]
    fn lane_count_is_bounded_by_tasks() {
        assert_eq!(lane_count(8, 3), 3);
        assert_eq!(lane_count(2, 10), 2);
        assert_eq!(lane_count(0, 10), 1);
        assert_eq!(lane_count(4, 0), 0);
    }

    #[test]
    fn failures_do_not_stop_the_queue() {
        let tasks = tasks(10);
        let report = run_all(&tasks, 3, &LaneBoard::hidden(), |claim, _| {
            if claim.index % 3 == 0 {
                JobOutcome::failed(claim.path, Duration::ZERO, "boom")
            } else {
                JobOutcome::succeeded(claim.path, Duration::ZERO)
            }
        })
        .unwrap();

        assert_eq!(report.total(), 10);
        assert_eq!(report.errors, 4);
        let mut failed: Vec<_> = report.error_paths().into_iter().map(Path::to_path_buf).collect();
        failed.sort();
        assert_eq!(
            failed,
            vec![
                PathBuf::from("/in/0.zip"),
                PathBuf::from("/in/3.zip"),
                PathBuf::from("/in/6.zip"),
                PathBuf::from("/in/9.zip"),
            ]
        );
    }

    #[test]
    fn panicking_job_is_recorded_as_failure() {
        let tasks = tasks(4);
        let report = run_all(&tasks, 2, &LaneBoard::hidden(), |claim, _| {
            if claim.index == 1 {
                panic!("bad archive");
            }
            JobOutcome::succeeded(claim.path, Duration::ZERO)
        })
        .unwrap();

        assert_eq!(report.processed, 3);
        assert_eq!(report.errors, 1);
        let failed = report.outcomes.iter().find(|o| !o.success).unwrap();
        assert_eq!(failed.error_detail.as_deref(), Some("panic: bad archive"));
    }

    #[test]
    fn fast_lane_keeps_pulling_while_slow_job_runs() {
        // Task 0 blocks until every other task has finished. With fixed
        // batching this would deadlock; with continuous dispatch lane two
        // drains the rest of the queue.
        let tasks = tasks(6);
        let others_done = AtomicUsize::new(0);
        let released = AtomicBool::new(false);

        let report = run_all(&tasks, 2, &LaneBoard::hidden(), |claim, _| {
            if claim.index == 0 {
                let deadline = Instant::now() + Duration::from_secs(10);
                while others_done.load(Ordering::SeqCst) < 5 && Instant::now() < deadline {
                    std::thread::sleep(Duration::from_millis(2));
                }
                released.store(others_done.load(Ordering::SeqCst) == 5, Ordering::SeqCst);
            } else {
                others_done.fetch_add(1, Ordering::SeqCst);
            }
            JobOutcome::succeeded(claim.path, Duration::ZERO)
        })
        .unwrap();

        assert_eq!(report.processed, 6);
        assert!(released.load(Ordering::SeqCst));
    }
}
