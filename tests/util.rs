//! Shared test utilities for integration tests
//!
//! Fixture trees of fake archives and an in-process extractor that never
//! touches 7-Zip.

#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use assert_fs::prelude::*;
use uzdir::core::options::{ArchiveExtensions, ExtractionOptions};
use uzdir::core::sevenzip::{ExtractError, ExtractEvent, ExtractRequest, Extractor};

/// Build a tree with archives at several depths plus noise that must be
/// skipped (hidden entries, non-archive files).
pub fn make_archive_tree() -> assert_fs::TempDir
{
    let tmp = assert_fs::TempDir::new().expect("tempdir");

    for rel in [
        "in/a.zip",
        "in/b.rar",
        "in/sub/c.zip",
        "in/sub/deeper/d.ZIP",
        "in/sub/locked.zip",
    ]
    {
        tmp.child(rel)
            .write_str("PK")
            .expect("write archive");
    }

    for rel in ["in/notes.txt", "in/.hidden/e.zip", "in/.f.zip", "in/sub/g.7z"]
    {
        tmp.child(rel)
            .write_str("noise")
            .expect("write noise");
    }

    tmp
}

/// Options with sensible test defaults; tweak fields after construction.
pub fn options(
    input: &Path,
    output: &Path,
) -> ExtractionOptions
{
    ExtractionOptions {
        input_root: input.to_path_buf(),
        output_root: output.to_path_buf(),
        default_password: String::new(),
        password_map: None,
        password_map_path: None,
        archive_extensions: ArchiveExtensions::parse(".zip,.rar").expect("extensions"),
        max_concurrency: 2,
        nest_by_archive_name: true,
        ignore_patterns: None,
        filter_spec: None,
        with_log: false,
        seven_zip: PathBuf::from("7z"),
    }
}

/// One call observed by [`FakeExtractor`].
#[derive(Debug, Clone)]
pub struct Call
{
    pub archive: PathBuf,
    pub output_dir: PathBuf,
    pub password: String,
}

/// Writes `readme.txt` and `junk.url` into the output dir. Archives whose
/// file name contains `fail_marker` fail with a stderr-style detail.
pub struct FakeExtractor
{
    pub fail_marker: Option<String>,
    pub delay: Duration,
    pub calls: Mutex<Vec<Call>>,
    in_flight: AtomicUsize,
    pub peak: AtomicUsize,
}

impl FakeExtractor
{
    pub fn new() -> Self
    {
        Self {
            fail_marker: None,
            delay: Duration::ZERO,
            calls: Mutex::new(Vec::new()),
            in_flight: AtomicUsize::new(0),
            peak: AtomicUsize::new(0),
        }
    }

    pub fn failing_on(marker: &str) -> Self
    {
        Self { fail_marker: Some(marker.to_string()), ..Self::new() }
    }

    pub fn with_delay(delay: Duration) -> Self
    {
        Self { delay, ..Self::new() }
    }

    pub fn calls(&self) -> Vec<Call>
    {
        self.calls
            .lock()
            .unwrap()
            .clone()
    }
}

impl Extractor for FakeExtractor
{
    fn extract(
        &self,
        req: &ExtractRequest<'_>,
        on_event: &mut dyn FnMut(ExtractEvent),
    ) -> Result<(), ExtractError>
    {
        let now = self
            .in_flight
            .fetch_add(1, Ordering::SeqCst)
            + 1;
        self.peak
            .fetch_max(now, Ordering::SeqCst);

        self.calls
            .lock()
            .unwrap()
            .push(Call {
                archive: req
                    .archive
                    .to_path_buf(),
                output_dir: req
                    .output_dir
                    .to_path_buf(),
                password: req
                    .password
                    .to_string(),
            });

        if !self
            .delay
            .is_zero()
        {
            std::thread::sleep(self.delay);
        }

        let name = req
            .archive
            .file_name()
            .unwrap()
            .to_string_lossy()
            .into_owned();

        let result = if self
            .fail_marker
            .as_deref()
            .is_some_and(|m| name.contains(m))
        {
            Err(ExtractError::Failed { code: Some(2), stderr: format!("ERROR: {name}\nWrong password") })
        }
        else
        {
            on_event(ExtractEvent::MemberStarted("readme.txt".into()));
            on_event(ExtractEvent::Progress(100));
            std::fs::write(
                req.output_dir
                    .join("readme.txt"),
                "hello",
            )?;
            std::fs::write(
                req.output_dir
                    .join("junk.url"),
                "[InternetShortcut]",
            )?;
            on_event(ExtractEvent::Completed);
            Ok(())
        };

        self.in_flight
            .fetch_sub(1, Ordering::SeqCst);
        result
    }
}
