//! End-of-run report.

use std::fmt::Write as _;
use std::path::PathBuf;
use std::time::Duration;

use chrono::{DateTime, Local};
use owo_colors::OwoColorize;

use crate::core::scheduler::RunReport;
use crate::infra::logging::LogFiles;
use crate::infra::utils::TimeUtils;

const TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

#[derive(Debug, Clone)]
pub struct RunSummary {
    pub processed: usize,
    pub errors: usize,
    pub error_paths: Vec<PathBuf>,
    /// `archive: path: reason` for each failed post-extraction deletion
    pub filter_warnings: Vec<String>,
    pub started: DateTime<Local>,
    pub finished: DateTime<Local>,
    pub log_files: Option<LogFiles>,
}

impl RunSummary {
    pub fn new(
        report: &RunReport,
        started: DateTime<Local>,
        finished: DateTime<Local>,
        log_files: Option<LogFiles>,
    ) -> Self {
        Self {
            processed: report.processed,
            errors: report.errors,
            error_paths: report
                .error_paths()
                .into_iter()
                .map(|p| p.to_path_buf())
                .collect(),
            filter_warnings: report
                .filter_warnings()
                .into_iter()
                .flat_map(|o| {
                    o.filter_failures
                        .iter()
                        .map(move |f| format!("{}: {f}", o.archive_path.display()))
                })
                .collect(),
            started,
            finished,
            log_files,
        }
    }

    pub fn duration(&self) -> Duration {
        (self.finished - self.started).to_std().unwrap_or_default()
    }

    pub fn render(&self, color: bool) -> String {
        let mut out = String::new();
        let ok = format!("Succeeded: {}", self.processed);
        let failed = format!("Failed: {}", self.errors);

        if color {
            let _ = writeln!(out, "{}", "Extraction finished".bold());
            let _ = writeln!(out, "  {}", ok.green());
            if self.errors > 0 {
                let _ = writeln!(out, "  {}", failed.red());
            } else {
                let _ = writeln!(out, "  {failed}");
            }
        } else {
            let _ = writeln!(out, "Extraction finished");
            let _ = writeln!(out, "  {ok}");
            let _ = writeln!(out, "  {failed}");
        }

        if !self.error_paths.is_empty() {
            let _ = writeln!(out, "  Failed archives:");
            for (i, path) in self.error_paths.iter().enumerate() {
                let _ = writeln!(out, "    {}. {}", i + 1, path.display());
            }
        }

        if !self.filter_warnings.is_empty() {
            let _ = writeln!(out, "  Filter deletions that failed:");
            for line in &self.filter_warnings {
                let _ = writeln!(out, "    - {line}");
            }
        }

        if let Some(files) = &self.log_files {
            let _ = writeln!(out, "  Log:       {}", files.all.display());
            if self.errors > 0 || !self.filter_warnings.is_empty() {
                let _ = writeln!(out, "  Error log: {}", files.errors.display());
            }
        }

        let _ = writeln!(out, "  Started:   {}", self.started.format(TIME_FORMAT));
        let _ = writeln!(out, "  Finished:  {}", self.finished.format(TIME_FORMAT));
        let _ = write!(out, "  Duration:  {}", TimeUtils::format_hms(self.duration()));
        out
    }
}
