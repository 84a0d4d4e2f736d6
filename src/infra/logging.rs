//! Tracing subscriber setup.
//!
//! Console output goes to stderr under an `EnvFilter` (`RUST_LOG`, default
//! `warn`). Extraction runs also write two plain-text files, one with every
//! event from this crate and one with errors only. They live in
//! `~/.uzdir/logs`, or in the output root with `--log`.

use std::fs::{File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use anyhow::{Context, Result};
use chrono::{Datelike, Local, NaiveDate};
use indicatif::MultiProgress;
use tracing::debug;
use tracing_subscriber::filter::{LevelFilter, Targets};
use tracing_subscriber::fmt::MakeWriter;
use tracing_subscriber::fmt::time::ChronoLocal;
use tracing_subscriber::prelude::*;
use tracing_subscriber::{EnvFilter, fmt};

const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.3f";

const DEFAULT_LOG_DIR: &str = "~/.uzdir/logs";

/// Paths of the two run log files.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogFiles {
    pub all: PathBuf,
    pub errors: PathBuf,
}

impl LogFiles {
    /// `__uzdir-YYYY-M-D.log` and `__uzdir-YYYY-M-D.error.log` (no zero padding).
    pub fn for_date(dir: &Path, date: NaiveDate) -> Self {
        let stem = format!("__uzdir-{}-{}-{}", date.year(), date.month(), date.day());
        Self {
            all: dir.join(format!("{stem}.log")),
            errors: dir.join(format!("{stem}.error.log")),
        }
    }

    pub fn today(dir: &Path) -> Self {
        Self::for_date(dir, Local::now().date_naive())
    }

    /// `~/.uzdir/logs`, or `None` when the home directory is unknown.
    pub fn default_dir() -> Option<PathBuf> {
        let expanded = shellexpand::tilde(DEFAULT_LOG_DIR);
        (!expanded.starts_with('~')).then(|| PathBuf::from(expanded.as_ref()))
    }

    /// Where a run's logs go: the output root with `--log`, else the default dir.
    pub fn location(with_log: bool, output_root: &Path) -> Option<PathBuf> {
        if with_log {
            Some(output_root.to_path_buf())
        } else {
            Self::default_dir()
        }
    }
}

fn open_append(path: &Path) -> Result<File> {
    OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .with_context(|| format!("Failed to open log file {}", path.display()))
}

/// Console sink that hides the lane bars while a log line is written.
struct BarAwareStderr {
    bars: Option<MultiProgress>,
}

impl<'a> MakeWriter<'a> for BarAwareStderr {
    type Writer = BarLine<'a, io::Stderr>;

    fn make_writer(&'a self) -> Self::Writer {
        BarLine::new(self.bars.as_ref(), io::stderr())
    }
}

/// Buffers one formatted event and emits it in a single write on drop.
struct BarLine<'a, W: Write> {
    bars: Option<&'a MultiProgress>,
    sink: W,
    buf: Vec<u8>,
}

impl<'a, W: Write> BarLine<'a, W> {
    fn new(bars: Option<&'a MultiProgress>, sink: W) -> Self {
        Self {
            bars,
            sink,
            buf: Vec::new(),
        }
    }
}

impl<W: Write> Write for BarLine<'_, W> {
    fn write(&mut self, data: &[u8]) -> io::Result<usize> {
        self.buf.extend_from_slice(data);
        Ok(data.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl<W: Write> Drop for BarLine<'_, W> {
    fn drop(&mut self) {
        if self.buf.is_empty() {
            return;
        }
        let buf = std::mem::take(&mut self.buf);
        let sink = &mut self.sink;
        // Nowhere left to report a failed stderr write
        let _ = match self.bars {
            Some(mp) => mp.suspend(|| sink.write_all(&buf)),
            None => sink.write_all(&buf),
        };
    }
}

/// Install the global subscriber. A second call in the same process is a
/// no-op, so commands can call this unconditionally.
///
/// Pass the run's `MultiProgress` as `bars` when lane bars may be on screen.
pub fn init(
    verbose: bool,
    color: bool,
    files: Option<&LogFiles>,
    bars: Option<MultiProgress>,
) -> Result<()> {
    let default_directive = if verbose { "uzdir=debug,warn" } else { "warn" };
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directive));

    let console = fmt::layer()
        .with_writer(BarAwareStderr { bars })
        .with_target(false)
        .with_ansi(color)
        .with_filter(env_filter);

    let (all_layer, error_layer) = match files {
        Some(files) => {
            if let Some(dir) = files.all.parent() {
                std::fs::create_dir_all(dir)
                    .with_context(|| format!("Failed to create log dir {}", dir.display()))?;
            }
            let all = fmt::layer()
                .with_writer(Mutex::new(open_append(&files.all)?))
                .with_ansi(false)
                .with_target(false)
                .with_timer(ChronoLocal::new(TIMESTAMP_FORMAT.to_string()))
                .with_filter(Targets::new().with_target("uzdir", LevelFilter::DEBUG));
            let errors = fmt::layer()
                .with_writer(Mutex::new(open_append(&files.errors)?))
                .with_ansi(false)
                .with_target(false)
                .with_timer(ChronoLocal::new(TIMESTAMP_FORMAT.to_string()))
                .with_filter(Targets::new().with_target("uzdir", LevelFilter::ERROR));
            (Some(all), Some(errors))
        }
        None => (None, None),
    };

    if tracing_subscriber::registry()
        .with(console)
        .with(all_layer)
        .with(error_layer)
        .try_init()
        .is_err()
    {
        debug!("tracing subscriber already installed");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn log_names_are_unpadded() {
        let date = NaiveDate::from_ymd_opt(2024, 3, 7).unwrap();
        let files = LogFiles::for_date(Path::new("/out"), date);
        assert_eq!(files.all, PathBuf::from("/out/__uzdir-2024-3-7.log"));
        assert_eq!(files.errors, PathBuf::from("/out/__uzdir-2024-3-7.error.log"));
    }

    #[test]
    fn log_flag_moves_files_into_output_root() {
        let out = Path::new("/data/out");
        assert_eq!(LogFiles::location(true, out), Some(out.to_path_buf()));
        if let Some(dir) = LogFiles::location(false, out) {
            assert!(dir.ends_with(".uzdir/logs"), "{}", dir.display());
        }
    }

    #[test]
    fn console_line_is_written_whole_with_bars_active() {
        let mp = MultiProgress::with_draw_target(indicatif::ProgressDrawTarget::hidden());
        let bar = mp.add(indicatif::ProgressBar::new(100));
        let mut out = Vec::new();

        {
            let mut line = BarLine::new(Some(&mp), &mut out);
            write!(line, "ERROR (lane 1)[1/2] ").unwrap();
            writeln!(line, "failed: a.zip").unwrap();
        }

        assert_eq!(out, b"ERROR (lane 1)[1/2] failed: a.zip\n");
        assert!(!bar.is_finished());
    }

    #[test]
    fn empty_event_writes_nothing() {
        let mut out = Vec::new();
        drop(BarLine::new(None, &mut out));
        assert!(out.is_empty());
    }
}
