//! 7-Zip process integration for archive extraction
//!
//! Runs one `7z` child per archive and turns its switch-driven console output
//! (`-bsp1` progress, `-bb1` member names) into [`ExtractEvent`]s. Stderr is
//! kept and surfaced as the failure detail.

use std::ffi::OsString;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::process::{Command, ExitStatus, Stdio};
use std::sync::LazyLock;

use regex::Regex;

use crate::infra::utils::TextUtils;

/// One extraction request handed to an [`Extractor`].
#[derive(Debug, Clone, Copy)]
pub struct ExtractRequest<'a> {
    pub archive: &'a Path,
    pub output_dir: &'a Path,
    pub password: &'a str,
    /// Keep the archive's internal directory structure (`x`) instead of
    /// flattening every member into `output_dir` (`e`).
    pub preserve_full_paths: bool,
}

/// Progress notifications emitted while an extraction runs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExtractEvent {
    MemberStarted(String),
    Progress(u8),
    Completed,
}

#[derive(Debug, thiserror::Error)]
pub enum ExtractError {
    #[error("failed to launch {program}: {source}")]
    Spawn {
        program: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("{}", failure_message(.code, .stderr))]
    Failed { code: Option<i32>, stderr: String },

    #[error("i/o error while reading extractor output: {0}")]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    Other(String),
}

fn failure_message(code: &Option<i32>, stderr: &str) -> String {
    let detail = TextUtils::one_line(stderr);
    match (*code, detail.is_empty()) {
        (_, false) => detail,
        (Some(c), true) => format!("extractor exited with code {c}"),
        (None, true) => "extractor terminated by signal".to_string(),
    }
}

impl ExtractError {
    /// Human-facing detail, preferring whatever diagnostic text the tool gave.
    pub fn detail(&self) -> String {
        self.to_string()
    }
}

/// Extraction backend. Implementations block until the archive is done and
/// report intermediate events through `on_event`.
pub trait Extractor: Send + Sync {
    fn extract(
        &self,
        request: &ExtractRequest<'_>,
        on_event: &mut dyn FnMut(ExtractEvent),
    ) -> Result<(), ExtractError>;
}

/// `7z` / `7zz` / `7za` command-line backend.
#[derive(Debug, Clone)]
pub struct SevenZip {
    program: PathBuf,
}

impl SevenZip {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
        }
    }

    pub fn program(&self) -> &Path {
        &self.program
    }

    fn command(&self, req: &ExtractRequest<'_>) -> Command {
        let mut cmd = Command::new(&self.program);
        cmd.arg(if req.preserve_full_paths { "x" } else { "e" });
        cmd.arg(req.archive);
        let mut out_flag = OsString::from("-o");
        out_flag.push(req.output_dir.as_os_str());
        cmd.arg(out_flag);
        // Always pass -p so a missing password fails instead of prompting
        cmd.arg(format!("-p{}", req.password));
        cmd.args(["-y", "-bsp1", "-bb1", "-bse2"]);

        cmd.stdin(Stdio::null());
        cmd.stdout(Stdio::piped());
        cmd.stderr(Stdio::piped());
        cmd
    }
}

impl Default for SevenZip {
    fn default() -> Self {
        Self::new("7z")
    }
}

impl Extractor for SevenZip {
    fn extract(
        &self,
        request: &ExtractRequest<'_>,
        on_event: &mut dyn FnMut(ExtractEvent),
    ) -> Result<(), ExtractError> {
        let mut child = self
            .command(request)
            .spawn()
            .map_err(|source| ExtractError::Spawn {
                program: self.program.clone(),
                source,
            })?;

        let mut stdout = child
            .stdout
            .take()
            .ok_or_else(|| ExtractError::Other("extractor stdout not captured".into()))?;
        let mut stderr = child
            .stderr
            .take()
            .ok_or_else(|| ExtractError::Other("extractor stderr not captured".into()))?;

        // Drain stderr on its own thread so a chatty child cannot block on a full pipe
        let err_reader = std::thread::spawn(move || {
            let mut buf = Vec::new();
            let _ = stderr.read_to_end(&mut buf);
            String::from_utf8_lossy(&buf).into_owned()
        });

        let mut parser = OutputParser::default();
        let read_result = pump(&mut stdout, &mut parser, on_event);
        let stderr_text = err_reader.join().unwrap_or_default();

        let status = child.wait()?;
        read_result?;
        finish(status, stderr_text, on_event)
    }
}

fn pump(
    stdout: &mut impl Read,
    parser: &mut OutputParser,
    on_event: &mut dyn FnMut(ExtractEvent),
) -> std::io::Result<()> {
    let mut chunk = [0u8; 8 * 1024];
    loop {
        let n = stdout.read(&mut chunk)?;
        if n == 0 {
            parser.flush(on_event);
            return Ok(());
        }
        parser.feed(&chunk[..n], on_event);
    }
}

fn finish(
    status: ExitStatus,
    stderr: String,
    on_event: &mut dyn FnMut(ExtractEvent),
) -> Result<(), ExtractError> {
    if status.success() {
        on_event(ExtractEvent::Completed);
        Ok(())
    } else {
        Err(ExtractError::Failed {
            code: status.code(),
            stderr,
        })
    }
}

static PERCENT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(\d{1,3})%(?:\s+\d+)?(?:\s+-\s+(.+))?$").unwrap());

/// Incremental splitter for 7z console output. Progress redraws use `\r`
/// or backspaces rather than newlines, so all three end a segment.
#[derive(Debug, Default)]
pub struct OutputParser {
    pending: Vec<u8>,
    last_percent: Option<u8>,
    last_member: Option<String>,
}

impl OutputParser {
    pub fn feed(&mut self, bytes: &[u8], on_event: &mut dyn FnMut(ExtractEvent)) {
        let mut rest = bytes;
        while let Some(pos) = memchr::memchr3(b'\n', b'\r', 0x08, rest) {
            self.pending.extend_from_slice(&rest[..pos]);
            self.emit_pending(on_event);
            rest = &rest[pos + 1..];
        }
        self.pending.extend_from_slice(rest);
    }

    pub fn flush(&mut self, on_event: &mut dyn FnMut(ExtractEvent)) {
        self.emit_pending(on_event);
    }

    fn emit_pending(&mut self, on_event: &mut dyn FnMut(ExtractEvent)) {
        if self.pending.is_empty() {
            return;
        }
        let line = String::from_utf8_lossy(&self.pending).trim().to_string();
        self.pending.clear();
        if line.is_empty() {
            return;
        }

        if let Some(name) = line.strip_prefix("- ") {
            self.member(name.trim(), on_event);
            return;
        }

        if let Some(caps) = PERCENT.captures(&line) {
            if let Some(pct) = caps.get(1).and_then(|m| m.as_str().parse::<u8>().ok()) {
                let pct = pct.min(100);
                if self.last_percent != Some(pct) {
                    self.last_percent = Some(pct);
                    on_event(ExtractEvent::Progress(pct));
                }
            }
            if let Some(name) = caps.get(2) {
                self.member(name.as_str().trim(), on_event);
            }
        }
    }

    fn member(&mut self, name: &str, on_event: &mut dyn FnMut(ExtractEvent)) {
        // Progress redraws repeat the current member name
        if name.is_empty() || self.last_member.as_deref() == Some(name) {
            return;
        }
        self.last_member = Some(name.to_string());
        on_event(ExtractEvent::MemberStarted(name.to_string()));
    }
}
