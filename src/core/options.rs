//! Run configuration resolved once, before any discovery or scheduling.
//!
//! CLI flags win over environment/config-file defaults, which win over the
//! built-in defaults. The result is immutable for the rest of the run.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use crate::cli::ExtractArgs;
use crate::core::password::PasswordMap;
use crate::infra::config::Config;
use crate::infra::utils::ListUtils;

pub const DEFAULT_ARCHIVE_EXTENSIONS: &str = ".zip,.rar";

/// Fatal problems found before any archive is touched.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("input path does not exist: {0}")]
    InputMissing(PathBuf),

    #[error("not a valid archive: {0}")]
    NotAnArchive(PathBuf),

    #[error("failed to read password map {path}")]
    PasswordMapRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid password map {path}: expected a JSON object of strings")]
    PasswordMapParse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("invalid boolean flag value: {0:?}")]
    InvalidFlag(String),

    #[error("no archive extensions configured")]
    NoExtensions,

    #[error("cannot resolve path {path}")]
    Path {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Parse a user-facing boolean. Accepts the usual spellings and the
/// falsy words older front-ends pass through (`""`, `null`, `undefined`).
pub fn parse_flag(raw: &str) -> Result<bool, ConfigError> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Ok(true),
        "false" | "0" | "no" | "off" | "" | "null" | "undefined" => Ok(false),
        _ => Err(ConfigError::InvalidFlag(raw.to_string())),
    }
}

/// clap `value_parser` adapter for [`parse_flag`].
pub fn clap_flag(raw: &str) -> Result<bool, String> {
    parse_flag(raw).map_err(|e| e.to_string())
}

/// Case-insensitive set of archive extensions, each stored as `.ext`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchiveExtensions {
    exts: BTreeSet<String>,
}

impl ArchiveExtensions {
    pub fn parse(raw: &str) -> Result<Self, ConfigError> {
        let exts: BTreeSet<String> = ListUtils::split(raw)
            .into_iter()
            .map(|t| {
                let lower = t.to_lowercase();
                if lower.starts_with('.') {
                    lower
                } else {
                    format!(".{lower}")
                }
            })
            .collect();

        if exts.is_empty() {
            return Err(ConfigError::NoExtensions);
        }
        Ok(Self { exts })
    }

    pub fn matches(&self, path: &Path) -> bool {
        path.extension()
            .map(|e| format!(".{}", e.to_string_lossy().to_lowercase()))
            .is_some_and(|e| self.exts.contains(&e))
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.exts.iter().map(String::as_str)
    }
}

impl std::fmt::Display for ArchiveExtensions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let joined = self.iter().collect::<Vec<_>>().join(",");
        f.write_str(&joined)
    }
}

/// Immutable options for one run.
#[derive(Debug, Clone)]
pub struct ExtractionOptions {
    pub input_root: PathBuf,
    pub output_root: PathBuf,
    pub default_password: String,
    pub password_map: Option<PasswordMap>,
    pub password_map_path: Option<PathBuf>,
    pub archive_extensions: ArchiveExtensions,
    pub max_concurrency: usize,
    pub nest_by_archive_name: bool,
    pub ignore_patterns: Option<String>,
    pub filter_spec: Option<String>,
    pub with_log: bool,
    pub seven_zip: PathBuf,
}

impl ExtractionOptions {
    /// Merge CLI args over file/env defaults and validate the result.
    pub fn resolve(args: &ExtractArgs, defaults: &Config) -> Result<Self, ConfigError> {
        let input_root = absolutize(&args.input)?;
        if !input_root.exists() {
            return Err(ConfigError::InputMissing(input_root));
        }
        let input_root = dunce::canonicalize(&input_root).map_err(|source| ConfigError::Path {
            path: input_root.clone(),
            source,
        })?;
        let output_root = absolutize(&args.output)?;

        let password_map_path = args
            .password_map
            .as_deref()
            .or(defaults.password_map.as_deref())
            .map(absolutize)
            .transpose()?;
        let password_map = password_map_path
            .as_deref()
            .map(PasswordMap::load)
            .transpose()?;

        let formats = args
            .zip_format
            .as_deref()
            .or(defaults.zip_format.as_deref())
            .unwrap_or(DEFAULT_ARCHIVE_EXTENSIONS);

        let max_concurrency = args
            .max_concurrency
            .or(defaults.max_concurrency)
            .filter(|n| *n > 0)
            .unwrap_or_else(cpu_count);

        Ok(Self {
            input_root,
            output_root,
            default_password: args
                .password
                .clone()
                .or_else(|| defaults.password.clone())
                .unwrap_or_default(),
            password_map,
            password_map_path,
            archive_extensions: ArchiveExtensions::parse(formats)?,
            max_concurrency,
            nest_by_archive_name: args.fullpath.or(defaults.fullpath).unwrap_or(true),
            ignore_patterns: non_empty(args.ignore.clone().or_else(|| defaults.ignore.clone())),
            filter_spec: non_empty(args.filter.clone().or_else(|| defaults.filter.clone())),
            with_log: args.log || defaults.log.unwrap_or(false),
            seven_zip: args
                .seven_zip
                .clone()
                .or_else(|| defaults.seven_zip.clone())
                .unwrap_or_else(|| PathBuf::from("7z")),
        })
    }
}

fn non_empty(s: Option<String>) -> Option<String> {
    s.filter(|v| !v.trim().is_empty())
}

pub fn cpu_count() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1)
}

/// Expand `~`/`$VAR` and make absolute without requiring existence.
pub fn absolutize(path: &Path) -> Result<PathBuf, ConfigError> {
    let raw = path.to_string_lossy();
    let expanded = shellexpand::full(&raw)
        .map(|c| PathBuf::from(c.as_ref()))
        .unwrap_or_else(|_| path.to_path_buf());

    std::path::absolute(&expanded).map_err(|source| ConfigError::Path {
        path: expanded,
        source,
    })
}
