use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

use crate::core::options::clap_flag;

/// Shared application context for global flags
#[derive(Clone, Debug, Default)]
pub struct AppContext {
    pub quiet: bool,    // global --quiet
    pub no_color: bool, // global --no-color
    pub dry_run: bool,  // global --dry-run
    pub verbose: bool,  // global --verbose
}

#[derive(Parser)]
#[command(name = "uzdir")]
#[command(
    about = "Batch-extract every archive under a directory tree, concurrently, with per-file passwords"
)]
#[command(version, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Disable colored output
    #[arg(long, global = true)]
    pub no_color: bool,

    /// Suppress progress bars and non-essential output
    #[arg(long, global = true)]
    pub quiet: bool,

    /// Show what would be done without executing
    #[arg(long, global = true)]
    pub dry_run: bool,

    /// Debug-level console logging
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

impl Cli {
    pub fn context(&self) -> AppContext {
        AppContext {
            quiet: self.quiet,
            no_color: self.no_color,
            dry_run: self.dry_run,
            verbose: self.verbose,
        }
    }
}

#[derive(Subcommand)]
pub enum Commands {
    /// Extract all archives found under a directory (or a single archive)
    Extract(ExtractArgs),

    /// Write a password map JSON file from KEY=PASSWORD pairs
    PasswordMap(PasswordMapArgs),

    /// Initialize a uzdir.toml config file
    Init(InitArgs),

    /// Generate shell completions
    Completions(CompletionsArgs),
}

#[derive(Args, Debug, Clone)]
pub struct ExtractArgs {
    /// Directory to scan, or a single archive
    #[arg(short, long)]
    pub input: PathBuf,

    /// Output root directory
    #[arg(short, long)]
    pub output: PathBuf,

    /// Default password for archives without a password-map entry
    #[arg(short, long)]
    pub password: Option<String>,

    /// Paths or globs to delete after extraction, comma separated (e.g. "__MACOSX,*.url")
    #[arg(long)]
    pub filter: Option<String>,

    /// Maximum concurrent extractions (0 = CPU count)
    #[arg(long)]
    pub max_concurrency: Option<usize>,

    /// Archive extensions, comma separated (default: .zip,.rar)
    #[arg(long)]
    pub zip_format: Option<String>,

    /// JSON object mapping path / path fragment / file name / extension to password
    #[arg(long)]
    pub password_map: Option<PathBuf>,

    /// Entry names to skip during discovery, comma separated; * and ? are wildcards
    #[arg(long)]
    pub ignore: Option<String>,

    /// Write log files into the output directory
    #[arg(long)]
    pub log: bool,

    /// Nest each archive's contents under a directory named after it (true/false)
    #[arg(long, value_name = "FLAG", value_parser = clap_flag)]
    pub fullpath: Option<bool>,

    /// 7-Zip executable (7z, 7zz, 7za or a full path)
    #[arg(long, value_name = "PATH")]
    pub seven_zip: Option<PathBuf>,
}

#[derive(Args, Debug, Clone)]
pub struct PasswordMapArgs {
    /// KEY=PASSWORD entries, in match order
    #[arg(required = true, value_name = "KEY=PASSWORD")]
    pub entries: Vec<String>,

    /// File to write
    #[arg(short, long, default_value = "password-map.json")]
    pub output: PathBuf,

    /// Overwrite an existing file
    #[arg(long)]
    pub force: bool,
}

#[derive(Parser)]
pub struct InitArgs {
    /// Directory to initialize config in
    #[arg(default_value = ".")]
    pub path: PathBuf,

    /// Overwrite existing config file
    #[arg(long)]
    pub force: bool,
}

#[derive(Parser)]
pub struct CompletionsArgs {
    /// Target shell
    #[arg(value_enum)]
    pub shell: clap_complete::Shell,

    /// Write the script into this directory instead of stdout
    #[arg(long, conflicts_with = "stdout")]
    pub out_dir: Option<PathBuf>,

    /// Print the script to stdout (the default without --out-dir)
    #[arg(long)]
    pub stdout: bool,
}
