//! **uzdir** - Concurrent batch extractor for directory trees of archives
//!
//! Finds every archive under a root, extracts each through 7-Zip with a
//! per-file password, strips unwanted members, and reports what failed.
//! A fixed number of lanes pull jobs continuously from one shared queue.

/// Command-line interface with clap integration
pub mod cli;

/// Shell completion generation
pub mod completion;

/// Extraction pipeline - discovery inputs, per-archive jobs, scheduling
pub mod core {
    /// Run orchestration and the per-archive job
    pub mod extract;
    pub use extract::run as extract_run;

    /// Resolved run options and the typed boolean parser
    pub mod options;
    pub use options::{ConfigError, ExtractionOptions, parse_flag};

    /// Entry-name filter applied during discovery
    pub mod path_filter;
    pub use path_filter::PathFilter;

    /// Ordered password map and the resolution cascade
    pub mod password;
    pub use password::{PasswordMap, PasswordResolver};

    /// Destination directory derivation
    pub mod output;

    /// Post-extraction removal of unwanted members
    pub mod post_filter;

    /// Extractor trait and the 7-Zip process backend
    pub mod sevenzip;
    pub use sevenzip::{ExtractError, ExtractEvent, ExtractRequest, Extractor, SevenZip};

    /// Continuous-dispatch lane scheduler
    pub mod scheduler;
    pub use scheduler::{Claim, JobOutcome, RunReport};

    /// End-of-run report
    pub mod summary;
    pub use summary::RunSummary;
}

/// Infrastructure - Configuration, logging, walking, progress, utilities
pub mod infra {
    /// Configuration management with TOML support and UZDIR_ env overrides
    pub mod config;
    pub use config::{Config, init as config_init, load_config};

    /// tracing subscriber with optional run log files
    pub mod logging;

    /// Per-lane indicatif progress bars
    pub mod progress;

    /// Archive discovery over an ignore-free directory walk
    pub mod walk;
    pub use walk::ArchiveFinder;

    /// Utility functions and helpers for common operations
    pub mod utils;
}

// Strategic re-exports for clean CLI interface
pub use cli::{AppContext, Cli, Commands};
pub use core::extract_run;
pub use infra::{ArchiveFinder, Config, load_config};
