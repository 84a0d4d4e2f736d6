//! Batch extraction: discovery, scheduling and the end-of-run summary.

pub mod job;

pub use job::{JobContext, job_title};

use std::path::PathBuf;

use anyhow::{Context, Result};
use chrono::Local;
use owo_colors::OwoColorize;
use tracing::{info, warn};

use crate::cli::{AppContext, ExtractArgs};
use crate::core::options::ExtractionOptions;
use crate::core::output;
use crate::core::password::PasswordResolver;
use crate::core::path_filter::PathFilter;
use crate::core::scheduler::{self, lane_count};
use crate::core::sevenzip::{Extractor, SevenZip};
use crate::core::summary::RunSummary;
use crate::infra::config::load_config;
use crate::infra::logging::{self, LogFiles};
use crate::infra::progress::LaneBoard;
use crate::infra::walk::{ArchiveFinder, Discovery};

/// One line of a `--dry-run` plan.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlannedJob {
    pub archive: PathBuf,
    pub output_dir: PathBuf,
    pub password_mapped: bool,
}

/// How a run ended. Job failures are inside `Finished`, not errors.
#[derive(Debug)]
pub enum RunOutcome {
    NothingFound,
    Planned(Vec<PlannedJob>),
    Finished(RunSummary),
}

pub fn run(args: ExtractArgs, ctx: &AppContext) -> Result<()> {
    let config = load_config()?;
    let options = ExtractionOptions::resolve(&args, &config)?;

    let log_files = if ctx.dry_run {
        None
    } else {
        LogFiles::location(options.with_log, &options.output_root)
            .map(|dir| LogFiles::today(&dir))
    };
    let board = LaneBoard::new(!ctx.quiet, !ctx.no_color);
    logging::init(
        ctx.verbose,
        !ctx.no_color,
        log_files.as_ref(),
        Some(board.multi()),
    )?;

    let extractor = SevenZip::new(&options.seven_zip);
    execute(&options, &extractor, &board, log_files, ctx)?;
    Ok(())
}

/// Discover, then plan or extract. Only configuration problems are errors.
pub fn execute(
    options: &ExtractionOptions,
    extractor: &dyn Extractor,
    board: &LaneBoard,
    log_files: Option<LogFiles>,
    ctx: &AppContext,
) -> Result<RunOutcome> {
    let color = !ctx.no_color;

    let filter = PathFilter::new(options.ignore_patterns.as_deref())?;
    let finder = ArchiveFinder::new(filter, options.archive_extensions.clone());
    let Discovery { archives, errors } = finder.find(&options.input_root)?;

    if !errors.is_empty() {
        warn!("{} director(ies) could not be read during discovery", errors.len());
    }

    if archives.is_empty() {
        if !ctx.quiet {
            let msg = format!("No archives found under {}", options.input_root.display());
            if color {
                println!("{}", msg.yellow());
            } else {
                println!("{msg}");
            }
        }
        return Ok(RunOutcome::NothingFound);
    }

    let lanes = lane_count(options.max_concurrency, archives.len());
    if !ctx.quiet {
        print_banner(options, archives.len(), lanes, errors.len(), color);
    }

    let passwords = PasswordResolver::new(
        options.default_password.clone(),
        options.password_map.clone(),
    );

    if ctx.dry_run {
        let plan = plan(options, &passwords, &archives);
        if !ctx.quiet {
            print_plan(&plan, color);
        }
        return Ok(RunOutcome::Planned(plan));
    }

    std::fs::create_dir_all(&options.output_root).with_context(|| {
        format!(
            "Failed to create output root {}",
            options.output_root.display()
        )
    })?;

    let job_ctx = JobContext {
        options,
        passwords: &passwords,
        extractor,
    };

    let started = Local::now();
    info!(
        "run started: {} archive(s) under {}, {lanes} lane(s)",
        archives.len(),
        options.input_root.display()
    );

    let report = scheduler::run_all(
        &archives,
        options.max_concurrency,
        board,
        |claim, bar| job::run(claim, bar, &job_ctx),
    )?;

    let summary = RunSummary::new(&report, started, Local::now(), log_files);
    info!(
        "run finished: {} succeeded, {} failed",
        summary.processed, summary.errors
    );

    if !ctx.quiet {
        println!("{}", summary.render(color));
    }
    Ok(RunOutcome::Finished(summary))
}

fn plan(
    options: &ExtractionOptions,
    passwords: &PasswordResolver,
    archives: &[PathBuf],
) -> Vec<PlannedJob> {
    archives
        .iter()
        .map(|archive| PlannedJob {
            archive: archive.clone(),
            output_dir: output::plan_output_dir(
                archive,
                &options.input_root,
                &options.output_root,
                options.nest_by_archive_name,
            ),
            password_mapped: passwords.is_mapped(archive),
        })
        .collect()
}

fn mask(password: &str) -> &'static str {
    if password.is_empty() { "None" } else { "***" }
}

fn or_none(value: Option<&str>) -> &str {
    value.unwrap_or("None")
}

fn print_banner(
    options: &ExtractionOptions,
    total: usize,
    lanes: usize,
    discovery_errors: usize,
    color: bool,
) {
    let title = format!("uzdir: {total} archive(s) to extract");
    if color {
        println!("{}", title.bold());
    } else {
        println!("{title}");
    }
    println!("  Input:           {}", options.input_root.display());
    println!("  Output:          {}", options.output_root.display());
    println!("  Formats:         {}", options.archive_extensions);
    println!("  Password:        {}", mask(&options.default_password));
    println!(
        "  Password map:    {}",
        options
            .password_map
            .as_ref()
            .map_or_else(|| "None".to_string(), |m| format!("{} entries", m.len()))
    );
    println!("  Filter:          {}", or_none(options.filter_spec.as_deref()));
    println!("  Ignore:          {}", or_none(options.ignore_patterns.as_deref()));
    println!(
        "  Concurrency:     {lanes} (max {})",
        options.max_concurrency
    );
    println!("  Nest by archive: {}", options.nest_by_archive_name);
    if discovery_errors > 0 {
        println!("  Unreadable dirs: {discovery_errors} (skipped)");
    }
}

fn print_plan(plan: &[PlannedJob], color: bool) {
    let header = "DRY RUN: Would extract:";
    if color {
        println!("{}", header.yellow());
    } else {
        println!("{header}");
    }
    let total = plan.len();
    for (i, job) in plan.iter().enumerate() {
        let pw = if job.password_mapped { "mapped" } else { "default" };
        println!(
            "  [{}/{total}] {} -> {} (password: {pw})",
            i + 1,
            job.archive.display(),
            job.output_dir.display()
        );
    }
}
