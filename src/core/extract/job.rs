//! One archive, start to finish: output dir, password, extraction, filter.

use std::path::{Path, PathBuf};
use std::time::Instant;

use tracing::{debug, error, info, instrument, warn};

use crate::core::options::ExtractionOptions;
use crate::core::output;
use crate::core::password::PasswordResolver;
use crate::core::post_filter::{self, FilterReport};
use crate::core::scheduler::{Claim, JobOutcome};
use crate::core::sevenzip::{ExtractError, ExtractEvent, ExtractRequest, Extractor};
use crate::infra::progress::{LaneBar, LaneStatus, LaneUpdate};
use crate::infra::utils::TextUtils;

/// Member names longer than this are shortened on the progress line
const DISPLAY_CHARS: usize = 48;

/// Everything a job reads; shared by all lanes without locking.
pub struct JobContext<'a> {
    pub options: &'a ExtractionOptions,
    pub passwords: &'a PasswordResolver,
    pub extractor: &'a dyn Extractor,
}

#[derive(Debug, thiserror::Error)]
enum JobError {
    #[error("{0:#}")]
    OutputDir(anyhow::Error),

    #[error("{}", .0.detail())]
    Extract(#[from] ExtractError),
}

/// `(lane L)[i/N]`, both numbers one-based and zero-padded.
pub fn job_title(claim: &Claim<'_>) -> String {
    format!(
        "(lane {})[{}/{}]",
        TextUtils::pad_to(claim.lane + 1, claim.lanes),
        TextUtils::pad_to(claim.index + 1, claim.total),
        claim.total
    )
}

/// Extract one archive. Never panics on job failure; every error ends up in
/// the returned outcome.
#[instrument(skip_all, fields(lane = claim.lane + 1, index = claim.index + 1))]
pub fn run(claim: Claim<'_>, bar: &LaneBar, ctx: &JobContext<'_>) -> JobOutcome {
    let started = Instant::now();
    let title = job_title(&claim);
    let relative = output::relative_path(claim.path, &ctx.options.input_root);

    bar.update(
        Some(0),
        LaneUpdate {
            title: Some(title.clone()),
            status: Some(LaneStatus::Preparing),
            log: Some(shorten(&relative.to_string_lossy())),
        },
    );
    info!("{title} start: {}", claim.path.display());

    match execute(&claim, &title, bar, ctx) {
        Ok((out_dir, filtered)) => {
            let elapsed = started.elapsed();
            bar.update(
                Some(100),
                LaneUpdate {
                    status: Some(LaneStatus::Completed),
                    log: Some(shorten(&relative.to_string_lossy())),
                    ..Default::default()
                },
            );
            info!(
                "{title} completed in {:.2}s: {} -> {}",
                elapsed.as_secs_f64(),
                claim.path.display(),
                out_dir.display()
            );
            let filter_failures = filtered
                .failures
                .iter()
                .map(|(path, err)| format!("{}: {err}", path.display()))
                .collect();
            JobOutcome::succeeded(claim.path, elapsed).with_filter_failures(filter_failures)
        }
        Err(err) => {
            let elapsed = started.elapsed();
            let detail = err.to_string();
            bar.update(
                None,
                LaneUpdate {
                    status: Some(LaneStatus::Failed),
                    log: Some(shorten(&detail)),
                    ..Default::default()
                },
            );
            error!("{title} failed: {}: {detail}", claim.path.display());
            JobOutcome::failed(claim.path, elapsed, detail)
        }
    }
}

fn execute(
    claim: &Claim<'_>,
    title: &str,
    bar: &LaneBar,
    ctx: &JobContext<'_>,
) -> Result<(PathBuf, FilterReport), JobError> {
    let opts = ctx.options;
    let out_dir = output::build_output_dir(
        claim.path,
        &opts.input_root,
        &opts.output_root,
        opts.nest_by_archive_name,
    )
    .map_err(JobError::OutputDir)?;

    let password = ctx.passwords.resolve(claim.path);
    debug!(
        mapped = ctx.passwords.is_mapped(claim.path),
        "{title} output dir {}",
        out_dir.display()
    );

    let request = ExtractRequest {
        archive: claim.path,
        output_dir: &out_dir,
        password,
        preserve_full_paths: opts.nest_by_archive_name,
    };

    ctx.extractor
        .extract(&request, &mut |event| forward(title, bar, event))?;

    let filtered = filter_output(title, &out_dir, opts.filter_spec.as_deref());
    Ok((out_dir, filtered))
}

fn forward(title: &str, bar: &LaneBar, event: ExtractEvent) {
    match event {
        ExtractEvent::MemberStarted(name) => {
            debug!("{title} extracting {name}");
            bar.update(
                None,
                LaneUpdate {
                    status: Some(LaneStatus::Extracting),
                    log: Some(shorten(&name)),
                    ..Default::default()
                },
            );
        }
        ExtractEvent::Progress(pct) => bar.update(
            Some(pct),
            LaneUpdate {
                status: Some(LaneStatus::Extracting),
                ..Default::default()
            },
        ),
        ExtractEvent::Completed => bar.update(Some(100), LaneUpdate::default()),
    }
}

/// Deletion failures are reported back but never fail the job.
fn filter_output(title: &str, out_dir: &Path, filter_spec: Option<&str>) -> FilterReport {
    let report = post_filter::apply(out_dir, filter_spec);
    if !report.removed.is_empty() {
        debug!("{title} filtered {} path(s) under {}", report.removed.len(), out_dir.display());
    }
    if !report.is_clean() {
        warn!(
            "{title} {} filter deletion(s) failed under {}",
            report.failures.len(),
            out_dir.display()
        );
    }
    report
}

fn shorten(s: &str) -> String {
    TextUtils::truncate_middle(s, DISPLAY_CHARS, DISPLAY_CHARS)
}
