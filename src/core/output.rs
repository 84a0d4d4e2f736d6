//! Destination directory for one archive.
//!
//! `<output_root>/<parent of relative path>[/<archive stem>]`. With nesting
//! off, every archive in the same source directory shares one destination,
//! and colliding member names overwrite each other.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

/// Path of `archive` relative to `input_root`. Empty when the input root is
/// the archive itself; just the file name when the archive lies outside it.
pub fn relative_path(archive: &Path, input_root: &Path) -> PathBuf {
    match archive.strip_prefix(input_root) {
        Ok(rel) => rel.to_path_buf(),
        Err(_) => archive
            .file_name()
            .map(PathBuf::from)
            .unwrap_or_default(),
    }
}

/// Compute the destination without touching the filesystem.
pub fn plan_output_dir(
    archive: &Path,
    input_root: &Path,
    output_root: &Path,
    nest_by_archive_name: bool,
) -> PathBuf {
    let relative = relative_path(archive, input_root);

    let mut out = output_root.to_path_buf();
    if let Some(parent) = relative.parent() {
        out.push(parent);
    }
    if nest_by_archive_name {
        if let Some(stem) = relative.file_stem() {
            out.push(stem);
        }
    }
    out
}

/// Compute the destination and create it (with parents) if absent.
pub fn build_output_dir(
    archive: &Path,
    input_root: &Path,
    output_root: &Path,
    nest_by_archive_name: bool,
) -> Result<PathBuf> {
    let dir = plan_output_dir(archive, input_root, output_root, nest_by_archive_name);
    std::fs::create_dir_all(&dir)
        .with_context(|| format!("create output dir: {}", dir.display()))?;
    Ok(dir)
}
