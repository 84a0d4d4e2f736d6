//! Filepath: src/infra/walk.rs
//! Archive discovery.
//! - Depth-first traversal in directory enumeration order (not sorted)
//! - Every entry below the root is checked against `PathFilter` before it
//!   is recursed into or collected; hidden entries never pass
//! - A regular file qualifies iff its lowercased extension is configured
//! - Symlinks are neither followed nor collected, so cycles cannot occur
//! - Unreadable subdirectories are reported and skipped; siblings continue
//!
//! Backed by ripgrep's `ignore` crate with all of its ignore-file handling
//! switched off: only the user's patterns decide what is skipped.

use std::path::{Path, PathBuf};

use ignore::{DirEntry, WalkBuilder};
use tracing::{debug, warn};

use crate::core::options::{ArchiveExtensions, ConfigError};
use crate::core::path_filter::PathFilter;

/// Discovered archives plus the traversal errors that were skipped over.
#[derive(Debug, Default)]
pub struct Discovery
{
    /// Archive paths in task order
    pub archives: Vec<PathBuf>,

    /// `(location, message)` for each subtree that could not be read
    pub errors: Vec<(Option<PathBuf>, String)>,
}

/// Recursive archive finder.
pub struct ArchiveFinder
{
    /// Entry-name filter (hidden + user ignore patterns)
    filter: PathFilter,

    /// Extensions that make a file an archive
    extensions: ArchiveExtensions,
}

impl ArchiveFinder
{
    pub fn new(
        filter: PathFilter,
        extensions: ArchiveExtensions,
    ) -> Self
    {
        Self { filter, extensions }
    }

    /// Discover archives under `root`, or validate `root` itself when it is a file.
    pub fn find(
        &self,
        root: &Path,
    ) -> Result<Discovery, ConfigError>
    {
        let meta = root
            .metadata()
            .map_err(|_| ConfigError::InputMissing(root.to_path_buf()))?;

        if meta.is_file()
        {
            if self
                .extensions
                .matches(root)
            {
                return Ok(Discovery { archives: vec![root.to_path_buf()], errors: Vec::new() });
            }
            return Err(ConfigError::NotAnArchive(root.to_path_buf()));
        }

        Ok(self.walk(root))
    }

    /// Internal: construct a configured WalkBuilder for `root`.
    fn build_walk(
        &self,
        root: &Path,
    ) -> WalkBuilder
    {
        let mut b = WalkBuilder::new(root);

        // No .gitignore/.ignore/hidden handling; PathFilter owns that
        b.standard_filters(false);
        b.follow_links(false);

        // Early pruning by entry name. The root itself is never filtered.
        let filter = self
            .filter
            .clone();
        b.filter_entry(move |ent: &DirEntry| {
            if ent.depth() == 0
            {
                return true;
            }
            let name = ent
                .file_name()
                .to_string_lossy();
            !filter.should_ignore(&name)
        });

        b
    }

    fn walk(
        &self,
        root: &Path,
    ) -> Discovery
    {
        let mut found = Discovery::default();

        for res in self
            .build_walk(root)
            .build()
        {
            let entry = match res
            {
                Ok(entry) => entry,
                Err(err) =>
                {
                    let location = error_path(&err);
                    warn!("discovery error: {err}");
                    found
                        .errors
                        .push((location, err.to_string()));
                    continue;
                }
            };

            let is_file = entry
                .file_type()
                .is_some_and(|ft| ft.is_file());

            if is_file
                && self
                    .extensions
                    .matches(entry.path())
            {
                debug!("found archive {}", entry.path().display());
                found
                    .archives
                    .push(entry.into_path());
            }
        }

        found
    }
}

/// Best-effort extraction of the offending path from a walk error.
fn error_path(err: &ignore::Error) -> Option<PathBuf>
{
    match err
    {
        ignore::Error::WithPath { path, .. } => Some(path.clone()),
        ignore::Error::WithDepth { err, .. } | ignore::Error::WithLineNumber { err, .. } =>
        {
            error_path(err)
        }
        ignore::Error::Loop { child, .. } => Some(child.clone()),
        _ => None,
    }
}
