//! Removes unwanted members from a finished extraction.
//!
//! The filter spec is a comma (or full-width comma) separated list. Tokens
//! containing `*` are globs matched against paths relative to the output
//! directory; other tokens name one relative path. Every deletion is
//! attempted independently and failures are logged, never propagated.

use std::path::{Component, Path, PathBuf};

use globset::{Glob, GlobBuilder, GlobMatcher};
use ignore::WalkBuilder;
use tracing::{error, info, warn};

use crate::infra::utils::ListUtils;

/// What one `apply` call removed and what it failed to remove.
#[derive(Debug, Default)]
pub struct FilterReport {
    pub removed: Vec<PathBuf>,
    pub failures: Vec<(PathBuf, String)>,
}

impl FilterReport {
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }
}

pub fn apply(output_dir: &Path, filter_spec: Option<&str>) -> FilterReport {
    let mut report = FilterReport::default();
    let Some(spec) = filter_spec else {
        return report;
    };

    for token in ListUtils::split(spec) {
        if token.contains('*') {
            apply_glob(output_dir, &token, &mut report);
        } else {
            apply_exact(output_dir, &token, &mut report);
        }
    }
    report
}

fn apply_exact(output_dir: &Path, token: &str, report: &mut FilterReport) {
    let rel = Path::new(token);
    if rel.is_absolute() || rel.components().any(|c| matches!(c, Component::ParentDir)) {
        warn!(filter = token, "filter path escapes the output directory, skipped");
        return;
    }

    let target = output_dir.join(rel);
    // symlink_metadata so a link is removed rather than followed
    if target.symlink_metadata().is_ok() {
        remove_path(output_dir, &target, report);
    }
}

fn apply_glob(output_dir: &Path, pattern: &str, report: &mut FilterReport) {
    let glob = match MemberGlob::compile(pattern) {
        Ok(g) => g,
        Err(e) => {
            error!(filter = pattern, "glob error: {e}");
            report.failures.push((PathBuf::from(pattern), e.to_string()));
            return;
        }
    };

    let walker = WalkBuilder::new(output_dir)
        .standard_filters(false)
        .follow_links(false)
        .build();

    let mut matched: Vec<PathBuf> = walker
        .filter_map(|res| match res {
            Ok(entry) => Some(entry),
            Err(e) => {
                warn!("walk error under {}: {e}", output_dir.display());
                None
            }
        })
        .filter(|entry| entry.depth() > 0)
        .map(|entry| entry.into_path())
        .filter(|path| {
            path.strip_prefix(output_dir)
                .is_ok_and(|rel| glob.is_match(rel))
        })
        .collect();

    // Parents before children; children of a removed directory are skipped
    matched.sort();
    let mut removed_dirs: Vec<PathBuf> = Vec::new();
    for path in matched {
        if removed_dirs.iter().any(|d| path.starts_with(d)) {
            continue;
        }
        let was_dir = path.symlink_metadata().is_ok_and(|m| m.is_dir());
        if remove_path(output_dir, &path, report) && was_dir {
            removed_dirs.push(path);
        }
    }
}

/// Glob over member paths. `*` stays within one path segment, `**` spans
/// segments. Dot-prefixed names only match a pattern segment that itself
/// starts with `.`, so `*` never reaches hidden members.
struct MemberGlob {
    matcher: GlobMatcher,
    dot_segments: Vec<GlobMatcher>,
}

impl MemberGlob {
    fn compile(pattern: &str) -> Result<Self, globset::Error> {
        let matcher = GlobBuilder::new(pattern)
            .literal_separator(true)
            .build()?
            .compile_matcher();
        let dot_segments = pattern
            .split('/')
            .filter(|seg| seg.starts_with('.'))
            .map(|seg| Ok(Glob::new(seg)?.compile_matcher()))
            .collect::<Result<Vec<_>, globset::Error>>()?;
        Ok(Self {
            matcher,
            dot_segments,
        })
    }

    fn is_match(&self, rel: &Path) -> bool {
        self.matcher.is_match(rel) && rel.components().all(|c| self.allows(c))
    }

    fn allows(&self, component: Component<'_>) -> bool {
        let name = component.as_os_str().to_string_lossy();
        !name.starts_with('.') || self.dot_segments.iter().any(|m| m.is_match(name.as_ref()))
    }
}

fn remove_path(output_dir: &Path, path: &Path, report: &mut FilterReport) -> bool {
    let rel = path.strip_prefix(output_dir).unwrap_or(path);
    let is_dir = path.symlink_metadata().is_ok_and(|m| m.is_dir());

    let result = if is_dir {
        std::fs::remove_dir_all(path)
    } else {
        std::fs::remove_file(path)
    };

    match result {
        Ok(()) => {
            if is_dir {
                info!("filtered directory: {}", rel.display());
            } else {
                info!("filtered file: {}", rel.display());
            }
            report.removed.push(path.to_path_buf());
            true
        }
        Err(e) => {
            error!("failed to delete {}: {e}", path.display());
            report.failures.push((path.to_path_buf(), e.to_string()));
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn touch(root: &Path, rel: &str) {
        let p = root.join(rel);
        fs::create_dir_all(p.parent().unwrap()).unwrap();
        fs::write(p, "x").unwrap();
    }

    #[test]
    fn none_spec_is_noop() {
        let tmp = TempDir::new().unwrap();
        touch(tmp.path(), "keep.txt");
        let report = apply(tmp.path(), None);
        assert!(report.removed.is_empty());
        assert!(tmp.path().join("keep.txt").exists());
    }

    #[test]
    fn exact_paths_remove_files_and_dirs() {
        let tmp = TempDir::new().unwrap();
        let root = tmp.path();
        touch(root, "readme.txt");
        touch(root, "__MACOSX/._a");
        touch(root, "docs/keep.md");

        let report = apply(root, Some("readme.txt，__MACOSX, missing.bin"));

        assert!(report.is_clean());
        assert_eq!(report.removed.len(), 2);
        assert!(!root.join("readme.txt").exists());
        assert!(!root.join("__MACOSX").exists());
        assert!(root.join("docs/keep.md").exists());
    }

    #[test]
    fn glob_matches_files_and_directories() {
        let tmp = TempDir::new().unwrap();
        let root = tmp.path();
        touch(root, "a.url");
        touch(root, "sub/b.url");
        touch(root, "sub/c.txt");
        touch(root, "ads_1/banner.png");

        let report = apply(root, Some("**/*.url,ads_*"));

        assert!(report.is_clean(), "{:?}", report.failures);
        assert!(!root.join("a.url").exists());
        assert!(!root.join("sub/b.url").exists());
        assert!(root.join("sub/c.txt").exists());
        assert!(!root.join("ads_1").exists());
    }

    #[test]
    fn single_star_does_not_cross_directories() {
        let tmp = TempDir::new().unwrap();
        let root = tmp.path();
        touch(root, "top.log");
        touch(root, "nested/deep.log");

        apply(root, Some("*.log"));

        assert!(!root.join("top.log").exists());
        assert!(root.join("nested/deep.log").exists());
    }

    #[test]
    fn escaping_paths_are_refused() {
        let tmp = TempDir::new().unwrap();
        let outside = tmp.path().join("outside.txt");
        fs::write(&outside, "x").unwrap();
        let out_dir = tmp.path().join("out");
        fs::create_dir_all(&out_dir).unwrap();

        let report = apply(&out_dir, Some("../outside.txt"));

        assert!(report.removed.is_empty());
        assert!(outside.exists());
    }

    #[test]
    fn failing_token_does_not_stop_later_tokens() {
        let tmp = TempDir::new().unwrap();
        let root = tmp.path();
        touch(root, "readme.txt");
        touch(root, "b.url");

        let report = apply(root, Some("a[*,readme.txt,*.url"));

        assert_eq!(report.failures.len(), 1);
        assert_eq!(report.failures[0].0, PathBuf::from("a[*"));
        assert!(!root.join("readme.txt").exists());
        assert!(!root.join("b.url").exists());
    }

    #[test]
    fn star_skips_hidden_members() {
        let tmp = TempDir::new().unwrap();
        let root = tmp.path();
        touch(root, "a.txt");
        touch(root, ".keep");
        touch(root, ".git/config.txt");
        touch(root, "sub/.env.txt");

        let report = apply(root, Some("*,**/*.txt"));

        assert!(report.is_clean(), "{:?}", report.failures);
        assert!(!root.join("a.txt").exists());
        assert!(!root.join("sub").exists());
        assert!(root.join(".keep").exists());
        assert!(root.join(".git/config.txt").exists());
    }

    #[test]
    fn dot_pattern_reaches_hidden_members() {
        let tmp = TempDir::new().unwrap();
        let root = tmp.path();
        touch(root, ".DS_Store");
        touch(root, "sub/.DS_Store");
        touch(root, "keep.txt");

        apply(root, Some(".DS_*,**/.DS_*"));

        assert!(!root.join(".DS_Store").exists());
        assert!(!root.join("sub/.DS_Store").exists());
        assert!(root.join("keep.txt").exists());
    }
}
