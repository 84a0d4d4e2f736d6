//! Entry-name filter consulted while discovering archives.
//!
//! Dot-prefixed names are always skipped. User patterns either match a
//! name exactly or, when they contain `*` or `?`, are compiled into an
//! anchored regex (`*` → `.*`, `?` → `.`). Everything else in a wildcard
//! pattern is matched literally.

use anyhow::{Context, Result};
use regex::Regex;

use crate::infra::utils::ListUtils;

#[derive(Debug, Clone)]
enum NamePattern {
    Exact(String),
    Wildcard(Regex),
}

impl NamePattern {
    fn compile(pattern: &str) -> Result<Self> {
        if !pattern.contains(['*', '?']) {
            return Ok(Self::Exact(pattern.to_string()));
        }

        let mut re = String::with_capacity(pattern.len() + 8);
        re.push('^');
        for ch in pattern.chars() {
            match ch {
                '*' => re.push_str(".*"),
                '?' => re.push('.'),
                c => re.push_str(&regex::escape(&c.to_string())),
            }
        }
        re.push('$');

        let compiled =
            Regex::new(&re).with_context(|| format!("invalid ignore pattern: {pattern}"))?;
        Ok(Self::Wildcard(compiled))
    }

    fn matches(&self, name: &str) -> bool {
        match self {
            Self::Exact(p) => p == name,
            Self::Wildcard(re) => re.is_match(name),
        }
    }
}

/// Decides whether a directory entry is skipped during discovery.
#[derive(Debug, Clone, Default)]
pub struct PathFilter {
    patterns: Vec<NamePattern>,
}

impl PathFilter {
    /// Build from the raw `--ignore` value (comma or full-width comma separated).
    pub fn new(ignore: Option<&str>) -> Result<Self> {
        let patterns = ignore
            .map(ListUtils::split)
            .unwrap_or_default()
            .iter()
            .map(|p| NamePattern::compile(p))
            .collect::<Result<Vec<_>>>()?;

        Ok(Self { patterns })
    }

    pub fn should_ignore(&self, entry_name: &str) -> bool {
        if entry_name.starts_with('.') {
            return true;
        }
        self.patterns.iter().any(|p| p.matches(entry_name))
    }

    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }
}
