//! Per-archive password resolution.
//!
//! The password map is an insertion-ordered list of `(key, password)` pairs
//! loaded once from JSON. Resolution is a fixed cascade, first match wins:
//!
//! 1. full absolute path as a key
//! 2. first key (in file order) that is a substring of the path
//! 3. file name
//! 4. extension including the leading dot
//! 5. the run's default password

use std::path::Path;

use anyhow::{Context, Result};
use indexmap::IndexMap;
use owo_colors::OwoColorize;

use crate::cli::{AppContext, PasswordMapArgs};
use crate::core::options::ConfigError;

/// Ordered match-key → password table.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PasswordMap {
    entries: IndexMap<String, String>,
}

impl PasswordMap {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::PasswordMapRead {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json(&raw).map_err(|source| ConfigError::PasswordMapParse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Parse a JSON object of string values, keeping document order.
    pub fn from_json(raw: &str) -> Result<Self, serde_json::Error> {
        let entries: IndexMap<String, String> = serde_json::from_str(raw)?;
        Ok(Self { entries })
    }

    pub fn from_pairs<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            entries: pairs
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }

    pub fn to_json_pretty(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(&self.entries)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn get(&self, key: &str) -> Option<&str> {
        self.entries.get(key).map(String::as_str)
    }

    fn first_substring_of(&self, haystack: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(key, _)| haystack.contains(key.as_str()))
            .map(|(_, pw)| pw.as_str())
    }
}

/// Maps an archive path to the password used to open it.
#[derive(Debug, Clone)]
pub struct PasswordResolver {
    default_password: String,
    map: Option<PasswordMap>,
}

impl PasswordResolver {
    pub fn new(default_password: impl Into<String>, map: Option<PasswordMap>) -> Self {
        Self {
            default_password: default_password.into(),
            map,
        }
    }

    pub fn resolve(&self, file_path: &Path) -> &str {
        self.lookup(file_path).unwrap_or(&self.default_password)
    }

    /// True when the resolved password came from the map rather than the default.
    pub fn is_mapped(&self, file_path: &Path) -> bool {
        self.lookup(file_path).is_some()
    }

    fn lookup(&self, file_path: &Path) -> Option<&str> {
        let map = self.map.as_ref()?;

        let full = file_path.to_string_lossy();
        if let Some(pw) = map.get(&full) {
            return Some(pw);
        }
        if let Some(pw) = map.first_substring_of(&full) {
            return Some(pw);
        }

        let name = file_path
            .file_name()
            .map(|n| n.to_string_lossy())
            .unwrap_or_default();
        if let Some(pw) = map.get(&name) {
            return Some(pw);
        }

        // Path::extension drops the dot; keys carry it
        let ext = file_path.extension()?;
        map.get(&format!(".{}", ext.to_string_lossy()))
    }

    pub fn default_password(&self) -> &str {
        &self.default_password
    }

    pub fn map(&self) -> Option<&PasswordMap> {
        self.map.as_ref()
    }
}

/// Split `KEY=PASSWORD` at the first `=`. The password may be empty or
/// contain further `=` characters; the key may not be empty.
pub fn parse_entry(raw: &str) -> Result<(String, String)> {
    let (key, password) = raw
        .split_once('=')
        .with_context(|| format!("expected KEY=PASSWORD, got {raw:?}"))?;
    if key.is_empty() {
        anyhow::bail!("empty key in {raw:?}");
    }
    Ok((key.to_string(), password.to_string()))
}

/// `uzdir password-map`: write a map file in the order the entries were given.
pub fn write_map(args: PasswordMapArgs, ctx: &AppContext) -> Result<()> {
    let pairs = args
        .entries
        .iter()
        .map(|e| parse_entry(e))
        .collect::<Result<Vec<_>>>()?;
    let map = PasswordMap::from_pairs(pairs);
    let json = map
        .to_json_pretty()
        .context("Failed to serialize password map")?;

    if args.output.exists() && !args.force {
        anyhow::bail!(
            "Password map already exists at {}. Use --force to overwrite.",
            args.output.display()
        );
    }

    if ctx.dry_run {
        if !ctx.quiet {
            println!("Would write {}:\n{json}", args.output.display());
        }
        return Ok(());
    }

    if let Some(parent) = args.output.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create {}", parent.display()))?;
    }
    std::fs::write(&args.output, json)
        .with_context(|| format!("Failed to write {}", args.output.display()))?;

    if !ctx.quiet {
        let line = format!(
            "Wrote {} password entries to {}",
            map.len(),
            args.output.display()
        );
        if ctx.no_color {
            println!("{line}");
        } else {
            println!("{} {line}", "✓".green());
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn resolver() -> PasswordResolver {
        let map = PasswordMap::from_pairs([("/a/b.zip", "P1"), ("b.zip", "P2"), (".zip", "P3")]);
        PasswordResolver::new("D", Some(map))
    }

    #[test]
    fn cascade_prefers_exact_path() {
        assert_eq!(resolver().resolve(Path::new("/a/b.zip")), "P1");
    }

    #[test]
    fn cascade_falls_through_to_substring() {
        // "b.zip" is a substring of "/x/b.zip" and precedes ".zip" in file order
        assert_eq!(resolver().resolve(Path::new("/x/b.zip")), "P2");
    }

    #[test]
    fn cascade_uses_extension() {
        // ".zip" is itself a substring here, so rule 2 already yields P3
        assert_eq!(resolver().resolve(Path::new("/x/c.zip")), "P3");
    }

    #[test]
    fn cascade_defaults_when_nothing_applies() {
        assert_eq!(resolver().resolve(Path::new("/x/c.rar")), "D");
    }

    #[test]
    fn no_map_always_default() {
        let r = PasswordResolver::new("", None);
        assert_eq!(r.resolve(Path::new("/x/secret.zip")), "");
        assert!(!r.is_mapped(Path::new("/x/secret.zip")));
    }

    #[test]
    fn substring_match_follows_document_order() {
        let map = PasswordMap::from_json(r#"{"photos": "first", "2024/photos": "second"}"#).unwrap();
        let r = PasswordResolver::new("D", Some(map));
        assert_eq!(r.resolve(Path::new("/data/2024/photos/a.zip")), "first");
    }

    #[test]
    fn file_name_and_extension_rules_are_exact() {
        let map = PasswordMap::from_pairs([("notes.7z", "N"), (".rar", "R")]);
        let r = PasswordResolver::new("D", Some(map));
        // "notes.7z" is also a path substring; exact file-name rule agrees
        assert_eq!(r.resolve(Path::new("/in/notes.7z")), "N");
        assert_eq!(r.resolve(Path::new("/in/archive.RAR")), "D");
        assert!(r.is_mapped(Path::new("/in/notes.7z")));
        assert!(!r.is_mapped(Path::new("/in/other.zip")));
    }

    #[test]
    fn rejects_non_string_values() {
        assert!(PasswordMap::from_json(r#"{"a.zip": 123}"#).is_err());
        assert!(PasswordMap::from_json("[]").is_err());
    }

    #[test]
    fn json_round_trip_keeps_order() {
        let map = PasswordMap::from_pairs([("z.zip", "1"), ("a.zip", "2")]);
        let json = map.to_json_pretty().unwrap();
        assert!(json.find("z.zip").unwrap() < json.find("a.zip").unwrap());
        assert_eq!(PasswordMap::from_json(&json).unwrap(), map);
    }

    #[test]
    fn parse_entry_splits_on_first_equals() {
        assert_eq!(
            parse_entry("a.zip=p=q").unwrap(),
            ("a.zip".to_string(), "p=q".to_string())
        );
        assert_eq!(parse_entry(".rar=").unwrap().1, "");
        assert!(parse_entry("=pw").is_err());
        assert!(parse_entry("nokey").is_err());
    }
}
