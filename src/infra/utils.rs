//! Filepath: src/infra/utils.rs
//! Utility helpers organized by small, focused structs.
//! All functions are associated fns to keep call sites
//! ergonomic, testable, and discoverable.

use std::time::Duration;

/// Full-width comma accepted wherever a comma-separated list is read
const FULL_WIDTH_COMMA: char = '，';

/// Comma-separated list helpers
pub struct ListUtils;

impl ListUtils
{
    /// Split a user-supplied list on ',' or '，', trimming each token
    /// and dropping empty ones.
    pub fn split(raw: &str) -> Vec<String>
    {
        raw.replace(FULL_WIDTH_COMMA, ",")
            .split(',')
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .map(str::to_string)
            .collect()
    }
}

/// Display helpers for progress and log lines
pub struct TextUtils;

impl TextUtils
{
    /// Shorten `s` to at most `max_chars` characters by replacing the
    /// middle with an ellipsis. Strings at or under `threshold` chars
    /// are returned unchanged.
    pub fn truncate_middle(
        s: &str,
        threshold: usize,
        max_chars: usize,
    ) -> String
    {
        let count = s
            .chars()
            .count();
        if count <= threshold
        {
            return s.to_string();
        }

        // One char is reserved for the ellipsis
        let available = max_chars.saturating_sub(1);
        if available == 0
        {
            return "…".to_string();
        }

        let head = available / 2;
        let tail = available - head;

        let mut out: String = s
            .chars()
            .take(head)
            .collect();
        out.push('…');
        out.extend(
            s.chars()
                .skip(count - tail),
        );
        out
    }

    /// Collapse multi-line diagnostic text onto a single line
    pub fn one_line(s: &str) -> String
    {
        s.trim()
            .lines()
            .map(str::trim)
            .filter(|l| !l.is_empty())
            .collect::<Vec<_>>()
            .join(" ")
    }

    /// Zero-padded `n` using the digit width of `max`
    pub fn pad_to(
        n: usize,
        max: usize,
    ) -> String
    {
        let width = max
            .to_string()
            .len();
        format!("{n:0width$}")
    }
}

/// Duration formatting
pub struct TimeUtils;

impl TimeUtils
{
    /// Format as `HH:MM:SS`, truncating sub-second precision
    pub fn format_hms(d: Duration) -> String
    {
        let total = d.as_secs();
        let hours = total / 3600;
        let minutes = (total % 3600) / 60;
        let seconds = total % 60;

        format!("{hours:02}:{minutes:02}:{seconds:02}")
    }
}
