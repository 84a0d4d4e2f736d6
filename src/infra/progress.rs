//! Per-lane progress bars.
//!
//! One `MultiProgress` per run, one bar per lane. A bar is owned by exactly
//! one lane for the whole run. With `--quiet` the board draws to a hidden
//! target and every update is a no-op.

use std::cell::RefCell;

use indicatif::{MultiProgress, ProgressBar, ProgressDrawTarget, ProgressStyle};
use owo_colors::OwoColorize;

const LANE_TEMPLATE: &str = "{prefix} {bar:24.green} {pos:>3}% {msg}";

const LANE_CHARS: &str = "█░";

/// Visual state of a lane's current job.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LaneStatus {
    Preparing,
    Extracting,
    Completed,
    Failed,
}

impl LaneStatus {
    fn label(self) -> &'static str {
        match self {
            Self::Preparing => "Preparing",
            Self::Extracting => "Extracting",
            Self::Completed => "Completed",
            Self::Failed => "Failed",
        }
    }
}

/// Partial update; `None` fields keep their previous value.
#[derive(Debug, Default, Clone)]
pub struct LaneUpdate {
    pub title: Option<String>,
    pub status: Option<LaneStatus>,
    pub log: Option<String>,
}

#[derive(Debug, Default)]
struct LaneText {
    status: Option<LaneStatus>,
    log: String,
}

/// Shared display for all lanes of one run.
pub struct LaneBoard {
    mp: MultiProgress,
    color: bool,
}

impl LaneBoard {
    pub fn new(visible: bool, color: bool) -> Self {
        let target = if visible {
            ProgressDrawTarget::stderr()
        } else {
            ProgressDrawTarget::hidden()
        };
        Self {
            mp: MultiProgress::with_draw_target(target),
            color,
        }
    }

    pub fn hidden() -> Self {
        Self::new(false, false)
    }

    /// Handle for writers that must pause the bars while they print.
    pub fn multi(&self) -> MultiProgress {
        self.mp.clone()
    }

    /// Create the bar for one lane. Call once per lane.
    pub fn add_lane(&self) -> LaneBar {
        let style = ProgressStyle::with_template(LANE_TEMPLATE)
            .map(|s| s.progress_chars(LANE_CHARS))
            .unwrap_or_else(|_| ProgressStyle::default_bar());

        let pb = self.mp.add(ProgressBar::new(100));
        pb.set_style(style);

        LaneBar {
            pb,
            color: self.color,
            text: RefCell::new(LaneText::default()),
        }
    }
}

/// Progress handle owned by one lane.
pub struct LaneBar {
    pb: ProgressBar,
    color: bool,
    text: RefCell<LaneText>,
}

impl LaneBar {
    /// Detached no-op bar, for running a job without a board.
    pub fn hidden() -> Self {
        Self {
            pb: ProgressBar::hidden(),
            color: false,
            text: RefCell::new(LaneText::default()),
        }
    }

    pub fn update(&self, percent: Option<u8>, update: LaneUpdate) {
        if let Some(p) = percent {
            self.pb.set_position(u64::from(p.min(100)));
        }
        if let Some(title) = update.title {
            self.pb.set_prefix(title);
        }

        let mut text = self.text.borrow_mut();
        if let Some(status) = update.status {
            text.status = Some(status);
        }
        if let Some(log) = update.log {
            text.log = log;
        }
        let status = text.status.map(|s| self.paint(s)).unwrap_or_default();
        self.pb.set_message(format!("{status} {}", text.log));
    }

    pub fn position(&self) -> u64 {
        self.pb.position()
    }

    pub fn finish(&self) {
        self.pb.finish();
    }

    fn paint(&self, status: LaneStatus) -> String {
        let label = status.label();
        if !self.color {
            return label.to_string();
        }
        match status {
            LaneStatus::Preparing | LaneStatus::Extracting => label.dimmed().to_string(),
            LaneStatus::Completed => label.green().to_string(),
            LaneStatus::Failed => label.red().to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hidden_bar_tracks_position() {
        let bar = LaneBar::hidden();
        bar.update(
            Some(40),
            LaneUpdate {
                title: Some("(lane 1)[1/3]".into()),
                status: Some(LaneStatus::Extracting),
                log: Some("a.txt".into()),
            },
        );
        assert_eq!(bar.position(), 40);

        bar.update(Some(250), LaneUpdate::default());
        assert_eq!(bar.position(), 100);
    }

    #[test]
    fn board_lanes_are_independent() {
        let board = LaneBoard::hidden();
        let a = board.add_lane();
        let b = board.add_lane();
        a.update(Some(10), LaneUpdate::default());
        b.update(Some(90), LaneUpdate::default());
        assert_eq!(a.position(), 10);
        assert_eq!(b.position(), 90);
    }
}
