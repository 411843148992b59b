//! Replay windows: half-open time intervals fetched in one upstream call

use chrono::{DateTime, Duration, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

/// Half-open interval `[start, end)` with `start < end`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ReplayWindow {
    start: DateTime<Utc>,
    end: DateTime<Utc>,
}

impl ReplayWindow {
    /// Create a window, returning `None` unless `start < end`
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Option<Self> {
        (start < end).then_some(Self { start, end })
    }

    /// Inclusive lower bound
    pub fn start(&self) -> DateTime<Utc> {
        self.start
    }

    /// Exclusive upper bound
    pub fn end(&self) -> DateTime<Utc> {
        self.end
    }

    pub fn duration(&self) -> Duration {
        self.end - self.start
    }

    /// Whether `instant` falls inside `[start, end)`
    pub fn contains(&self, instant: DateTime<Utc>) -> bool {
        self.start <= instant && instant < self.end
    }
}

impl std::fmt::Display for ReplayWindow {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "[{}, {})",
            self.start.to_rfc3339_opts(SecondsFormat::Millis, true),
            self.end.to_rfc3339_opts(SecondsFormat::Millis, true)
        )
    }
}

/// The configured historical range and the window size used to walk it
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReplayPlan {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub window_size: Duration,
}

impl ReplayPlan {
    /// Create a plan, returning `None` for an empty range or a non-positive window size
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>, window_size: Duration) -> Option<Self> {
        if start >= end || window_size <= Duration::zero() {
            return None;
        }
        Some(Self {
            start,
            end,
            window_size,
        })
    }

    /// Window that begins at `position`, clamped to the end bound
    ///
    /// Returns `None` once `position` has reached the end bound.
    pub fn window_at(&self, position: DateTime<Utc>) -> Option<ReplayWindow> {
        if position >= self.end {
            return None;
        }
        let end = position
            .checked_add_signed(self.window_size)
            .map_or(self.end, |end| end.min(self.end));
        ReplayWindow::new(position, end)
    }

    /// Every window of the plan, in order
    pub fn windows(&self) -> Windows {
        Windows {
            plan: *self,
            position: self.start,
        }
    }
}

/// Iterator over the contiguous windows of a [`ReplayPlan`]
pub struct Windows {
    plan: ReplayPlan,
    position: DateTime<Utc>,
}

impl Iterator for Windows {
    type Item = ReplayWindow;

    fn next(&mut self) -> Option<Self::Item> {
        let window = self.plan.window_at(self.position)?;
        self.position = window.end();
        Some(window)
    }
}
