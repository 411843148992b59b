//! Replay Scheduler
//!
//! Walks a fixed historical range window by window. Each tick fetches the
//! window at the cursor, hands a non-empty result to the ingestion sink and
//! advances the cursor to the window's end, whatever happened. Failed or
//! empty windows are skipped, never retried, so the replay always makes
//! progress.
//!
//! ```text
//!  Idle ──start──► Running ──cursor ≥ end──► Draining ──► Stopped
//!                     │ ▲
//!                     └─┘ tick: fetch → ingest → advance
//! ```

mod runner;

#[cfg(test)]
mod fakes;

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{debug, error, info, warn};

use crate::fetcher::WindowFetcher;
use crate::ingest::{BatchSink, IngestReport};
use crate::types::{ReplayPlan, ReplayWindow};
use crate::utils::format_instant;

pub use runner::SchedulerHandle;

/// Lifecycle of a scheduler
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulerState {
    Idle,
    Running,
    Draining,
    Stopped,
}

/// Replay position within the configured range
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReplayCursor {
    pub position: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub running: bool,
}

impl ReplayCursor {
    pub fn is_exhausted(&self) -> bool {
        self.position >= self.end
    }
}

/// Result of a single tick
#[derive(Debug, Clone, PartialEq)]
pub enum TickOutcome {
    /// Window fetched and its rows handed to the sink
    Ingested {
        window: ReplayWindow,
        report: IngestReport,
    },
    /// Upstream had nothing for the window
    Empty { window: ReplayWindow },
    /// Fetch failed; the window was skipped
    FetchFailed { window: ReplayWindow },
    /// Rows were fetched but the batch could not be persisted
    PersistFailed { window: ReplayWindow },
    /// Cursor reached the end bound; the scheduler is now stopped
    Finished,
    /// Scheduler is not in the running state
    NotRunning,
}

/// Counters accumulated over a replay
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ReplaySummary {
    pub windows: usize,
    pub empty_windows: usize,
    pub fetch_failures: usize,
    pub persist_failures: usize,
    pub records_persisted: usize,
    pub records_skipped: usize,
    pub final_position: Option<DateTime<Utc>>,
}

/// Owned scheduler driving fetch → ingest over a [`ReplayPlan`]
pub struct ReplayScheduler {
    plan: ReplayPlan,
    fetcher: Arc<dyn WindowFetcher>,
    sink: Arc<dyn BatchSink>,
    cursor: ReplayCursor,
    state: SchedulerState,
    summary: ReplaySummary,
}

impl ReplayScheduler {
    pub fn new(plan: ReplayPlan, fetcher: Arc<dyn WindowFetcher>, sink: Arc<dyn BatchSink>) -> Self {
        Self {
            plan,
            fetcher,
            sink,
            cursor: ReplayCursor {
                position: plan.start,
                end: plan.end,
                running: false,
            },
            state: SchedulerState::Idle,
            summary: ReplaySummary::default(),
        }
    }

    pub fn plan(&self) -> &ReplayPlan {
        &self.plan
    }

    pub fn state(&self) -> SchedulerState {
        self.state
    }

    pub fn cursor(&self) -> ReplayCursor {
        self.cursor
    }

    pub fn summary(&self) -> &ReplaySummary {
        &self.summary
    }

    /// Move from `Idle` to `Running` with the cursor at the range start
    ///
    /// Returns false if the scheduler was already started.
    pub fn start(&mut self) -> bool {
        if self.state != SchedulerState::Idle {
            return false;
        }
        self.cursor.position = self.plan.start;
        self.cursor.running = true;
        self.state = SchedulerState::Running;

        info!(
            start = %format_instant(self.plan.start),
            end = %format_instant(self.plan.end),
            window_ms = self.plan.window_size.num_milliseconds(),
            "Starting telemetry replay"
        );
        true
    }

    /// Tear the scheduler down without waiting for the cursor to finish
    pub fn stop(&mut self) {
        if self.state == SchedulerState::Stopped {
            return;
        }
        info!(position = %format_instant(self.cursor.position), "Replay stopped before completion");
        self.cursor.running = false;
        self.state = SchedulerState::Stopped;
        self.summary.final_position = Some(self.cursor.position);
    }

    /// Process one window
    pub async fn tick(&mut self) -> TickOutcome {
        if self.state != SchedulerState::Running {
            return TickOutcome::NotRunning;
        }

        let window = match self.plan.window_at(self.cursor.position) {
            Some(window) => window,
            None => {
                self.finish();
                return TickOutcome::Finished;
            }
        };

        debug!(window = %window, "Fetching window");
        self.summary.windows += 1;

        let outcome = match self.fetcher.fetch(window).await {
            Ok(records) if records.is_empty() => {
                warn!(window = %window, "No data for interval");
                self.summary.empty_windows += 1;
                TickOutcome::Empty { window }
            }
            Ok(records) => {
                info!(window = %window, records = records.len(), "Processing telemetry points");
                match self.sink.ingest_window(window, records).await {
                    Ok(report) => {
                        self.summary.records_persisted += report.persisted;
                        self.summary.records_skipped += report.skipped;
                        TickOutcome::Ingested { window, report }
                    }
                    Err(e) => {
                        error!(
                            window_start = %format_instant(window.start()),
                            window_end = %format_instant(window.end()),
                            error = %e,
                            "Failed to ingest window"
                        );
                        self.summary.persist_failures += 1;
                        TickOutcome::PersistFailed { window }
                    }
                }
            }
            Err(e) => {
                error!(
                    window_start = %format_instant(window.start()),
                    window_end = %format_instant(window.end()),
                    error = %e,
                    "Failed to fetch window"
                );
                self.summary.fetch_failures += 1;
                TickOutcome::FetchFailed { window }
            }
        };

        self.advance(window.end());
        outcome
    }

    fn advance(&mut self, to: DateTime<Utc>) {
        if to > self.cursor.position {
            self.cursor.position = to;
        }
    }

    fn finish(&mut self) {
        self.state = SchedulerState::Draining;
        self.cursor.running = false;
        self.summary.final_position = Some(self.cursor.position);
        self.state = SchedulerState::Stopped;

        info!(
            windows = self.summary.windows,
            persisted = self.summary.records_persisted,
            fetch_failures = self.summary.fetch_failures,
            persist_failures = self.summary.persist_failures,
            "Race telemetry replay completed"
        );
    }
}
