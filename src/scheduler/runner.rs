//! Periodic driver for a [`ReplayScheduler`]
//!
//! A single task owns the scheduler and alternates between waiting for the
//! next tick and running one full iteration. Iterations therefore never
//! overlap: if an iteration outlives the tick period, the next one starts
//! as soon as it completes and the missed ticks are not replayed in a burst.

use std::time::Duration;

use tokio::sync::watch;
use tokio::task::{JoinError, JoinHandle};
use tokio::time::MissedTickBehavior;

use super::{ReplayScheduler, ReplaySummary, TickOutcome};

/// Handle to a running replay task
pub struct SchedulerHandle {
    stop_tx: watch::Sender<bool>,
    task: JoinHandle<ReplaySummary>,
}

impl SchedulerHandle {
    /// Ask the task to stop; an iteration in flight still completes
    pub fn stop(&self) {
        let _ = self.stop_tx.send(true);
    }

    /// Wait for the task to end without giving up the handle
    ///
    /// Must not be awaited again once it has returned.
    pub async fn wait(&mut self) -> Result<ReplaySummary, JoinError> {
        (&mut self.task).await
    }

    /// Wait for the task to end and collect its summary
    pub async fn join(self) -> Result<ReplaySummary, JoinError> {
        let Self { stop_tx, task } = self;
        let summary = task.await;
        // Dropping the sender earlier would read as a stop request
        drop(stop_tx);
        summary
    }
}

impl ReplayScheduler {
    /// Start the scheduler on its own task, ticking every `tick_interval`
    ///
    /// Dropping the returned handle stops the task at the next tick.
    pub fn spawn(mut self, tick_interval: Duration) -> SchedulerHandle {
        let (stop_tx, mut stop_rx) = watch::channel(false);
        let period = tick_interval.max(Duration::from_millis(1));

        let task = tokio::spawn(async move {
            self.start();

            let mut ticker = tokio::time::interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    biased;
                    _ = stop_rx.changed() => {
                        self.stop();
                        break;
                    }
                    _ = ticker.tick() => {}
                }

                match self.tick().await {
                    TickOutcome::Finished | TickOutcome::NotRunning => break,
                    _ => {}
                }
            }

            self.summary().clone()
        });

        SchedulerHandle { stop_tx, task }
    }
}
