//! Periodic batch runs.
//!
//! Runs a [`TrackerService`] in a tokio task, sending each outcome through an
//! `mpsc` channel so the caller can react to failures without shared state.

use std::time::Duration;

use subtrack_core::batch::BatchReport;
use subtrack_core::error::TrackerError;
use tokio::sync::mpsc;
use tokio::time;

use crate::service::TrackerService;

/// Result of one scheduled run.
pub type RunOutcome = Result<BatchReport, TrackerError>;

/// Re-runs the service on a fixed interval.
pub struct BatchScheduler {
    service: TrackerService,
    interval: Duration,
}

impl BatchScheduler {
    pub fn new(service: TrackerService, interval: Duration) -> Self {
        Self { service, interval }
    }

    /// Spawn the loop. The first run happens immediately.
    ///
    /// The loop stops when the receiver is dropped or the handle aborted.
    pub fn start(self) -> (mpsc::Receiver<RunOutcome>, SchedulerHandle) {
        let (tx, rx) = mpsc::channel(16);
        let handle = tokio::spawn(async move {
            self.run_loop(tx).await;
        });
        (rx, SchedulerHandle { handle })
    }

    async fn run_loop(self, tx: mpsc::Sender<RunOutcome>) {
        let mut interval = time::interval(self.interval);
        // A slow batch should not trigger a burst of catch-up runs.
        interval.set_missed_tick_behavior(time::MissedTickBehavior::Delay);
        let mut run = 0u64;

        loop {
            interval.tick().await;
            if tx.is_closed() {
                tracing::debug!("scheduler channel closed; exiting loop");
                break;
            }

            run += 1;
            let outcome = self.service.run_once();
            match &outcome {
                Ok(report) => tracing::debug!(run, records = report.records_seen, "scheduled run finished"),
                Err(e) => tracing::warn!(run, error = %e, "scheduled run failed"),
            }

            if tx.send(outcome).await.is_err() {
                tracing::debug!("scheduler receiver dropped; exiting loop");
                break;
            }
        }
    }
}

/// Handle to the background scheduler task.
pub struct SchedulerHandle {
    handle: tokio::task::JoinHandle<()>,
}

impl SchedulerHandle {
    /// Stop the loop immediately.
    pub fn abort(&self) {
        self.handle.abort();
    }

    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
