//! One end-to-end run: fetch, analyse, optionally dispatch expiry alerts,
//! report.

use std::sync::Arc;

use subtrack_core::batch::{BatchReport, BatchRunner, RecordSource};
use subtrack_core::clock::Clock;
use subtrack_core::error::Result;
use subtrack_core::sinks::{NotificationSink, ReportSink};

use crate::notifier::dispatch_expiring;

/// The collaborators of a batch run, wired together.
///
/// Stale alerts are dispatched by the core runner; near-expiry alerts are
/// forwarded from here when `notify_expiry` is set.
pub struct TrackerService {
    runner: BatchRunner,
    source: Box<dyn RecordSource>,
    notifier: Arc<dyn NotificationSink>,
    reporter: Box<dyn ReportSink>,
    clock: Arc<dyn Clock>,
    notify_expiry: bool,
}

impl TrackerService {
    pub fn new(
        runner: BatchRunner,
        source: Box<dyn RecordSource>,
        notifier: Arc<dyn NotificationSink>,
        reporter: Box<dyn ReportSink>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            runner,
            source,
            notifier,
            reporter,
            clock,
            notify_expiry: false,
        }
    }

    pub fn with_expiry_notifications(mut self, enabled: bool) -> Self {
        self.notify_expiry = enabled;
        self
    }

    /// Run one batch as of the clock's `now` and hand the report to the
    /// reporting sink.
    ///
    /// Source and reporting failures are returned; notification failures are
    /// recorded in the report.
    pub fn run_once(&self) -> Result<BatchReport> {
        let now = self.clock.now();
        let mut report = self.runner.run(self.source.as_ref(), now)?;

        if self.notify_expiry && !report.expiring.is_empty() {
            let sent = dispatch_expiring(&mut report, self.notifier.as_ref());
            tracing::debug!(sent, "expiry notifications dispatched");
        }

        report.publish(self.reporter.as_ref())?;
        Ok(report)
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
