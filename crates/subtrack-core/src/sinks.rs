//! Outbound capability interfaces injected into the batch runner.
//!
//! Concrete delivery (log lines, outbox files, cooldown filtering) lives in
//! `subtrack-runtime`; the core only calls through these traits.

use std::sync::{Arc, Mutex};

use crate::batch::BatchReport;
use crate::error::SinkError;
use crate::models::Notification;

/// Receives one notification per alert. Fire-and-forget from the core's
/// perspective: an `Err` is recorded, never retried.
pub trait NotificationSink: Send + Sync {
    fn notify(&self, notification: &Notification) -> Result<(), SinkError>;
}

/// Receives the terminal output of a batch run.
pub trait ReportSink: Send + Sync {
    fn report(&self, report: &BatchReport) -> Result<(), SinkError>;
}

impl<T: NotificationSink + ?Sized> NotificationSink for Box<T> {
    fn notify(&self, notification: &Notification) -> Result<(), SinkError> {
        (**self).notify(notification)
    }
}

impl<T: NotificationSink + ?Sized> NotificationSink for Arc<T> {
    fn notify(&self, notification: &Notification) -> Result<(), SinkError> {
        (**self).notify(notification)
    }
}

impl<T: ReportSink + ?Sized> ReportSink for Box<T> {
    fn report(&self, report: &BatchReport) -> Result<(), SinkError> {
        (**self).report(report)
    }
}

impl<T: ReportSink + ?Sized> ReportSink for Arc<T> {
    fn report(&self, report: &BatchReport) -> Result<(), SinkError> {
        (**self).report(report)
    }
}

// ── In-memory sinks ───────────────────────────────────────────────────────────

/// Notification sink that keeps every payload in memory.
///
/// Useful for embedding the core in a service that drains alerts itself.
#[derive(Debug, Default)]
pub struct CollectingNotifier {
    sent: Mutex<Vec<Notification>>,
}

impl CollectingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of everything received so far, in arrival order.
    pub fn sent(&self) -> Vec<Notification> {
        self.sent
            .lock()
            .map(|guard| guard.clone())
            .unwrap_or_default()
    }
}

impl NotificationSink for CollectingNotifier {
    fn notify(&self, notification: &Notification) -> Result<(), SinkError> {
        let mut guard = self
            .sent
            .lock()
            .map_err(|_| SinkError::Rejected("collector lock poisoned".to_string()))?;
        guard.push(notification.clone());
        Ok(())
    }
}

/// Notification sink that discards everything.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullNotifier;

impl NotificationSink for NullNotifier {
    fn notify(&self, _notification: &Notification) -> Result<(), SinkError> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn note(body: &str) -> Notification {
        Notification {
            user_id: None,
            title: "t".to_string(),
            body: body.to_string(),
        }
    }

    #[test]
    fn test_collecting_notifier_keeps_order() {
        let sink = CollectingNotifier::new();
        sink.notify(&note("first")).unwrap();
        sink.notify(&note("second")).unwrap();
        let sent = sink.sent();
        assert_eq!(sent.len(), 2);
        assert_eq!(sent[0].body, "first");
        assert_eq!(sent[1].body, "second");
    }

    #[test]
    fn test_boxed_and_shared_sinks_delegate() {
        let shared = Arc::new(CollectingNotifier::new());
        let boxed: Box<dyn NotificationSink> = Box::new(Arc::clone(&shared));
        boxed.notify(&note("via box")).unwrap();
        assert_eq!(shared.sent().len(), 1);
    }

    #[test]
    fn test_null_notifier_accepts_everything() {
        assert!(NullNotifier.notify(&note("ignored")).is_ok());
    }
}
