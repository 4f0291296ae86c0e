//! Concrete notification sinks.
//!
//! [`LogNotifier`] writes each notification to the tracing log and
//! [`OutboxNotifier`] appends it to a JSON-lines file for another process to
//! deliver. [`FanoutNotifier`] combines several sinks. [`CooldownNotifier`]
//! wraps any sink and suppresses repeats of the same notification within a
//! cooldown window, using a [`NotificationLedger`] persisted as
//! `notification_states.json` in the config directory so the window survives
//! restarts.

use std::collections::HashMap;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use subtrack_core::batch::{BatchReport, NotificationFailure};
use subtrack_core::clock::{Clock, SystemClock};
use subtrack_core::error::SinkError;
use subtrack_core::models::Notification;
use subtrack_core::sinks::NotificationSink;

// ── LogNotifier ───────────────────────────────────────────────────────────────

/// Logs every notification at `info` level.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogNotifier;

impl NotificationSink for LogNotifier {
    fn notify(&self, notification: &Notification) -> Result<(), SinkError> {
        tracing::info!(
            user_id = notification.user_id.as_deref().unwrap_or("N/A"),
            title = %notification.title,
            "[Notification Sent] {}",
            notification.body
        );
        Ok(())
    }
}

// ── OutboxNotifier ────────────────────────────────────────────────────────────

/// One line of the outbox file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OutboxEntry {
    pub queued_at: DateTime<Utc>,
    #[serde(flatten)]
    pub notification: Notification,
}

/// Appends notifications as JSON lines to a file.
pub struct OutboxNotifier {
    path: PathBuf,
    clock: Arc<dyn Clock>,
    lock: Mutex<()>,
}

impl OutboxNotifier {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self::with_clock(path, Arc::new(SystemClock))
    }

    pub fn with_clock(path: impl Into<PathBuf>, clock: Arc<dyn Clock>) -> Self {
        Self {
            path: path.into(),
            clock,
            lock: Mutex::new(()),
        }
    }
}

impl NotificationSink for OutboxNotifier {
    fn notify(&self, notification: &Notification) -> Result<(), SinkError> {
        let entry = OutboxEntry {
            queued_at: self.clock.now(),
            notification: notification.clone(),
        };
        let line = serde_json::to_string(&entry)?;

        let _guard = self
            .lock
            .lock()
            .map_err(|_| SinkError::Rejected("outbox lock poisoned".to_string()))?;
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        writeln!(file, "{line}")?;
        Ok(())
    }
}

// ── FanoutNotifier ────────────────────────────────────────────────────────────

/// Sends every notification to each inner sink in order.
///
/// All sinks are attempted; the first error is returned.
#[derive(Default)]
pub struct FanoutNotifier {
    sinks: Vec<Box<dyn NotificationSink>>,
}

impl FanoutNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, sink: impl NotificationSink + 'static) -> Self {
        self.sinks.push(Box::new(sink));
        self
    }

    pub fn sink_count(&self) -> usize {
        self.sinks.len()
    }
}

impl NotificationSink for FanoutNotifier {
    fn notify(&self, notification: &Notification) -> Result<(), SinkError> {
        let mut first_err = None;
        for sink in &self.sinks {
            if let Err(e) = sink.notify(notification) {
                tracing::warn!(error = %e, "notification sink failed");
                first_err.get_or_insert(e);
            }
        }
        first_err.map_or(Ok(()), Err)
    }
}

// ── NotificationLedger ────────────────────────────────────────────────────────

/// Persisted state for one notification key.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct NotificationState {
    /// Whether this notification has been sent at least once.
    pub triggered: bool,
    /// UTC time of the last send.
    pub timestamp: Option<DateTime<Utc>>,
}

/// Send history keyed by notification identity.
///
/// Save and load failures are logged and never propagated; the ledger then
/// works in memory only.
#[derive(Debug)]
pub struct NotificationLedger {
    file: PathBuf,
    states: HashMap<String, NotificationState>,
}

impl NotificationLedger {
    /// Ledger stored at `config_dir/notification_states.json`.
    pub fn new(config_dir: &Path) -> Self {
        let file = config_dir.join("notification_states.json");
        let states = Self::load_states(&file);
        Self { file, states }
    }

    /// Identity of a notification: recipient, title and body.
    pub fn key_for(notification: &Notification) -> String {
        format!(
            "{}|{}|{}",
            notification.user_id.as_deref().unwrap_or("N/A"),
            notification.title,
            notification.body
        )
    }

    /// `true` unless `key` was sent less than `cooldown_hours` before `now`.
    pub fn should_notify(&self, key: &str, cooldown_hours: f64, now: DateTime<Utc>) -> bool {
        match self.get_notification_state(key) {
            NotificationState {
                triggered: true,
                timestamp: Some(ts),
            } => {
                let elapsed_secs = (now - ts).num_seconds() as f64;
                elapsed_secs >= cooldown_hours * 3600.0
            }
            _ => true,
        }
    }

    /// Record a send of `key` at `now` and persist.
    pub fn mark_notified(&mut self, key: &str, now: DateTime<Utc>) {
        self.states.insert(
            key.to_string(),
            NotificationState {
                triggered: true,
                timestamp: Some(now),
            },
        );
        self.save_states();
    }

    pub fn get_notification_state(&self, key: &str) -> NotificationState {
        self.states.get(key).cloned().unwrap_or_default()
    }

    /// Drop entries last sent before `now - max_age`.
    pub fn prune(&mut self, now: DateTime<Utc>, max_age: Duration) {
        let Some(cutoff) = now.checked_sub_signed(max_age) else {
            return;
        };
        let before = self.states.len();
        self.states
            .retain(|_, state| state.timestamp.is_some_and(|ts| ts >= cutoff));
        if self.states.len() != before {
            tracing::debug!(removed = before - self.states.len(), "pruned notification ledger");
            self.save_states();
        }
    }

    pub fn entry_count(&self) -> usize {
        self.states.len()
    }

    fn load_states(path: &Path) -> HashMap<String, NotificationState> {
        if !path.exists() {
            return HashMap::new();
        }
        match std::fs::read_to_string(path) {
            Ok(content) => match serde_json::from_str(&content) {
                Ok(states) => states,
                Err(e) => {
                    tracing::warn!(
                        error = %e,
                        path = %path.display(),
                        "failed to deserialise notification states; starting empty"
                    );
                    HashMap::new()
                }
            },
            Err(e) => {
                tracing::warn!(
                    error = %e,
                    path = %path.display(),
                    "failed to read notification states file; starting empty"
                );
                HashMap::new()
            }
        }
    }

    fn save_states(&self) {
        let json = match serde_json::to_string_pretty(&self.states) {
            Ok(json) => json,
            Err(e) => {
                tracing::warn!(error = %e, "failed to serialise notification states");
                return;
            }
        };
        if let Some(parent) = self.file.parent() {
            if let Err(e) = std::fs::create_dir_all(parent) {
                tracing::warn!(error = %e, path = %parent.display(), "failed to create ledger directory");
                return;
            }
        }
        if let Err(e) = std::fs::write(&self.file, json) {
            tracing::warn!(
                error = %e,
                path = %self.file.display(),
                "failed to save notification states"
            );
        }
    }
}

// ── CooldownNotifier ──────────────────────────────────────────────────────────

/// Forwards a notification to the inner sink only when the same
/// notification was not sent within the cooldown.
///
/// A suppressed notification counts as delivered. The ledger is updated only
/// after the inner sink accepts, so failed sends are retried next run.
pub struct CooldownNotifier {
    inner: Box<dyn NotificationSink>,
    ledger: Mutex<NotificationLedger>,
    cooldown_hours: f64,
    clock: Arc<dyn Clock>,
}

impl CooldownNotifier {
    pub fn new(
        inner: Box<dyn NotificationSink>,
        mut ledger: NotificationLedger,
        cooldown_hours: f64,
        clock: Arc<dyn Clock>,
    ) -> Self {
        // Entries older than the window can never suppress anything again.
        let max_age = Duration::try_seconds((cooldown_hours * 3600.0).ceil() as i64)
            .unwrap_or(Duration::MAX);
        ledger.prune(clock.now(), max_age);
        tracing::debug!(
            entries = ledger.entry_count(),
            cooldown_hours,
            "notification ledger loaded"
        );
        Self {
            inner,
            ledger: Mutex::new(ledger),
            cooldown_hours,
            clock,
        }
    }
}

impl NotificationSink for CooldownNotifier {
    fn notify(&self, notification: &Notification) -> Result<(), SinkError> {
        let key = NotificationLedger::key_for(notification);
        let now = self.clock.now();
        let mut ledger = self
            .ledger
            .lock()
            .map_err(|_| SinkError::Rejected("notification ledger lock poisoned".to_string()))?;

        if !ledger.should_notify(&key, self.cooldown_hours, now) {
            tracing::debug!(title = %notification.title, "notification suppressed by cooldown");
            return Ok(());
        }

        self.inner.notify(notification)?;
        ledger.mark_notified(&key, now);
        Ok(())
    }
}

// ── Expiry dispatch ───────────────────────────────────────────────────────────

/// Send every near-expiry alert in `report` through `sink`, recording
/// failures in the report. Returns the number of alerts delivered.
pub fn dispatch_expiring(report: &mut BatchReport, sink: &dyn NotificationSink) -> usize {
    let mut delivered = 0;
    for alert in &report.expiring {
        match sink.notify(&alert.notification) {
            Ok(()) => delivered += 1,
            Err(e) => {
                tracing::warn!(
                    record_id = %alert.record_id,
                    error = %e,
                    "failed to send expiry notification"
                );
                report.notification_failures.push(NotificationFailure {
                    record_id: alert.record_id.clone(),
                    kind: alert.kind,
                    error: e.to_string(),
                });
            }
        }
    }
    delivered
}

// ── Tests ─────────────────────────────────────────────────────────────────────
