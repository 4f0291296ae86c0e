//! One pass of every analysis over a collection of subscription records.
//!
//! The runner is the composition root of the core: for each record it runs
//! the cost model, the staleness rule and the expiry rule independently,
//! dispatches stale-subscription notifications through the injected sink,
//! and folds everything into a single [`BatchReport`].
//!
//! The whole batch is held in memory. Callers with very large record sets
//! should partition them before calling in.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::cost::{CostAnalyzer, CostBreakdown};
use crate::error::{RecordError, Result, TrackerError};
use crate::expiry::{ExpiryClassifier, DEFAULT_EXPIRY_WINDOW_DAYS};
use crate::formatting::round_to;
use crate::models::{Alert, AlertKind, SubscriptionRecord};
use crate::sinks::{NotificationSink, ReportSink};
use crate::staleness::{StalenessClassifier, DEFAULT_STALE_AFTER_DAYS};
use crate::time_utils::TimezoneHandler;

// ── Configuration ─────────────────────────────────────────────────────────────

/// Thresholds and display settings for a batch run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchConfig {
    /// Idle days after which a used subscription counts as stale.
    pub stale_after_days: u32,
    /// Days ahead of `now` in which a due date counts as near expiry.
    pub expiry_window_days: u32,
    /// IANA timezone used to render dates in messages.
    pub timezone: String,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            stale_after_days: DEFAULT_STALE_AFTER_DAYS,
            expiry_window_days: DEFAULT_EXPIRY_WINDOW_DAYS,
            timezone: "UTC".to_string(),
        }
    }
}

// ── Report ────────────────────────────────────────────────────────────────────

/// A record left out of the cost totals, and why.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SkippedRecord {
    pub record_id: String,
    pub name: String,
    pub reason: RecordError,
}

/// A notification the sink refused.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NotificationFailure {
    pub record_id: String,
    pub kind: AlertKind,
    pub error: String,
}

/// Terminal output of one batch run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchReport {
    /// The `now` the batch was evaluated against.
    pub generated_at: DateTime<Utc>,
    /// Entries received from the source, including rejected ones.
    pub records_seen: usize,
    /// Cost breakdown for every record that passed validation.
    pub costs: Vec<CostBreakdown>,
    /// Sum of `daily_cost` over `costs`.
    pub total_daily_cost: f64,
    pub stale: Vec<Alert>,
    pub expiring: Vec<Alert>,
    /// Records excluded from cost analysis.
    pub skipped: Vec<SkippedRecord>,
    /// Ids of costed records that carried no usage hours.
    pub without_usage: Vec<String>,
    pub notification_failures: Vec<NotificationFailure>,
}

impl BatchReport {
    fn empty(now: DateTime<Utc>) -> Self {
        Self {
            generated_at: now,
            records_seen: 0,
            costs: Vec::new(),
            total_daily_cost: 0.0,
            stale: Vec::new(),
            expiring: Vec::new(),
            skipped: Vec::new(),
            without_usage: Vec::new(),
            notification_failures: Vec::new(),
        }
    }

    /// `true` when any notification failed to dispatch.
    pub fn has_sink_failures(&self) -> bool {
        !self.notification_failures.is_empty()
    }

    /// Hand the report to `sink`. A refusal is fatal to the run.
    pub fn publish(&self, sink: &dyn ReportSink) -> Result<()> {
        sink.report(self).map_err(|e| {
            warn!(error = %e, "report sink failed");
            TrackerError::Report(e)
        })
    }

    /// Copy with every monetary figure rounded to `decimals` places.
    ///
    /// The total is rounded from the unrounded sum, not re-summed from
    /// rounded parts.
    pub fn rounded(&self, decimals: u32) -> Self {
        let mut out = self.clone();
        out.total_daily_cost = round_to(self.total_daily_cost, decimals);
        for cost in &mut out.costs {
            cost.daily_cost = round_to(cost.daily_cost, decimals);
            if let Some(usage) = cost.usage.as_mut() {
                usage.hourly_cost = round_to(usage.hourly_cost, decimals);
                usage.daily_used_cost = round_to(usage.daily_used_cost, decimals);
            }
        }
        out
    }
}

// ── Record source ─────────────────────────────────────────────────────────────

/// One item from a record source: a typed record, or a document the
/// ingestion boundary could not turn into one.
pub type SourceEntry = std::result::Result<SubscriptionRecord, SkippedRecord>;

/// Supplies the full record collection for one batch.
///
/// An `Err` from [`RecordSource::fetch`] is the only failure that aborts a
/// batch.
pub trait RecordSource: Send + Sync {
    fn fetch(&self) -> Result<Vec<SourceEntry>>;
}

impl RecordSource for Vec<SubscriptionRecord> {
    fn fetch(&self) -> Result<Vec<SourceEntry>> {
        Ok(self.iter().cloned().map(Ok).collect())
    }
}

// ── BatchRunner ───────────────────────────────────────────────────────────────

/// Runs the per-record analyses and dispatches stale notifications.
pub struct BatchRunner {
    notifier: Box<dyn NotificationSink>,
    config: BatchConfig,
    display: TimezoneHandler,
}

impl BatchRunner {
    /// Create a runner that sends stale alerts to `notifier`.
    pub fn new(notifier: Box<dyn NotificationSink>, config: BatchConfig) -> Self {
        let display = TimezoneHandler::new(&config.timezone);
        Self {
            notifier,
            config,
            display,
        }
    }

    /// Analyse `records` as of `now`.
    pub fn run_batch(&self, records: &[SubscriptionRecord], now: DateTime<Utc>) -> BatchReport {
        self.process(records.iter().cloned().map(Ok).collect(), now)
    }

    /// Fetch from `source` and analyse the result.
    ///
    /// Fails only when the source itself fails.
    pub fn run(&self, source: &dyn RecordSource, now: DateTime<Utc>) -> Result<BatchReport> {
        let entries = source.fetch()?;
        Ok(self.process(entries, now))
    }

    /// Visit every entry once, in order.
    pub fn process(&self, entries: Vec<SourceEntry>, now: DateTime<Utc>) -> BatchReport {
        let mut report = BatchReport::empty(now);
        report.records_seen = entries.len();

        for entry in entries {
            match entry {
                Ok(record) => self.process_record(&record, now, &mut report),
                Err(rejected) => {
                    warn!(
                        record_id = %rejected.record_id,
                        reason = %rejected.reason,
                        "record rejected at ingestion"
                    );
                    report.skipped.push(rejected);
                }
            }
        }

        report.total_daily_cost = CostAnalyzer::total_daily_cost(&report.costs);

        info!(
            records = report.records_seen,
            costed = report.costs.len(),
            skipped = report.skipped.len(),
            stale = report.stale.len(),
            expiring = report.expiring.len(),
            total_daily_cost = report.total_daily_cost,
            "batch complete"
        );

        report
    }

    fn process_record(
        &self,
        record: &SubscriptionRecord,
        now: DateTime<Utc>,
        report: &mut BatchReport,
    ) {
        debug!(record_id = %record.id, name = %record.name, "processing subscription");

        match CostAnalyzer::analyze(record) {
            Ok(breakdown) => {
                if breakdown.usage.is_none() {
                    debug!(record_id = %record.id, "no usage data; usage cost skipped");
                    report.without_usage.push(record.id.clone());
                }
                report.costs.push(breakdown);
            }
            Err(reason) => {
                warn!(record_id = %record.id, %reason, "cost analysis skipped");
                report.skipped.push(SkippedRecord {
                    record_id: record.id.clone(),
                    name: record.name.clone(),
                    reason,
                });
            }
        }

        if let Some(alert) = StalenessClassifier::check(record, self.config.stale_after_days, now)
        {
            if let Err(e) = self.notifier.notify(&alert.notification) {
                warn!(record_id = %record.id, error = %e, "stale notification failed");
                report.notification_failures.push(NotificationFailure {
                    record_id: record.id.clone(),
                    kind: AlertKind::Stale,
                    error: e.to_string(),
                });
            }
            report.stale.push(alert);
        }

        if let Some(alert) = ExpiryClassifier::check(
            record,
            self.config.expiry_window_days,
            now,
            &self.display,
        ) {
            report.expiring.push(alert);
        }
    }
}

// ── Tests ──────────────────────────────────────────────────────────────────────
