//! Reporting sinks: a human-readable console report and a JSON document.
//!
//! Both round monetary figures to cents on the way out; the report they
//! receive is unrounded.

use std::fmt::Write as _;
use std::io::Write;
use std::sync::Mutex;

use subtrack_core::batch::BatchReport;
use subtrack_core::error::SinkError;
use subtrack_core::formatting::{format_currency, format_days, format_hours};
use subtrack_core::sinks::ReportSink;
use subtrack_core::time_utils::TimezoneHandler;

/// Decimal places of every reported amount.
pub const REPORT_DECIMALS: u32 = 2;

// ── TextReporter ──────────────────────────────────────────────────────────────

/// Writes a sectioned plain-text report.
pub struct TextReporter<W: Write + Send> {
    currency: String,
    display: TimezoneHandler,
    out: Mutex<W>,
}

impl TextReporter<std::io::Stdout> {
    pub fn stdout(currency: impl Into<String>, display: TimezoneHandler) -> Self {
        Self::new(std::io::stdout(), currency, display)
    }
}

impl<W: Write + Send> TextReporter<W> {
    pub fn new(out: W, currency: impl Into<String>, display: TimezoneHandler) -> Self {
        Self {
            currency: currency.into(),
            display,
            out: Mutex::new(out),
        }
    }

    /// Recover the writer, e.g. to inspect a buffer in tests.
    pub fn into_inner(self) -> W {
        match self.out.into_inner() {
            Ok(w) => w,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    fn money(&self, amount: f64) -> String {
        format_currency(amount, &self.currency)
    }

    /// Render `report` without writing it.
    pub fn render(&self, report: &BatchReport) -> String {
        let mut s = String::new();
        // Writing into a String cannot fail.
        let _ = self.render_into(&mut s, report);
        s
    }

    fn render_into(&self, s: &mut String, report: &BatchReport) -> std::fmt::Result {
        writeln!(
            s,
            "Subscription report for {} ({} records)",
            self.display.format_datetime(report.generated_at),
            report.records_seen
        )?;

        writeln!(s)?;
        writeln!(s, "Daily cost")?;
        if report.costs.is_empty() {
            writeln!(s, "  No subscriptions with a price and due date.")?;
        }
        for cost in &report.costs {
            writeln!(
                s,
                "  {} (User: {}): {}/day over {}",
                cost.name,
                cost.user_id.as_deref().unwrap_or("N/A"),
                self.money(cost.daily_cost),
                format_days(cost.cycle.length_days)
            )?;
        }
        writeln!(s, "  Total daily cost: {}", self.money(report.total_daily_cost))?;

        writeln!(s)?;
        writeln!(s, "Usage")?;
        for cost in &report.costs {
            if let Some(usage) = &cost.usage {
                writeln!(
                    s,
                    "  {}: {}/hr over {}, {}/day across {}",
                    cost.name,
                    self.money(usage.hourly_cost),
                    format_hours(usage.usage_hours),
                    self.money(usage.daily_used_cost),
                    format_days(usage.days_since_start)
                )?;
            }
        }
        if !report.without_usage.is_empty() {
            let names: Vec<&str> = report
                .without_usage
                .iter()
                .map(|id| {
                    report
                        .costs
                        .iter()
                        .find(|c| &c.record_id == id)
                        .map_or(id.as_str(), |c| c.name.as_str())
                })
                .collect();
            writeln!(s, "  No usage data: {}", names.join(", "))?;
        }

        writeln!(s)?;
        writeln!(s, "Stale subscriptions")?;
        if report.stale.is_empty() {
            writeln!(s, "  No stale subscriptions found.")?;
        }
        for alert in &report.stale {
            writeln!(s, "  {}", alert.notification.body)?;
        }

        writeln!(s)?;
        writeln!(s, "Expiring soon")?;
        if report.expiring.is_empty() {
            writeln!(s, "  No subscriptions nearing expiry.")?;
        }
        for alert in &report.expiring {
            writeln!(s, "  {}", alert.notification.body)?;
        }

        if !report.skipped.is_empty() {
            writeln!(s)?;
            writeln!(s, "Skipped")?;
            for skipped in &report.skipped {
                let label = if skipped.name.is_empty() {
                    skipped.record_id.clone()
                } else {
                    format!("{} ({})", skipped.name, skipped.record_id)
                };
                writeln!(s, "  {label}: {}", skipped.reason)?;
            }
        }

        if report.has_sink_failures() {
            writeln!(s)?;
            writeln!(s, "Notification failures")?;
            for failure in &report.notification_failures {
                writeln!(
                    s,
                    "  {} [{}]: {}",
                    failure.record_id,
                    failure.kind.as_str(),
                    failure.error
                )?;
            }
        }

        Ok(())
    }
}

impl<W: Write + Send> ReportSink for TextReporter<W> {
    fn report(&self, report: &BatchReport) -> Result<(), SinkError> {
        let text = self.render(report);
        let mut out = self
            .out
            .lock()
            .map_err(|_| SinkError::Rejected("report writer lock poisoned".to_string()))?;
        out.write_all(text.as_bytes())?;
        out.flush()?;
        Ok(())
    }
}

// ── JsonReporter ──────────────────────────────────────────────────────────────

/// Writes the rounded report as one pretty-printed JSON document.
pub struct JsonReporter<W: Write + Send> {
    out: Mutex<W>,
}

impl JsonReporter<std::io::Stdout> {
    pub fn stdout() -> Self {
        Self::new(std::io::stdout())
    }
}

impl<W: Write + Send> JsonReporter<W> {
    pub fn new(out: W) -> Self {
        Self {
            out: Mutex::new(out),
        }
    }

    pub fn into_inner(self) -> W {
        match self.out.into_inner() {
            Ok(w) => w,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

impl<W: Write + Send> ReportSink for JsonReporter<W> {
    fn report(&self, report: &BatchReport) -> Result<(), SinkError> {
        let json = serde_json::to_string_pretty(&report.rounded(REPORT_DECIMALS))?;
        let mut out = self
            .out
            .lock()
            .map_err(|_| SinkError::Rejected("report writer lock poisoned".to_string()))?;
        writeln!(out, "{json}")?;
        out.flush()?;
        Ok(())
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
