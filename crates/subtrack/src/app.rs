use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::Result;
use subtrack_core::batch::{BatchReport, BatchRunner};
use subtrack_core::clock::{Clock, FixedClock, SystemClock};
use subtrack_core::settings::Settings;
use subtrack_core::sinks::{NotificationSink, ReportSink};
use subtrack_core::time_utils::TimezoneHandler;
use subtrack_data::FileRecordSource;
use subtrack_runtime::notifier::{
    CooldownNotifier, FanoutNotifier, LogNotifier, NotificationLedger, OutboxNotifier,
};
use subtrack_runtime::reporter::{JsonReporter, TextReporter};
use subtrack_runtime::TrackerService;

/// `--now` when given, otherwise the wall clock.
pub fn build_clock(settings: &Settings) -> Arc<dyn Clock> {
    match settings.now {
        Some(instant) => Arc::new(FixedClock(instant)),
        None => Arc::new(SystemClock),
    }
}

/// Log sink, plus the outbox when `--outbox` is set, behind the cooldown
/// ledger when `--cooldown-hours` is positive.
pub fn build_notifier(
    settings: &Settings,
    config_dir: &Path,
    clock: &Arc<dyn Clock>,
) -> Arc<dyn NotificationSink> {
    let mut fanout = FanoutNotifier::new().with(LogNotifier);
    if let Some(outbox) = &settings.outbox {
        fanout = fanout.with(OutboxNotifier::with_clock(outbox, Arc::clone(clock)));
    }
    tracing::debug!(
        sinks = fanout.sink_count(),
        cooldown_hours = settings.cooldown_hours,
        "notification sinks configured"
    );

    if settings.cooldown_hours > 0.0 {
        Arc::new(CooldownNotifier::new(
            Box::new(fanout),
            NotificationLedger::new(config_dir),
            settings.cooldown_hours,
            Arc::clone(clock),
        ))
    } else {
        Arc::new(fanout)
    }
}

/// Reporter for `--format` writing to stdout.
pub fn build_reporter(settings: &Settings) -> Box<dyn ReportSink> {
    match settings.format.as_str() {
        "json" => Box::new(JsonReporter::stdout()),
        _ => Box::new(TextReporter::stdout(
            settings.currency.clone(),
            TimezoneHandler::new(&settings.timezone),
        )),
    }
}

/// Wire the record source, runner, sinks and clock described by `settings`.
pub fn build_service(
    settings: &Settings,
    data_path: PathBuf,
    config_dir: &Path,
    reporter: Box<dyn ReportSink>,
) -> TrackerService {
    let clock = build_clock(settings);
    let notifier = build_notifier(settings, config_dir, &clock);
    let source =
        FileRecordSource::new(data_path, &settings.timezone).with_user(settings.user.clone());
    let runner = BatchRunner::new(Box::new(Arc::clone(&notifier)), settings.batch_config());

    TrackerService::new(runner, Box::new(source), notifier, reporter, clock)
        .with_expiry_notifications(settings.notify_expiry)
}

/// Non-zero when any notification could not be delivered.
pub fn exit_code(report: &BatchReport) -> ExitCode {
    if report.has_sink_failures() {
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    }
}

/// One-shot mode: a single run, fatal errors propagate.
pub fn run_once(service: &TrackerService) -> Result<ExitCode> {
    let report = service.run_once()?;
    if report.has_sink_failures() {
        tracing::warn!(
            failures = report.notification_failures.len(),
            "some notifications were not delivered"
        );
    }
    Ok(exit_code(&report))
}

// ── Tests ──────────────────────────────────────────────────────────────────────
