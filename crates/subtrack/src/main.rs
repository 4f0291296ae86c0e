mod app;
mod bootstrap;

use std::process::ExitCode;
use std::time::Duration;

use anyhow::Result;
use subtrack_core::settings::Settings;
use subtrack_data::reader::resolve_data_path;
use subtrack_runtime::scheduler::BatchScheduler;

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let settings = Settings::load_with_last_used();

    bootstrap::ensure_directories()?;
    bootstrap::setup_logging(&settings.log_level, settings.log_file.as_deref())?;

    tracing::info!("subtrack v{} starting", env!("CARGO_PKG_VERSION"));
    settings.validate()?;

    let data_path = resolve_data_path(settings.data.as_deref());
    tracing::info!(
        data = %data_path.display(),
        stale_days = settings.stale_days,
        expiry_days = settings.expiry_days,
        timezone = %settings.timezone,
        "configuration loaded"
    );

    let service = app::build_service(
        &settings,
        data_path,
        &bootstrap::config_dir(),
        app::build_reporter(&settings),
    );

    let Some(every) = settings.watch else {
        return app::run_once(&service);
    };

    tracing::info!(interval_secs = every, "watching; press Ctrl+C to stop");
    let (mut rx, handle) = BatchScheduler::new(service, Duration::from_secs(every)).start();
    let mut failed = false;

    loop {
        tokio::select! {
            outcome = rx.recv() => match outcome {
                Some(Ok(report)) => failed |= report.has_sink_failures(),
                Some(Err(e)) => {
                    tracing::error!(error = %e, "batch run failed");
                    failed = true;
                }
                None => break,
            },
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("Ctrl+C received; stopping scheduler");
                handle.abort();
                break;
            }
        }
    }

    Ok(if failed {
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    })
}
