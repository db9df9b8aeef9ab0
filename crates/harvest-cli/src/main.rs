mod config;

use anyhow::{Context, Result};
use tracing_subscriber::EnvFilter;

use harvest_client::{AlertingReporter, FileArchive, ReqwestFetcher, WebhookAlerter};
use harvest_core::{
    BatchRun, Orchestrator, ReportArchiver, TracingBatchReporter, Watchdog, WatchdogOutcome,
    format_runtime, run_and_archive,
};

use crate::config::{JobsFile, RunnerConfig};

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env if present
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("harvest=info".parse()?))
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let config = RunnerConfig::from_env().context("Invalid configuration")?;
    let jobs_file = JobsFile::load(&config.jobs_file)?;

    let alerter = match config.alert.clone() {
        Some(alert) => match WebhookAlerter::new(alert) {
            Ok(alerter) => Some(alerter),
            Err(e) => {
                tracing::error!(error = %e, "Failed to create webhook client; alerts disabled");
                None
            }
        },
        None => None,
    };
    let (reporter, dispatcher) = AlertingReporter::new(TracingBatchReporter, alerter);

    let fetcher =
        ReqwestFetcher::with_timeout(config.http_timeout).context("Failed to create HTTP client")?;
    let mut orchestrator = Orchestrator::new(
        config.batch_id.clone(),
        jobs_file.build_jobs(&fetcher),
        jobs_file.dependency.clone(),
        reporter.clone(),
    )
    .context("Invalid job list")?;
    let archiver = ReportArchiver::new(FileArchive::new(&config.archive_dir), reporter.clone());
    let watchdog = Watchdog::new(config.batch_id.clone(), config.watchdog(), reporter);

    tracing::info!(
        batch_id = %config.batch_id,
        jobs = ?orchestrator.job_names(),
        archive_dir = %config.archive_dir.display(),
        "Starting batch"
    );

    let outcome = watchdog
        .supervise(async move { run_and_archive(&mut orchestrator, &archiver).await })
        .await;

    let run = match outcome {
        WatchdogOutcome::Completed(run) => Some(run),
        WatchdogOutcome::TimedOut(handle) => {
            tracing::info!("Waiting for the batch to finish past its budget");
            watchdog.await_overrun(handle).await
        }
        WatchdogOutcome::Crashed(_) => None,
    };

    if let Some(run) = &run {
        log_summary(run);
    }
    tracing::info!(state = %watchdog.state(), "Supervision finished");

    // Closes the alert queue; the batch task already dropped its clones.
    drop(watchdog);
    let alerts = dispatcher.shutdown().await;
    if alerts.sent + alerts.failed > 0 {
        tracing::info!(sent = alerts.sent, failed = alerts.failed, "Alerts delivered");
    }

    Ok(())
}

fn log_summary(run: &BatchRun) {
    tracing::info!(
        batch_id = %run.batch_id,
        time_taken = %format_runtime(run.total_runtime),
        succeeded = run.succeeded,
        failed = run.failed,
        skipped = run.skipped,
        "Batch summary"
    );

    match &run.archive {
        Ok(summary) if summary.is_complete() => {
            tracing::info!(
                current = %summary.current_key,
                historical = %summary.historical_key,
                bytes = summary.bytes,
                "Statistics saved"
            );
        }
        Ok(summary) => {
            tracing::warn!(
                failed_keys = summary.failures.len(),
                "Statistics only partially saved"
            );
        }
        Err(e) => tracing::error!(error = %e, "Statistics not saved"),
    }
}
