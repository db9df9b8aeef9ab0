use std::time::Duration;

use crate::runtime::format_runtime;

/// Events emitted by the orchestrator, archiver and watchdog for
/// monitoring/logging.
#[derive(Debug, Clone)]
pub enum BatchEvent<'a> {
    BatchStarted {
        batch_id: &'a str,
        job_count: usize,
    },
    JobStarted {
        job: &'a str,
    },
    JobSucceeded {
        job: &'a str,
        records: usize,
        elapsed: Duration,
    },
    JobFailed {
        job: &'a str,
        error: &'a str,
        elapsed: Duration,
    },
    JobSkipped {
        job: &'a str,
        producer: &'a str,
    },
    BatchFinished {
        batch_id: &'a str,
        total_runtime: Duration,
        succeeded: usize,
        failed: usize,
        skipped: usize,
    },
    ArchiveWritten {
        key: &'a str,
        bytes: usize,
    },
    ArchiveFailed {
        key: &'a str,
        error: &'a str,
    },
    /// The report could not be serialized; nothing was archived.
    ReportLost {
        batch_id: &'a str,
        error: &'a str,
    },
    SupervisionStarted {
        batch_id: &'a str,
        budget: Duration,
    },
    /// Budget elapsed while the batch was still running.
    StillRunning {
        batch_id: &'a str,
        budget: Duration,
    },
    /// Batch finished, but its measured runtime crossed the warning threshold.
    RanLong {
        batch_id: &'a str,
        total_runtime: Duration,
    },
    BatchCrashed {
        batch_id: &'a str,
        error: &'a str,
    },
}

impl BatchEvent<'_> {
    pub fn label(&self) -> &'static str {
        match self {
            BatchEvent::BatchStarted { .. } => "BatchStarted",
            BatchEvent::JobStarted { .. } => "JobStarted",
            BatchEvent::JobSucceeded { .. } => "JobSucceeded",
            BatchEvent::JobFailed { .. } => "JobFailed",
            BatchEvent::JobSkipped { .. } => "JobSkipped",
            BatchEvent::BatchFinished { .. } => "BatchFinished",
            BatchEvent::ArchiveWritten { .. } => "ArchiveWritten",
            BatchEvent::ArchiveFailed { .. } => "ArchiveFailed",
            BatchEvent::ReportLost { .. } => "ReportLost",
            BatchEvent::SupervisionStarted { .. } => "SupervisionStarted",
            BatchEvent::StillRunning { .. } => "StillRunning",
            BatchEvent::RanLong { .. } => "RanLong",
            BatchEvent::BatchCrashed { .. } => "BatchCrashed",
        }
    }

    /// Operator-facing message for events at warning level or above.
    /// `None` for routine progress events.
    pub fn alert_message(&self) -> Option<String> {
        match self {
            BatchEvent::JobFailed { job, error, .. } => {
                Some(format!("Scraper: {job} failed: {error}"))
            }
            BatchEvent::ArchiveFailed { key, error } => {
                Some(format!("Archiving '{key}' failed: {error}"))
            }
            BatchEvent::ReportLost { batch_id, error } => Some(format!(
                "Scraper: {batch_id} statistics report could not be serialized: {error}"
            )),
            BatchEvent::StillRunning { batch_id, budget } => Some(format!(
                "Scraper: {batch_id} is running for more than {}",
                describe_budget(*budget)
            )),
            BatchEvent::RanLong {
                batch_id,
                total_runtime,
            } => Some(format!(
                "Scraper: {batch_id} ran for about {}",
                format_runtime(*total_runtime)
            )),
            BatchEvent::BatchCrashed { batch_id, error } => {
                Some(format!("Scraper: {batch_id} crashed: {error}"))
            }
            _ => None,
        }
    }
}

/// Whole-minute budgets read as "30 minutes"; anything else falls back to
/// [`format_runtime`].
fn describe_budget(budget: Duration) -> String {
    let secs = budget.as_secs();
    if secs >= 60 && secs % 60 == 0 && budget.subsec_nanos() == 0 {
        let minutes = secs / 60;
        if minutes == 1 {
            "1 minute".to_string()
        } else {
            format!("{minutes} minutes")
        }
    } else {
        format_runtime(budget)
    }
}

/// Trait for receiving batch events (decoupled logging).
pub trait BatchReporter: Send + Sync {
    fn report(&self, event: BatchEvent<'_>) {
        let _ = event;
    }
}

/// Reporter that uses the `tracing` crate.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingBatchReporter;

impl BatchReporter for TracingBatchReporter {
    fn report(&self, event: BatchEvent<'_>) {
        let alert = event.alert_message();
        match event {
            BatchEvent::BatchStarted {
                batch_id,
                job_count,
            } => {
                tracing::info!(%batch_id, %job_count, "Batch started");
            }
            BatchEvent::JobStarted { job } => {
                tracing::info!(%job, "Running scraper");
            }
            BatchEvent::JobSucceeded {
                job,
                records,
                elapsed,
            } => {
                tracing::info!(
                    %job,
                    %records,
                    elapsed_secs = elapsed.as_secs_f64(),
                    "Scraper completed"
                );
            }
            BatchEvent::JobFailed {
                job,
                error,
                elapsed,
            } => {
                tracing::warn!(
                    %job,
                    %error,
                    elapsed_secs = elapsed.as_secs_f64(),
                    "Scraper failed"
                );
            }
            BatchEvent::JobSkipped { job, producer } => {
                tracing::info!(%job, %producer, "Scraper skipped: producer returned no records");
            }
            BatchEvent::BatchFinished {
                batch_id,
                total_runtime,
                succeeded,
                failed,
                skipped,
            } => {
                tracing::info!(
                    %batch_id,
                    time_taken = %format_runtime(total_runtime),
                    %succeeded,
                    %failed,
                    %skipped,
                    "Batch finished"
                );
            }
            BatchEvent::ArchiveWritten { key, bytes } => {
                tracing::info!(%key, %bytes, "Statistics archived");
            }
            BatchEvent::ArchiveFailed { key, error } => {
                tracing::error!(%key, %error, "Failed to archive statistics");
            }
            BatchEvent::ReportLost { batch_id, error } => {
                tracing::error!(%batch_id, %error, "Statistics report lost");
            }
            BatchEvent::SupervisionStarted { batch_id, budget } => {
                tracing::info!(%batch_id, budget_secs = budget.as_secs(), "Watchdog armed");
            }
            BatchEvent::StillRunning { .. } | BatchEvent::RanLong { .. } => {
                if let Some(message) = alert {
                    tracing::warn!("{message}");
                }
            }
            BatchEvent::BatchCrashed { batch_id, error } => {
                tracing::error!(%batch_id, %error, "Batch crashed");
            }
        }
    }
}
