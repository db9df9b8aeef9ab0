//! Sequential batch execution with a single producer/dependent gate.
//!
//! Jobs run strictly in declaration order. The dependent job of the
//! configured [`Dependency`] only runs when its producer returned at least
//! one record, and is seeded with the producer's record count. Every other
//! job runs regardless of what happened before it.

use std::collections::HashSet;
use std::panic::AssertUnwindSafe;
use std::time::Duration;

use chrono::Utc;
use futures::FutureExt;
use tokio::time::Instant;

use crate::error::AppError;
use crate::events::{BatchEvent, BatchReporter};
use crate::models::{Dependency, JobOutcome, JobResult, JobStatistics, StatisticsReport};
use crate::traits::Job;

/// How the producer of the dependency pair fared, as seen by its dependent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ProducerState {
    Pending,
    Produced(usize),
    Empty,
    Failed,
}

/// Drives an ordered list of jobs and aggregates their statistics.
pub struct Orchestrator<R: BatchReporter> {
    batch_id: String,
    jobs: Vec<Box<dyn Job>>,
    dependency: Option<Dependency>,
    reporter: R,
}

impl<R: BatchReporter> Orchestrator<R> {
    /// Build an orchestrator, rejecting job lists the batch could not run
    /// deterministically.
    pub fn new(
        batch_id: impl Into<String>,
        jobs: Vec<Box<dyn Job>>,
        dependency: Option<Dependency>,
        reporter: R,
    ) -> Result<Self, AppError> {
        if jobs.is_empty() {
            return Err(AppError::ConfigError("no jobs configured".into()));
        }

        let mut seen = HashSet::new();
        for job in &jobs {
            if !seen.insert(job.name()) {
                return Err(AppError::ConfigError(format!(
                    "duplicate job name '{}'",
                    job.name()
                )));
            }
        }

        if let Some(dep) = &dependency {
            validate_dependency(dep, &jobs)?;
        }

        Ok(Self {
            batch_id: batch_id.into(),
            jobs,
            dependency,
            reporter,
        })
    }

    pub fn batch_id(&self) -> &str {
        &self.batch_id
    }

    pub fn job_names(&self) -> Vec<&str> {
        self.jobs.iter().map(|job| job.name()).collect()
    }

    /// Run every job once, in order, and build the batch report.
    ///
    /// Never fails: job errors and panics become `failed` entries.
    pub async fn run_batch(&mut self) -> StatisticsReport {
        self.reporter.report(BatchEvent::BatchStarted {
            batch_id: &self.batch_id,
            job_count: self.jobs.len(),
        });

        let start = Instant::now();
        let mut entries = Vec::with_capacity(self.jobs.len());
        let mut producer = ProducerState::Pending;

        for job in self.jobs.iter_mut() {
            let name = job.name().to_string();
            let dependency = self.dependency.as_ref();

            if let Some(dep) = dependency.filter(|dep| dep.dependent == name) {
                match producer {
                    ProducerState::Produced(count) => job.seed_offset(count),
                    state => {
                        self.reporter.report(BatchEvent::JobSkipped {
                            job: &name,
                            producer: &dep.producer,
                        });
                        entries.push((name, skipped(&dep.producer, state)));
                        continue;
                    }
                }
            }

            let (outcome, result) = run_job(job.as_mut(), &name, &self.reporter).await;

            if dependency.is_some_and(|dep| dep.producer == name) {
                producer = match result {
                    Some(r) if r.is_truthy() => ProducerState::Produced(r.record_count),
                    Some(_) => ProducerState::Empty,
                    None => ProducerState::Failed,
                };
            }

            entries.push((name, outcome));
        }

        let total_runtime = start.elapsed();
        let report =
            StatisticsReport::new(self.batch_id.clone(), entries, total_runtime, Utc::now());

        self.reporter.report(BatchEvent::BatchFinished {
            batch_id: &self.batch_id,
            total_runtime,
            succeeded: report.count("succeeded"),
            failed: report.count("failed"),
            skipped: report.count("skipped"),
        });

        report
    }
}

fn validate_dependency(dep: &Dependency, jobs: &[Box<dyn Job>]) -> Result<(), AppError> {
    let position = |name: &str| jobs.iter().position(|job| job.name() == name);

    let producer = position(&dep.producer).ok_or_else(|| {
        AppError::ConfigError(format!(
            "dependency producer '{}' is not a configured job",
            dep.producer
        ))
    })?;
    let dependent = position(&dep.dependent).ok_or_else(|| {
        AppError::ConfigError(format!(
            "dependency dependent '{}' is not a configured job",
            dep.dependent
        ))
    })?;

    if producer == dependent {
        return Err(AppError::ConfigError(format!(
            "job '{}' cannot depend on itself",
            dep.producer
        )));
    }
    if producer > dependent {
        return Err(AppError::ConfigError(format!(
            "producer '{}' must be declared before its dependent '{}'",
            dep.producer, dep.dependent
        )));
    }
    Ok(())
}

fn skipped(producer: &str, state: ProducerState) -> JobOutcome {
    let reason = match state {
        ProducerState::Failed => format!("producer '{producer}' failed"),
        _ => format!("producer '{producer}' returned no records"),
    };
    JobOutcome::Skipped { reason }
}

/// Run one job, isolating errors and panics.
///
/// Returns the report entry and, on success, the job's result.
async fn run_job<R: BatchReporter>(
    job: &mut dyn Job,
    name: &str,
    reporter: &R,
) -> (JobOutcome, Option<JobResult>) {
    reporter.report(BatchEvent::JobStarted { job: name });
    let started = Instant::now();

    let result = match AssertUnwindSafe(job.run()).catch_unwind().await {
        Ok(result) => result,
        Err(panic) => Err(AppError::JobPanicked(panic_message(panic.as_ref()))),
    };
    let elapsed = started.elapsed();
    let statistics = collect_statistics(job, name);

    match result {
        Ok(result) => {
            reporter.report(BatchEvent::JobSucceeded {
                job: name,
                records: result.record_count,
                elapsed,
            });
            let outcome = JobOutcome::Succeeded {
                records: result.record_count,
                elapsed_secs: secs(elapsed),
                statistics,
            };
            (outcome, Some(result))
        }
        Err(e) => {
            let error = e.to_string();
            reporter.report(BatchEvent::JobFailed {
                job: name,
                error: &error,
                elapsed,
            });
            let outcome = JobOutcome::Failed {
                error,
                elapsed_secs: secs(elapsed),
                statistics,
            };
            (outcome, None)
        }
    }
}

/// A job that panicked may be left in a state where reading its
/// statistics panics too; fall back to an empty map.
fn collect_statistics(job: &dyn Job, name: &str) -> JobStatistics {
    std::panic::catch_unwind(AssertUnwindSafe(|| job.statistics())).unwrap_or_else(|_| {
        tracing::warn!(%name, "Reading job statistics panicked");
        JobStatistics::new()
    })
}

fn panic_message(panic: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

fn secs(duration: Duration) -> f64 {
    // Rounded to milliseconds.
    (duration.as_secs_f64() * 1000.0).round() / 1000.0
}
