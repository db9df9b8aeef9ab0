//! Wall-clock supervision of a whole batch.
//!
//! # States
//!
//! ```text
//! IDLE --supervise--> RUNNING --finished in budget--> COMPLETED
//!                        |
//!                        +--budget elapsed--> TIMED_OUT (batch keeps running)
//!                        |
//!                        +--batch panicked--> CRASHED
//! ```
//!
//! The budget is advisory: when it elapses the supervisor gets control back
//! and warns, but the batch task is never aborted.

use std::future::Future;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::task::{JoinError, JoinHandle};

use crate::events::{BatchEvent, BatchReporter};
use crate::models::StatisticsReport;

const DEFAULT_BUDGET: Duration = Duration::from_secs(30 * 60);

/// Current state of the watchdog.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WatchdogState {
    Idle,
    Running,
    Completed,
    /// Budget elapsed while the batch was running. Observability only.
    TimedOut,
    Crashed,
}

impl std::fmt::Display for WatchdogState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            WatchdogState::Idle => write!(f, "idle"),
            WatchdogState::Running => write!(f, "running"),
            WatchdogState::Completed => write!(f, "completed"),
            WatchdogState::TimedOut => write!(f, "timed-out"),
            WatchdogState::Crashed => write!(f, "crashed"),
        }
    }
}

/// Configuration for watchdog behavior.
#[derive(Debug, Clone)]
pub struct WatchdogConfig {
    /// Hard ceiling on how long the supervisor waits for the batch.
    pub budget: Duration,

    /// A finished batch whose measured runtime reaches this value triggers
    /// a retrospective warning.
    pub runtime_warning_threshold: Duration,
}

impl Default for WatchdogConfig {
    fn default() -> Self {
        Self {
            budget: DEFAULT_BUDGET,
            runtime_warning_threshold: DEFAULT_BUDGET,
        }
    }
}

impl WatchdogConfig {
    pub fn with_budget(mut self, budget: Duration) -> Self {
        self.budget = budget;
        self
    }

    pub fn with_runtime_warning_threshold(mut self, threshold: Duration) -> Self {
        self.runtime_warning_threshold = threshold;
        self
    }
}

/// Output of a batch that knows how long its jobs took.
pub trait MeasuredRun {
    fn total_runtime(&self) -> Option<Duration>;
}

impl MeasuredRun for StatisticsReport {
    fn total_runtime(&self) -> Option<Duration> {
        Some(StatisticsReport::total_runtime(self))
    }
}

impl<T: MeasuredRun, E> MeasuredRun for Result<T, E> {
    fn total_runtime(&self) -> Option<Duration> {
        self.as_ref().ok().and_then(|run| run.total_runtime())
    }
}

/// How a supervised batch ended, from the supervisor's point of view.
#[derive(Debug)]
pub enum WatchdogOutcome<T> {
    Completed(T),
    /// Budget elapsed. The handle still owns the running batch.
    TimedOut(JoinHandle<T>),
    Crashed(String),
}

impl<T> WatchdogOutcome<T> {
    pub fn state(&self) -> WatchdogState {
        match self {
            WatchdogOutcome::Completed(_) => WatchdogState::Completed,
            WatchdogOutcome::TimedOut(_) => WatchdogState::TimedOut,
            WatchdogOutcome::Crashed(_) => WatchdogState::Crashed,
        }
    }
}

/// Runs a batch on its own task under a wall-clock budget.
pub struct Watchdog<R: BatchReporter> {
    batch_id: String,
    config: WatchdogConfig,
    reporter: R,
    state: Arc<Mutex<WatchdogState>>,
}

impl<R: BatchReporter> Watchdog<R> {
    pub fn new(batch_id: impl Into<String>, config: WatchdogConfig, reporter: R) -> Self {
        Self {
            batch_id: batch_id.into(),
            config,
            reporter,
            state: Arc::new(Mutex::new(WatchdogState::Idle)),
        }
    }

    pub fn config(&self) -> &WatchdogConfig {
        &self.config
    }

    /// Acquires the state lock, recovering from poison if necessary.
    fn lock_state(&self) -> std::sync::MutexGuard<'_, WatchdogState> {
        self.state.lock().unwrap_or_else(|poisoned| {
            tracing::warn!(batch_id = %self.batch_id, "Recovered from poisoned mutex");
            poisoned.into_inner()
        })
    }

    pub fn state(&self) -> WatchdogState {
        *self.lock_state()
    }

    fn set_state(&self, state: WatchdogState) {
        *self.lock_state() = state;
    }

    /// Spawn `batch` and wait for it for at most the configured budget.
    ///
    /// - finished in time: returns its output, warning once if the measured
    ///   runtime reached the warning threshold
    /// - budget elapsed: warns once and returns the still-running handle
    /// - panicked: returns the panic message
    pub async fn supervise<F, T>(&self, batch: F) -> WatchdogOutcome<T>
    where
        F: Future<Output = T> + Send + 'static,
        T: MeasuredRun + Send + 'static,
    {
        self.set_state(WatchdogState::Running);
        self.reporter.report(BatchEvent::SupervisionStarted {
            batch_id: &self.batch_id,
            budget: self.config.budget,
        });

        let mut handle = tokio::spawn(batch);

        match tokio::time::timeout(self.config.budget, &mut handle).await {
            Ok(Ok(output)) => {
                self.set_state(WatchdogState::Completed);
                self.check_runtime(&output);
                WatchdogOutcome::Completed(output)
            }
            Ok(Err(e)) => WatchdogOutcome::Crashed(self.crashed(e)),
            Err(_) => {
                self.set_state(WatchdogState::TimedOut);
                self.reporter.report(BatchEvent::StillRunning {
                    batch_id: &self.batch_id,
                    budget: self.config.budget,
                });
                WatchdogOutcome::TimedOut(handle)
            }
        }
    }

    /// Wait for a batch that outlived its budget to finish on its own.
    ///
    /// The state stays `TimedOut`; the retrospective runtime warning still
    /// applies to the late output.
    pub async fn await_overrun<T: MeasuredRun>(&self, handle: JoinHandle<T>) -> Option<T> {
        match handle.await {
            Ok(output) => {
                self.check_runtime(&output);
                Some(output)
            }
            Err(e) => {
                self.crashed(e);
                None
            }
        }
    }

    fn check_runtime<T: MeasuredRun>(&self, output: &T) {
        if let Some(total_runtime) = output.total_runtime() {
            if total_runtime >= self.config.runtime_warning_threshold {
                self.reporter.report(BatchEvent::RanLong {
                    batch_id: &self.batch_id,
                    total_runtime,
                });
            }
        }
    }

    fn crashed(&self, error: JoinError) -> String {
        self.set_state(WatchdogState::Crashed);
        let message = if error.is_panic() {
            let panic = error.into_panic();
            if let Some(s) = panic.downcast_ref::<&str>() {
                s.to_string()
            } else if let Some(s) = panic.downcast_ref::<String>() {
                s.clone()
            } else {
                "unknown panic".to_string()
            }
        } else {
            error.to_string()
        };
        self.reporter.report(BatchEvent::BatchCrashed {
            batch_id: &self.batch_id,
            error: &message,
        });
        message
    }
}
