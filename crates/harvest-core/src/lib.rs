pub mod archive;
pub mod batch;
pub mod error;
pub mod events;
pub mod models;
pub mod orchestrator;
pub mod runtime;
pub mod traits;
pub mod watchdog;

#[cfg(any(test, feature = "testutil"))]
pub mod testutil;

pub use archive::{ArchiveKeys, PersistSummary, ReportArchiver};
pub use batch::{BatchRun, run_and_archive};
pub use error::AppError;
pub use events::{BatchEvent, BatchReporter, TracingBatchReporter};
pub use models::{Dependency, JobOutcome, JobResult, JobStatistics, StatisticsReport};
pub use orchestrator::Orchestrator;
pub use runtime::format_runtime;
pub use traits::{ArchiveWriter, Fetcher, Job, JobFuture, NullArchive};
pub use watchdog::{MeasuredRun, Watchdog, WatchdogConfig, WatchdogOutcome, WatchdogState};
