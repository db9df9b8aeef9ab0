use std::future::Future;
use std::pin::Pin;

use crate::error::AppError;
use crate::models::{JobResult, JobStatistics};

/// Boxed future returned by [`Job::run`], so jobs of different types can
/// share one ordered list.
pub type JobFuture<'a> = Pin<Box<dyn Future<Output = Result<JobResult, AppError>> + Send + 'a>>;

/// A single data-collection unit driven by the orchestrator.
pub trait Job: Send {
    /// Unique name, used as the job's key in the statistics report.
    fn name(&self) -> &str;

    /// Perform the scrape.
    fn run(&mut self) -> JobFuture<'_>;

    /// Metrics describing the last run. Read after `run()` completes,
    /// whether it succeeded or not.
    fn statistics(&self) -> JobStatistics;

    /// Receives the producer's record count before a dependent job runs.
    fn seed_offset(&mut self, offset: usize) {
        let _ = offset;
    }
}

/// Fetches raw content from a URL.
pub trait Fetcher: Send + Sync + Clone {
    fn fetch(&self, url: &str) -> impl Future<Output = Result<String, AppError>> + Send;
}

/// Key/value storage the statistics report is archived into.
pub trait ArchiveWriter: Send + Sync + Clone {
    fn write(&self, key: &str, payload: &str)
    -> impl Future<Output = Result<(), AppError>> + Send;
}

/// An archive that discards everything, for runs that only need the report.
#[derive(Debug, Clone)]
pub struct NullArchive;

impl ArchiveWriter for NullArchive {
    async fn write(&self, _key: &str, _payload: &str) -> Result<(), AppError> {
        Ok(())
    }
}
