use std::time::Duration;

use crate::archive::{PersistSummary, ReportArchiver};
use crate::error::AppError;
use crate::events::BatchReporter;
use crate::orchestrator::Orchestrator;
use crate::traits::ArchiveWriter;
use crate::watchdog::MeasuredRun;

/// What a full batch hands back to its supervisor once the report has been
/// given to the archive.
#[derive(Debug)]
pub struct BatchRun {
    pub batch_id: String,
    pub total_runtime: Duration,
    pub succeeded: usize,
    pub failed: usize,
    pub skipped: usize,
    /// `Err` only when the report could not be serialized.
    pub archive: Result<PersistSummary, AppError>,
}

impl MeasuredRun for BatchRun {
    fn total_runtime(&self) -> Option<Duration> {
        Some(self.total_runtime)
    }
}

/// Run every job, then archive the resulting report.
///
/// The orchestrator keeps no reference to the report; it is moved into the
/// archiver and dropped there.
pub async fn run_and_archive<R, W, AR>(
    orchestrator: &mut Orchestrator<R>,
    archiver: &ReportArchiver<W, AR>,
) -> BatchRun
where
    R: BatchReporter,
    W: ArchiveWriter,
    AR: BatchReporter,
{
    let report = orchestrator.run_batch().await;

    let batch_id = report.batch_id().to_string();
    let total_runtime = report.total_runtime();
    let succeeded = report.count("succeeded");
    let failed = report.count("failed");
    let skipped = report.count("skipped");

    let archive = archiver.persist(report).await;

    BatchRun {
        batch_id,
        total_runtime,
        succeeded,
        failed,
        skipped,
        archive,
    }
}
