use chrono::{DateTime, Utc};

use crate::error::AppError;
use crate::events::{BatchEvent, BatchReporter};
use crate::models::StatisticsReport;
use crate::traits::ArchiveWriter;

/// Timestamp format embedded in historical archive keys (millisecond
/// precision, so keys sort chronologically).
pub const HISTORICAL_TIMESTAMP_FORMAT: &str = "%Y%m%d%H%M%S%3f";

/// Where reports are written: one key overwritten every run, one
/// timestamped key per run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchiveKeys {
    pub current: String,
    pub historical_prefix: String,
    pub historical_suffix: String,
}

impl Default for ArchiveKeys {
    fn default() -> Self {
        Self {
            current: "stats.json".to_string(),
            historical_prefix: "stats/stats-".to_string(),
            historical_suffix: ".json".to_string(),
        }
    }
}

impl ArchiveKeys {
    /// `<prefix><timestamp>-<run_token><suffix>`. The token keeps two runs
    /// that complete in the same millisecond from sharing a history entry.
    pub fn historical(&self, completed_at: DateTime<Utc>, run_token: &str) -> String {
        format!(
            "{}{}-{}{}",
            self.historical_prefix,
            completed_at.format(HISTORICAL_TIMESTAMP_FORMAT),
            run_token,
            self.historical_suffix
        )
    }
}

/// Short random token distinguishing one archived run from another.
pub fn run_token() -> String {
    let id = uuid::Uuid::new_v4().simple().to_string();
    id[..8].to_string()
}

/// A single key that could not be written.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchiveFailure {
    pub key: String,
    pub error: String,
}

/// Result of archiving one report.
#[derive(Debug, Clone)]
pub struct PersistSummary {
    pub current_key: String,
    pub historical_key: String,
    pub bytes: usize,
    pub failures: Vec<ArchiveFailure>,
}

impl PersistSummary {
    /// Both keys were written.
    pub fn is_complete(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Serializes statistics reports and writes them to an [`ArchiveWriter`].
#[derive(Clone)]
pub struct ReportArchiver<W: ArchiveWriter, R: BatchReporter> {
    writer: W,
    keys: ArchiveKeys,
    reporter: R,
}

impl<W: ArchiveWriter, R: BatchReporter> ReportArchiver<W, R> {
    pub fn new(writer: W, reporter: R) -> Self {
        Self::with_keys(writer, ArchiveKeys::default(), reporter)
    }

    pub fn with_keys(writer: W, keys: ArchiveKeys, reporter: R) -> Self {
        Self {
            writer,
            keys,
            reporter,
        }
    }

    pub fn keys(&self) -> &ArchiveKeys {
        &self.keys
    }

    /// Write the report under the current and the historical key.
    ///
    /// Both writes are attempted even if the first fails; write failures
    /// are reported and collected, not returned as errors. Only a
    /// serialization failure is an `Err`, in which case nothing is written.
    pub async fn persist(&self, report: StatisticsReport) -> Result<PersistSummary, AppError> {
        self.persist_with(report, StatisticsReport::to_json).await
    }

    async fn persist_with(
        &self,
        report: StatisticsReport,
        serialize: impl FnOnce(&StatisticsReport) -> Result<String, AppError>,
    ) -> Result<PersistSummary, AppError> {
        let payload = match serialize(&report) {
            Ok(payload) => payload,
            Err(e) => {
                self.reporter.report(BatchEvent::ReportLost {
                    batch_id: report.batch_id(),
                    error: &e.to_string(),
                });
                return Err(e);
            }
        };

        let current_key = self.keys.current.clone();
        let historical_key = self.keys.historical(report.completed_at(), &run_token());
        drop(report);

        let mut failures = Vec::new();
        for key in [&current_key, &historical_key] {
            match self.writer.write(key, &payload).await {
                Ok(()) => self.reporter.report(BatchEvent::ArchiveWritten {
                    key,
                    bytes: payload.len(),
                }),
                Err(e) => {
                    let error = e.to_string();
                    self.reporter
                        .report(BatchEvent::ArchiveFailed { key, error: &error });
                    failures.push(ArchiveFailure {
                        key: key.clone(),
                        error,
                    });
                }
            }
        }

        Ok(PersistSummary {
            current_key,
            historical_key,
            bytes: payload.len(),
            failures,
        })
    }
}
