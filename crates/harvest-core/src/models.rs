use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::ser::SerializeMap;
use serde::{Deserialize, Serialize, Serializer};

use crate::error::AppError;
use crate::runtime::format_runtime;

/// Format of `completed_at` in the serialized report.
pub const COMPLETED_AT_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Value returned by a job whose `run()` succeeded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct JobResult {
    pub record_count: usize,
}

impl JobResult {
    pub fn new(record_count: usize) -> Self {
        Self { record_count }
    }

    /// A result is truthy when the job produced at least one record.
    pub fn is_truthy(&self) -> bool {
        self.record_count > 0
    }
}

/// Free-form metrics a job exposes after running.
///
/// Keys keep their insertion order in the serialized output.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobStatistics(serde_json::Map<String, serde_json::Value>);

impl JobStatistics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<serde_json::Value>) {
        self.0.insert(key.into(), value.into());
    }

    pub fn with(mut self, key: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        self.insert(key, value);
        self
    }

    pub fn get(&self, key: &str) -> Option<&serde_json::Value> {
        self.0.get(key)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }
}

impl From<serde_json::Map<String, serde_json::Value>> for JobStatistics {
    fn from(map: serde_json::Map<String, serde_json::Value>) -> Self {
        Self(map)
    }
}

/// What happened to one job during a batch.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum JobOutcome {
    Succeeded {
        records: usize,
        elapsed_secs: f64,
        statistics: JobStatistics,
    },
    Failed {
        error: String,
        elapsed_secs: f64,
        statistics: JobStatistics,
    },
    /// Not invoked because its producer returned nothing.
    Skipped { reason: String },
}

impl JobOutcome {
    pub fn status(&self) -> &'static str {
        match self {
            JobOutcome::Succeeded { .. } => "succeeded",
            JobOutcome::Failed { .. } => "failed",
            JobOutcome::Skipped { .. } => "skipped",
        }
    }

    pub fn is_succeeded(&self) -> bool {
        matches!(self, JobOutcome::Succeeded { .. })
    }

    pub fn is_failed(&self) -> bool {
        matches!(self, JobOutcome::Failed { .. })
    }

    pub fn is_skipped(&self) -> bool {
        matches!(self, JobOutcome::Skipped { .. })
    }
}

/// Static (producer, dependent) pair: the dependent job only runs when the
/// producer returned a truthy result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dependency {
    pub producer: String,
    pub dependent: String,
}

impl Dependency {
    pub fn new(producer: impl Into<String>, dependent: impl Into<String>) -> Self {
        Self {
            producer: producer.into(),
            dependent: dependent.into(),
        }
    }
}

/// Aggregated outcome of one batch. Immutable once built.
#[derive(Debug, Clone)]
pub struct StatisticsReport {
    batch_id: String,
    jobs: Vec<(String, JobOutcome)>,
    total_runtime: Duration,
    completed_at: DateTime<Utc>,
}

impl StatisticsReport {
    pub fn new(
        batch_id: impl Into<String>,
        jobs: Vec<(String, JobOutcome)>,
        total_runtime: Duration,
        completed_at: DateTime<Utc>,
    ) -> Self {
        Self {
            batch_id: batch_id.into(),
            jobs,
            total_runtime,
            completed_at,
        }
    }

    pub fn batch_id(&self) -> &str {
        &self.batch_id
    }

    /// Entries in the order the jobs were declared.
    pub fn jobs(&self) -> &[(String, JobOutcome)] {
        &self.jobs
    }

    pub fn get(&self, name: &str) -> Option<&JobOutcome> {
        self.jobs
            .iter()
            .find(|(job, _)| job == name)
            .map(|(_, outcome)| outcome)
    }

    pub fn total_runtime(&self) -> Duration {
        self.total_runtime
    }

    /// Human-readable runtime, as written to the archive.
    pub fn time_taken(&self) -> String {
        format_runtime(self.total_runtime)
    }

    pub fn completed_at(&self) -> DateTime<Utc> {
        self.completed_at
    }

    pub fn count(&self, status: &str) -> usize {
        self.jobs
            .iter()
            .filter(|(_, outcome)| outcome.status() == status)
            .count()
    }

    /// Encode the report as archived.
    ///
    /// With string keys and `serde_json::Value` statistics this does not
    /// fail in practice (non-finite floats encode as `null`); the `Result`
    /// is kept so archive backends handle a lost report explicitly.
    pub fn to_json(&self) -> Result<String, AppError> {
        Ok(serde_json::to_string(self)?)
    }
}

impl Serialize for StatisticsReport {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(5))?;
        map.serialize_entry("batch_id", &self.batch_id)?;
        map.serialize_entry("total_runtime", &self.time_taken())?;
        map.serialize_entry("total_runtime_secs", &self.total_runtime.as_secs_f64())?;
        map.serialize_entry(
            "completed_at",
            &self.completed_at.format(COMPLETED_AT_FORMAT).to_string(),
        )?;
        map.serialize_entry("jobs", &OrderedJobs(&self.jobs))?;
        map.end()
    }
}

/// Serializes the job entries as a JSON object without losing their order.
struct OrderedJobs<'a>(&'a [(String, JobOutcome)]);

impl Serialize for OrderedJobs<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for (name, outcome) in self.0 {
            map.serialize_entry(name, outcome)?;
        }
        map.end()
    }
}
