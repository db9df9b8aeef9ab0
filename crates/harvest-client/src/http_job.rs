//! Scraper job for sources that publish their records as JSON.

use harvest_core::error::AppError;
use harvest_core::models::{JobResult, JobStatistics};
use harvest_core::traits::{Fetcher, Job, JobFuture};
use serde_json::Value;
use sha2::{Digest, Sha256};

/// Fetches one URL and counts the records found in it.
///
/// `records_pointer` is a JSON pointer (e.g. `"/data/items"`) to the array
/// of records; without one the document root is used. A `null` target
/// counts as no records, any non-array value as a single record.
pub struct HttpJob<F: Fetcher> {
    name: String,
    url: String,
    records_pointer: Option<String>,
    fetcher: F,
    offset: usize,
    stats: JobStatistics,
}

impl<F: Fetcher> HttpJob<F> {
    pub fn new(name: impl Into<String>, url: impl Into<String>, fetcher: F) -> Self {
        Self {
            name: name.into(),
            url: url.into(),
            records_pointer: None,
            fetcher,
            offset: 0,
            stats: JobStatistics::new(),
        }
    }

    pub fn with_records_pointer(mut self, pointer: impl Into<String>) -> Self {
        self.records_pointer = Some(pointer.into());
        self
    }

    async fn scrape(&mut self) -> Result<JobResult, AppError> {
        self.stats = JobStatistics::new().with("source_url", self.url.clone());

        let result = self.fetch_records().await;
        if let Err(e) = &result {
            self.stats.insert("error", e.to_string());
            self.stats.insert("error_kind", e.kind());
            self.stats.insert("transport_error", e.is_transport());
        }
        result
    }

    async fn fetch_records(&mut self) -> Result<JobResult, AppError> {
        tracing::info!(job = %self.name, url = %self.url, "Fetching source");
        let body = self.fetcher.fetch(&self.url).await?;
        self.stats.insert("fetched_bytes", body.len());

        let records = extract_records(&body, self.records_pointer.as_deref())?;
        let count = records.len();

        self.stats.insert("records", count);
        self.stats.insert("first_record_id", self.offset + 1);
        self.stats
            .insert("data_hash", compute_hash(&Value::Array(records).to_string()));

        tracing::info!(job = %self.name, records = %count, "Parsed records");
        Ok(JobResult::new(count))
    }
}

impl<F: Fetcher + 'static> Job for HttpJob<F> {
    fn name(&self) -> &str {
        &self.name
    }

    fn run(&mut self) -> JobFuture<'_> {
        Box::pin(self.scrape())
    }

    fn statistics(&self) -> JobStatistics {
        self.stats.clone()
    }

    fn seed_offset(&mut self, offset: usize) {
        self.offset = offset;
    }
}

/// Pull the list of records out of a JSON document.
pub fn extract_records(body: &str, pointer: Option<&str>) -> Result<Vec<Value>, AppError> {
    let document: Value = serde_json::from_str(body)
        .map_err(|e| AppError::ParseError(format!("Response is not valid JSON: {e}")))?;

    let target = match pointer {
        Some(pointer) => document.pointer(pointer).cloned().ok_or_else(|| {
            AppError::ParseError(format!("No value at JSON pointer '{pointer}'"))
        })?,
        None => document,
    };

    Ok(match target {
        Value::Array(items) => items,
        Value::Null => Vec::new(),
        other => vec![other],
    })
}

/// Compute a SHA-256 hash of a string, returned as 64-char hex.
pub fn compute_hash(content: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(content.as_bytes());
    format!("{:x}", hasher.finalize())
}
