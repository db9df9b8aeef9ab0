//! Test utilities: mock implementations of all core traits.
//!
//! Handwritten mocks for dependency injection in unit tests.
//! All mocks use `Arc<Mutex<_>>` for interior mutability, so a test can keep
//! one clone for assertions while the code under test owns another.

use std::collections::HashSet;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::error::AppError;
use crate::events::{BatchEvent, BatchReporter};
use crate::models::{JobResult, JobStatistics};
use crate::traits::{ArchiveWriter, Fetcher, Job, JobFuture};

// ---------------------------------------------------------------------------
// CallLog
// ---------------------------------------------------------------------------

/// Shared record of which jobs ran, in order.
#[derive(Clone, Default)]
pub struct CallLog {
    calls: Arc<Mutex<Vec<String>>>,
}

impl CallLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

// ---------------------------------------------------------------------------
// MockJob
// ---------------------------------------------------------------------------

#[derive(Clone)]
enum Behavior {
    Records(usize),
    Fail(String),
    Panic(String),
}

/// Mock job with a fixed behavior, recording how it was driven.
#[derive(Clone)]
pub struct MockJob {
    name: String,
    behavior: Behavior,
    delay: Option<Duration>,
    runs: Arc<Mutex<usize>>,
    offsets: Arc<Mutex<Vec<usize>>>,
    log: Option<CallLog>,
}

impl MockJob {
    fn with_behavior(name: &str, behavior: Behavior) -> Self {
        Self {
            name: name.to_string(),
            behavior,
            delay: None,
            runs: Arc::new(Mutex::new(0)),
            offsets: Arc::new(Mutex::new(Vec::new())),
            log: None,
        }
    }

    /// Job that succeeds with `records` records.
    pub fn succeeding(name: &str, records: usize) -> Self {
        Self::with_behavior(name, Behavior::Records(records))
    }

    /// Job whose `run()` returns an HTTP error.
    pub fn failing(name: &str, error: &str) -> Self {
        Self::with_behavior(name, Behavior::Fail(error.to_string()))
    }

    /// Job whose `run()` panics.
    pub fn panicking(name: &str, message: &str) -> Self {
        Self::with_behavior(name, Behavior::Panic(message.to_string()))
    }

    /// Sleep (on the tokio clock) before finishing.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn with_call_log(mut self, log: &CallLog) -> Self {
        self.log = Some(log.clone());
        self
    }

    pub fn run_count(&self) -> usize {
        *self.runs.lock().unwrap()
    }

    pub fn offsets(&self) -> Vec<usize> {
        self.offsets.lock().unwrap().clone()
    }
}

impl Job for MockJob {
    fn name(&self) -> &str {
        &self.name
    }

    fn run(&mut self) -> JobFuture<'_> {
        Box::pin(async move {
            *self.runs.lock().unwrap() += 1;
            if let Some(log) = &self.log {
                log.calls.lock().unwrap().push(self.name.clone());
            }
            if let Some(delay) = self.delay {
                tokio::time::sleep(delay).await;
            }
            match &self.behavior {
                Behavior::Records(count) => Ok(JobResult::new(*count)),
                Behavior::Fail(error) => Err(AppError::HttpError(error.clone())),
                Behavior::Panic(message) => panic!("{message}"),
            }
        })
    }

    fn statistics(&self) -> JobStatistics {
        let mut stats = JobStatistics::new().with("runs", self.run_count());
        if let Some(offset) = self.offsets().last() {
            stats.insert("offset", *offset);
        }
        stats
    }

    fn seed_offset(&mut self, offset: usize) {
        self.offsets.lock().unwrap().push(offset);
    }
}

// ---------------------------------------------------------------------------
// MockArchive
// ---------------------------------------------------------------------------

/// Recorded write: (key, payload).
pub type ArchiveWrite = (String, String);

/// Mock archive that records writes and fails on configured keys.
#[derive(Clone, Default)]
pub struct MockArchive {
    writes: Arc<Mutex<Vec<ArchiveWrite>>>,
    attempts: Arc<Mutex<usize>>,
    failing_keys: Arc<Mutex<HashSet<String>>>,
    fail_all: bool,
}

impl MockArchive {
    pub fn new() -> Self {
        Self::default()
    }

    /// Archive that rejects writes to `key`.
    pub fn failing_on(key: &str) -> Self {
        let archive = Self::default();
        archive.failing_keys.lock().unwrap().insert(key.to_string());
        archive
    }

    /// Archive that rejects every write.
    pub fn failing_on_all() -> Self {
        Self {
            fail_all: true,
            ..Self::default()
        }
    }

    /// Successful writes, in order.
    pub fn writes(&self) -> Vec<ArchiveWrite> {
        self.writes.lock().unwrap().clone()
    }

    /// Every call to `write`, successful or not.
    pub fn attempts(&self) -> usize {
        *self.attempts.lock().unwrap()
    }
}

impl ArchiveWriter for MockArchive {
    async fn write(&self, key: &str, payload: &str) -> Result<(), AppError> {
        *self.attempts.lock().unwrap() += 1;
        if self.fail_all || self.failing_keys.lock().unwrap().contains(key) {
            return Err(AppError::ArchiveError {
                key: key.to_string(),
                message: "backend unreachable".to_string(),
            });
        }
        self.writes
            .lock()
            .unwrap()
            .push((key.to_string(), payload.to_string()));
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// MockFetcher
// ---------------------------------------------------------------------------

/// Mock fetcher that returns a configurable response.
#[derive(Clone)]
pub struct MockFetcher {
    /// Queue of responses. Each call pops the first element.
    /// If empty, returns an empty JSON array.
    responses: Arc<Mutex<Vec<Result<String, AppError>>>>,
    pub requested: Arc<Mutex<Vec<String>>>,
}

impl MockFetcher {
    pub fn new(body: &str) -> Self {
        Self::with_responses(vec![Ok(body.to_string())])
    }

    pub fn with_error(error: AppError) -> Self {
        Self::with_responses(vec![Err(error)])
    }

    pub fn with_responses(responses: Vec<Result<String, AppError>>) -> Self {
        Self {
            responses: Arc::new(Mutex::new(responses)),
            requested: Arc::new(Mutex::new(Vec::new())),
        }
    }
}

impl Fetcher for MockFetcher {
    async fn fetch(&self, url: &str) -> Result<String, AppError> {
        self.requested.lock().unwrap().push(url.to_string());
        let mut responses = self.responses.lock().unwrap();
        if responses.is_empty() {
            Ok("[]".to_string())
        } else {
            responses.remove(0)
        }
    }
}

// ---------------------------------------------------------------------------
// MockReporter
// ---------------------------------------------------------------------------

/// Mock batch reporter that records event labels.
#[derive(Clone, Default)]
pub struct MockReporter {
    pub events: Arc<Mutex<Vec<String>>>,
    pub alerts: Arc<Mutex<Vec<String>>>,
}

impl MockReporter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<String> {
        self.events.lock().unwrap().clone()
    }

    /// Number of recorded events with the given label.
    pub fn count(&self, label: &str) -> usize {
        self.events
            .lock()
            .unwrap()
            .iter()
            .filter(|e| e.as_str() == label)
            .count()
    }
}

impl BatchReporter for MockReporter {
    fn report(&self, event: BatchEvent<'_>) {
        if let Some(message) = event.alert_message() {
            self.alerts.lock().unwrap().push(message);
        }
        self.events.lock().unwrap().push(event.label().to_string());
    }
}
