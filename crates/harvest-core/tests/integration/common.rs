use std::time::Duration;

use harvest_core::testutil::MockJob;
use harvest_core::{Dependency, Job};

/// Scraper names in the order the nightly batch declares them.
pub const JOB_NAMES: [&str; 7] = [
    "doctors",
    "foreign_doctors",
    "clinical_officers",
    "health_facilities",
    "nhif_inpatient",
    "nhif_outpatient",
    "nhif_outpatient_cs",
];

/// Handles to the mocks, kept by the test for assertions.
pub struct Fleet {
    pub mocks: Vec<MockJob>,
}

impl Fleet {
    /// Every scraper succeeds; `doctors` returns `doctors_records` records.
    pub fn healthy(doctors_records: usize) -> Self {
        let mocks = JOB_NAMES
            .iter()
            .enumerate()
            .map(|(i, name)| {
                let records = if i == 0 { doctors_records } else { 10 + i };
                MockJob::succeeding(name, records)
            })
            .collect();
        Self { mocks }
    }

    /// Replace one scraper with a failing one.
    pub fn with_failure(mut self, name: &str, error: &str) -> Self {
        let slot = self.position(name);
        self.mocks[slot] = MockJob::failing(name, error);
        self
    }

    /// Make every scraper take `delay` on the tokio clock.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.mocks = self
            .mocks
            .into_iter()
            .map(|job| job.with_delay(delay))
            .collect();
        self
    }

    pub fn get(&self, name: &str) -> &MockJob {
        &self.mocks[self.position(name)]
    }

    pub fn jobs(&self) -> Vec<Box<dyn Job>> {
        self.mocks
            .iter()
            .map(|job| Box::new(job.clone()) as Box<dyn Job>)
            .collect()
    }

    fn position(&self, name: &str) -> usize {
        JOB_NAMES
            .iter()
            .position(|n| *n == name)
            .expect("unknown job name")
    }
}

pub fn doctors_dependency() -> Dependency {
    Dependency::new("doctors", "foreign_doctors")
}
