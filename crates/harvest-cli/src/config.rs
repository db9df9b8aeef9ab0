use std::path::{Path, PathBuf};
use std::time::Duration;

use harvest_client::alert::WEBHOOK_URL_ENV;
use harvest_client::fetcher::validate_url;
use harvest_client::{AlertConfig, HttpJob, ReqwestFetcher};
use harvest_core::{AppError, Dependency, Job, WatchdogConfig};
use serde::Deserialize;

const DEFAULT_JOBS_FILE: &str = "jobs.json";
const DEFAULT_ARCHIVE_DIR: &str = "data";
const DEFAULT_BUDGET_SECS: u64 = 30 * 60;
const DEFAULT_HTTP_TIMEOUT_SECS: u64 = 60;

/// Runner settings read from the environment.
#[derive(Debug, Clone)]
pub struct RunnerConfig {
    pub jobs_file: PathBuf,
    pub archive_dir: PathBuf,
    pub batch_id: String,
    pub budget: Duration,
    pub runtime_warning_threshold: Duration,
    pub http_timeout: Duration,
    pub alert: Option<AlertConfig>,
}

impl RunnerConfig {
    /// Read configuration from environment variables.
    ///
    /// - `HARVEST_JOBS_FILE` (defaults to `jobs.json`)
    /// - `HARVEST_ARCHIVE_DIR` (defaults to `data`)
    /// - `HARVEST_BATCH_ID` (defaults to `harvest-` plus 8 random hex digits)
    /// - `HARVEST_BUDGET_SECS` (defaults to 1800)
    /// - `HARVEST_RUNTIME_WARNING_SECS` (defaults to 1800)
    /// - `HARVEST_HTTP_TIMEOUT_SECS` (defaults to 60)
    /// - `HARVEST_WEBHOOK_URL` (optional)
    pub fn from_env() -> Result<Self, AppError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, AppError> {
        let var = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let batch_id = var("HARVEST_BATCH_ID")
            .map(|id| id.trim().to_string())
            .unwrap_or_else(default_batch_id);

        Ok(Self {
            jobs_file: var("HARVEST_JOBS_FILE")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from(DEFAULT_JOBS_FILE)),
            archive_dir: var("HARVEST_ARCHIVE_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from(DEFAULT_ARCHIVE_DIR)),
            batch_id,
            budget: seconds(
                "HARVEST_BUDGET_SECS",
                var("HARVEST_BUDGET_SECS"),
                DEFAULT_BUDGET_SECS,
            )?,
            runtime_warning_threshold: seconds(
                "HARVEST_RUNTIME_WARNING_SECS",
                var("HARVEST_RUNTIME_WARNING_SECS"),
                DEFAULT_BUDGET_SECS,
            )?,
            http_timeout: seconds(
                "HARVEST_HTTP_TIMEOUT_SECS",
                var("HARVEST_HTTP_TIMEOUT_SECS"),
                DEFAULT_HTTP_TIMEOUT_SECS,
            )?,
            alert: AlertConfig::from_value(lookup(WEBHOOK_URL_ENV).as_deref()),
        })
    }

    pub fn watchdog(&self) -> WatchdogConfig {
        WatchdogConfig::default()
            .with_budget(self.budget)
            .with_runtime_warning_threshold(self.runtime_warning_threshold)
    }
}

fn default_batch_id() -> String {
    let id = uuid::Uuid::new_v4().simple().to_string();
    format!("harvest-{}", &id[..8])
}

fn seconds(key: &str, raw: Option<String>, default: u64) -> Result<Duration, AppError> {
    let Some(raw) = raw else {
        return Ok(Duration::from_secs(default));
    };
    let parsed: u64 = raw.trim().parse().map_err(|_| {
        AppError::ConfigError(format!(
            "Invalid {key} '{raw}': must be a whole number of seconds"
        ))
    })?;
    if parsed == 0 {
        return Err(AppError::ConfigError(format!("{key} must be at least 1")));
    }
    Ok(Duration::from_secs(parsed))
}

/// One scraper entry of the jobs file.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct JobSpec {
    pub name: String,
    pub url: String,
    #[serde(default)]
    pub records_pointer: Option<String>,
}

/// The ordered job list plus the optional producer/dependent pair.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct JobsFile {
    pub jobs: Vec<JobSpec>,
    #[serde(default)]
    pub dependency: Option<Dependency>,
}

impl JobsFile {
    pub fn load(path: &Path) -> Result<Self, AppError> {
        let raw = std::fs::read_to_string(path).map_err(|e| {
            AppError::ConfigError(format!(
                "Failed to read jobs file {}: {e}",
                path.display()
            ))
        })?;
        Self::parse(&raw)
    }

    pub fn parse(raw: &str) -> Result<Self, AppError> {
        let file: Self = serde_json::from_str(raw)
            .map_err(|e| AppError::ConfigError(format!("Invalid jobs file: {e}")))?;

        for spec in &file.jobs {
            validate_url(&spec.url).map_err(|e| {
                AppError::ConfigError(format!("Job '{}' has a bad url: {e}", spec.name))
            })?;
            if let Some(pointer) = &spec.records_pointer {
                if !pointer.is_empty() && !pointer.starts_with('/') {
                    return Err(AppError::ConfigError(format!(
                        "Job '{}': records_pointer must start with '/'",
                        spec.name
                    )));
                }
            }
        }
        Ok(file)
    }

    /// Build the scraper jobs in declaration order, sharing one fetcher.
    pub fn build_jobs(&self, fetcher: &ReqwestFetcher) -> Vec<Box<dyn Job>> {
        self.jobs
            .iter()
            .map(|spec| {
                let mut job = HttpJob::new(&spec.name, &spec.url, fetcher.clone());
                if let Some(pointer) = &spec.records_pointer {
                    job = job.with_records_pointer(pointer);
                }
                Box::new(job) as Box<dyn Job>
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key: &str| vars.get(key).cloned()
    }

    #[test]
    fn defaults() {
        let config = RunnerConfig::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config.jobs_file, PathBuf::from("jobs.json"));
        assert_eq!(config.archive_dir, PathBuf::from("data"));
        assert_eq!(config.budget, Duration::from_secs(1800));
        assert_eq!(config.runtime_warning_threshold, Duration::from_secs(1800));
        assert_eq!(config.http_timeout, Duration::from_secs(60));
        assert!(config.alert.is_none());
        assert!(config.batch_id.starts_with("harvest-"));
        assert_eq!(config.batch_id.len(), "harvest-".len() + 8);
    }

    #[test]
    fn reads_overrides() {
        let config = RunnerConfig::from_lookup(lookup(&[
            ("HARVEST_JOBS_FILE", "/etc/harvest/jobs.json"),
            ("HARVEST_ARCHIVE_DIR", "/var/lib/harvest"),
            ("HARVEST_BATCH_ID", "healthtools"),
            ("HARVEST_BUDGET_SECS", "600"),
            ("HARVEST_RUNTIME_WARNING_SECS", " 300 "),
            ("HARVEST_WEBHOOK_URL", "https://hooks.example.com/services/T0"),
        ]))
        .unwrap();

        assert_eq!(config.jobs_file, PathBuf::from("/etc/harvest/jobs.json"));
        assert_eq!(config.batch_id, "healthtools");
        let watchdog = config.watchdog();
        assert_eq!(watchdog.budget, Duration::from_secs(600));
        assert_eq!(watchdog.runtime_warning_threshold, Duration::from_secs(300));
        assert!(config.alert.is_some());
    }

    #[test]
    fn invalid_webhook_disables_alerts_only() {
        let config =
            RunnerConfig::from_lookup(lookup(&[("HARVEST_WEBHOOK_URL", "hooks.example.com")]))
                .unwrap();
        assert!(config.alert.is_none());
    }

    #[test]
    fn rejects_bad_numbers() {
        for (key, value) in [
            ("HARVEST_BUDGET_SECS", "0"),
            ("HARVEST_BUDGET_SECS", "half an hour"),
            ("HARVEST_RUNTIME_WARNING_SECS", "-5"),
            ("HARVEST_HTTP_TIMEOUT_SECS", "0"),
        ] {
            let err = RunnerConfig::from_lookup(lookup(&[(key, value)])).unwrap_err();
            assert!(
                matches!(&err, AppError::ConfigError(msg) if msg.contains(key)),
                "{key}={value}: {err}"
            );
        }
    }

    #[test]
    fn parses_jobs_file() {
        let file = JobsFile::parse(
            r#"{
                "jobs": [
                    {"name": "doctors", "url": "https://example.com/doctors.json", "records_pointer": "/data"},
                    {"name": "foreign_doctors", "url": "https://example.com/foreign.json"}
                ],
                "dependency": {"producer": "doctors", "dependent": "foreign_doctors"}
            }"#,
        )
        .unwrap();

        assert_eq!(file.jobs.len(), 2);
        assert_eq!(file.jobs[0].records_pointer.as_deref(), Some("/data"));
        assert!(file.jobs[1].records_pointer.is_none());
        let dep = file.dependency.as_ref().unwrap();
        assert_eq!(dep.producer, "doctors");

        let fetcher = ReqwestFetcher::new().unwrap();
        let jobs = file.build_jobs(&fetcher);
        let names: Vec<&str> = jobs.iter().map(|j| j.name()).collect();
        assert_eq!(names, vec!["doctors", "foreign_doctors"]);
    }

    #[test]
    fn dependency_is_optional() {
        let file =
            JobsFile::parse(r#"{"jobs": [{"name": "nhif", "url": "http://localhost/nhif"}]}"#)
                .unwrap();
        assert!(file.dependency.is_none());
    }

    #[test]
    fn rejects_bad_entries() {
        for raw in [
            r#"{"jobs": [{"name": "a", "url": "ftp://example.com/a"}]}"#,
            r#"{"jobs": [{"name": "a", "url": "https://example.com/a", "records_pointer": "data"}]}"#,
            r#"{"jobs": [{"name": "a", "url": "https://example.com/a", "retries": 3}]}"#,
            r#"{"jobs": "#,
        ] {
            assert!(
                matches!(JobsFile::parse(raw), Err(AppError::ConfigError(_))),
                "{raw}"
            );
        }
    }

    #[test]
    fn load_reports_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let err = JobsFile::load(&dir.path().join("missing.json")).unwrap_err();
        assert!(err.to_string().contains("missing.json"));

        let path = dir.path().join("jobs.json");
        std::fs::write(&path, r#"{"jobs": []}"#).unwrap();
        assert!(JobsFile::load(&path).unwrap().jobs.is_empty());
    }
}
