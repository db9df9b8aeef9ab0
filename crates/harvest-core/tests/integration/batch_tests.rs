use std::time::Duration;

use harvest_core::testutil::{MockArchive, MockReporter};
use harvest_core::{
    NullArchive, Orchestrator, ReportArchiver, Watchdog, WatchdogConfig, WatchdogOutcome,
    WatchdogState, run_and_archive,
};

use crate::integration::common::{Fleet, JOB_NAMES, doctors_dependency};

fn payload_without_timestamp(payload: &str) -> serde_json::Value {
    let mut value: serde_json::Value = serde_json::from_str(payload).unwrap();
    value.as_object_mut().unwrap().remove("completed_at");
    value
}

#[tokio::test(start_paused = true)]
async fn supervised_batch_archives_one_entry_per_job() {
    let fleet = Fleet::healthy(25);
    let archive = MockArchive::new();
    let reporter = MockReporter::new();

    let mut orchestrator = Orchestrator::new(
        "healthtools",
        fleet.jobs(),
        Some(doctors_dependency()),
        reporter.clone(),
    )
    .unwrap();
    let archiver = ReportArchiver::new(archive.clone(), reporter.clone());
    let watchdog = Watchdog::new("healthtools", WatchdogConfig::default(), reporter.clone());

    let outcome = watchdog
        .supervise(async move { run_and_archive(&mut orchestrator, &archiver).await })
        .await;

    let run = match outcome {
        WatchdogOutcome::Completed(run) => run,
        other => panic!("expected completion, got {}", other.state()),
    };
    assert_eq!(run.succeeded, JOB_NAMES.len());
    assert_eq!(fleet.get("foreign_doctors").offsets(), vec![25]);

    let writes = archive.writes();
    assert_eq!(writes.len(), 2);
    assert_eq!(writes[0].0, "stats.json");
    assert!(writes[1].0.starts_with("stats/stats-"));
    assert_eq!(writes[0].1, writes[1].1);

    let payload: serde_json::Value = serde_json::from_str(&writes[0].1).unwrap();
    let names: Vec<_> = payload["jobs"].as_object().unwrap().keys().cloned().collect();
    assert_eq!(names, JOB_NAMES);
    assert_eq!(payload["batch_id"], "healthtools");
    assert_eq!(payload["total_runtime"], "0 seconds");

    assert_eq!(reporter.count("StillRunning"), 0);
    assert_eq!(reporter.count("RanLong"), 0);
}

#[tokio::test(start_paused = true)]
async fn empty_doctors_result_skips_foreign_doctors_only() {
    let fleet = Fleet::healthy(0).with_failure("clinical_officers", "HTTP 502");
    let archive = MockArchive::new();
    let reporter = MockReporter::new();

    let mut orchestrator = Orchestrator::new(
        "healthtools",
        fleet.jobs(),
        Some(doctors_dependency()),
        reporter.clone(),
    )
    .unwrap();
    let archiver = ReportArchiver::new(archive.clone(), reporter.clone());

    let run = run_and_archive(&mut orchestrator, &archiver).await;

    assert_eq!(fleet.get("foreign_doctors").run_count(), 0);
    assert_eq!(fleet.get("nhif_outpatient_cs").run_count(), 1);
    assert_eq!((run.succeeded, run.failed, run.skipped), (5, 1, 1));

    let payload: serde_json::Value = serde_json::from_str(&archive.writes()[0].1).unwrap();
    assert_eq!(payload["jobs"]["foreign_doctors"]["status"], "skipped");
    assert_eq!(payload["jobs"]["clinical_officers"]["status"], "failed");
    assert_eq!(payload["jobs"].as_object().unwrap().len(), JOB_NAMES.len());
}

#[tokio::test(start_paused = true)]
async fn overrunning_batch_warns_then_finishes_on_its_own() {
    // Seven scrapers at five minutes each: 35 minutes against a 30 minute budget.
    let fleet = Fleet::healthy(3).with_delay(Duration::from_secs(5 * 60));
    let archive = MockArchive::new();
    let reporter = MockReporter::new();

    let mut orchestrator = Orchestrator::new(
        "healthtools",
        fleet.jobs(),
        Some(doctors_dependency()),
        reporter.clone(),
    )
    .unwrap();
    let archiver = ReportArchiver::new(archive.clone(), reporter.clone());
    let watchdog = Watchdog::new("healthtools", WatchdogConfig::default(), reporter.clone());

    let outcome = watchdog
        .supervise(async move { run_and_archive(&mut orchestrator, &archiver).await })
        .await;

    let handle = match outcome {
        WatchdogOutcome::TimedOut(handle) => handle,
        other => panic!("expected timeout, got {}", other.state()),
    };
    assert_eq!(watchdog.state(), WatchdogState::TimedOut);
    assert_eq!(reporter.count("StillRunning"), 1);
    assert!(archive.writes().is_empty());

    let run = watchdog.await_overrun(handle).await.unwrap();
    assert_eq!(run.total_runtime, Duration::from_secs(35 * 60));
    assert_eq!(archive.writes().len(), 2);
    assert_eq!(reporter.count("StillRunning"), 1);
    assert_eq!(reporter.count("RanLong"), 1);
    assert!(
        reporter
            .alerts
            .lock()
            .unwrap()
            .iter()
            .any(|a| a == "Scraper: healthtools ran for about 0hr:35min:00sec")
    );
}

#[tokio::test(start_paused = true)]
async fn archive_outage_does_not_fail_the_batch() {
    let fleet = Fleet::healthy(4);
    let archive = MockArchive::failing_on_all();
    let reporter = MockReporter::new();

    let mut orchestrator = Orchestrator::new(
        "healthtools",
        fleet.jobs(),
        Some(doctors_dependency()),
        reporter.clone(),
    )
    .unwrap();
    let archiver = ReportArchiver::new(archive.clone(), reporter.clone());

    let run = run_and_archive(&mut orchestrator, &archiver).await;

    let summary = run.archive.unwrap();
    assert_eq!(summary.failures.len(), 2);
    assert_eq!(archive.attempts(), 2);
    assert_eq!(reporter.count("ArchiveFailed"), 2);
    assert_eq!(run.succeeded, JOB_NAMES.len());
}

#[tokio::test(start_paused = true)]
async fn identical_batches_differ_only_in_completion_time() {
    let archive = MockArchive::new();
    let reporter = MockReporter::new();
    let archiver = ReportArchiver::new(archive.clone(), reporter.clone());

    for _ in 0..2 {
        let fleet = Fleet::healthy(8).with_failure("nhif_inpatient", "timeout");
        let mut orchestrator = Orchestrator::new(
            "healthtools",
            fleet.jobs(),
            Some(doctors_dependency()),
            reporter.clone(),
        )
        .unwrap();
        run_and_archive(&mut orchestrator, &archiver).await;
    }

    let writes = archive.writes();
    assert_eq!(writes.len(), 4);
    assert_eq!(
        payload_without_timestamp(&writes[0].1),
        payload_without_timestamp(&writes[2].1)
    );
    assert_eq!(writes[0].0, writes[2].0);
    assert_ne!(writes[1].0, writes[3].0);
}

#[tokio::test(start_paused = true)]
async fn report_only_run_with_null_archive() {
    let fleet = Fleet::healthy(1);
    let reporter = MockReporter::new();

    let mut orchestrator =
        Orchestrator::new("healthtools", fleet.jobs(), None, reporter.clone()).unwrap();
    let archiver = ReportArchiver::new(NullArchive, reporter.clone());

    let run = run_and_archive(&mut orchestrator, &archiver).await;

    assert!(run.archive.unwrap().is_complete());
    assert_eq!(reporter.count("ArchiveWritten"), 2);
    assert!(
        JOB_NAMES
            .iter()
            .all(|name| fleet.get(name).run_count() == 1)
    );
}
