// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::driver::fake::{FakeDriver, FakeMode};
use serde_json::json;
use tempfile::TempDir;

fn test_repo() -> (TempDir, Repository) {
    let dir = TempDir::new().unwrap();
    let repo = Repository::open(dir.path().join("state.db")).unwrap();
    (dir, repo)
}

fn orchestrator(repo: &Repository, mode: FakeMode) -> Orchestrator {
    Orchestrator::new(repo.clone(), Arc::new(FakeDriver::new(mode)), EngineConfig::default())
}

fn items_params(items: Value) -> CreateJobParams {
    CreateJobParams {
        name: "batch".to_string(),
        user_intent: "summarize each record".to_string(),
        enumerator_type: "items".to_string(),
        enumerator_config: json!({"items": items}),
        max_workers: Some(2),
        max_retries: Some(1),
        post_processing_prompt: None,
        bypass_failures: false,
        metadata: Metadata::new(),
    }
}

#[test]
fn create_job_persists_job_and_pending_units() {
    let (_dir, repo) = test_repo();
    let orch = orchestrator(&repo, FakeMode::AlwaysSucceed);

    let created = orch
        .create_job(items_params(json!([{"name": "a"}, {"name": "b"}, {"name": "c"}])))
        .unwrap();

    assert_eq!(created.total_items, 3);
    assert!(created.message.contains("3 items"));
    // The generic prompt lists the sample payload's fields.
    assert!(created.worker_prompt.contains("- name: {name}"));

    let job = repo.get_job(&created.job_id).unwrap().unwrap();
    assert_eq!(job.status, JobStatus::Created);
    assert_eq!(job.total_units, 3);
    assert_eq!(job.max_workers, 2);
    assert_eq!(job.unit_type, "items");

    let units = repo.get_units_for_job(&created.job_id, None, 100, 0).unwrap();
    assert_eq!(units.len(), 3);
    for unit in units {
        assert_eq!(unit.status, WorkUnitStatus::Pending);
        assert_eq!(unit.max_retries, 1);
    }
}

#[test]
fn create_job_uses_file_prompt_for_file_sources() {
    let (_dir, repo) = test_repo();
    let files = TempDir::new().unwrap();
    std::fs::write(files.path().join("a.txt"), "x").unwrap();

    let orch = orchestrator(&repo, FakeMode::AlwaysSucceed);
    let created = orch
        .create_job(CreateJobParams {
            name: "files".to_string(),
            user_intent: "shrink it".to_string(),
            enumerator_type: "file".to_string(),
            enumerator_config: json!({
                "base_directory": files.path(),
                "pattern": "*.txt",
            }),
            max_workers: None,
            max_retries: None,
            post_processing_prompt: Some("summarize".to_string()),
            bypass_failures: true,
            metadata: Metadata::new(),
        })
        .unwrap();

    assert!(created.worker_prompt.contains("FILE TO PROCESS: {file_path}"));
    assert!(created.has_post_processing);

    let job = repo.get_job(&created.job_id).unwrap().unwrap();
    assert!(job.bypass_failures);
    assert_eq!(job.post_processing_prompt.as_deref(), Some("summarize"));
}

#[test]
fn create_job_rejects_empty_and_invalid_sources() {
    let (_dir, repo) = test_repo();
    let orch = orchestrator(&repo, FakeMode::AlwaysSucceed);

    let err = orch.create_job(items_params(json!([]))).unwrap_err();
    assert!(matches!(err, EngineError::NoItems));

    let mut params = items_params(json!([{"i": 1}]));
    params.enumerator_type = "carrier-pigeon".to_string();
    let err = orch.create_job(params).unwrap_err();
    assert!(matches!(err, EngineError::Enumerate(_)));

    // Nothing was persisted by the failed attempts.
    assert!(repo.list_jobs(10, None).unwrap().is_empty());
}

#[tokio::test]
async fn test_phase_runs_first_unit_and_awaits_approval() {
    let (_dir, repo) = test_repo();
    let orch = orchestrator(&repo, FakeMode::AlwaysSucceed);
    let created =
        orch.create_job(items_params(json!([{"i": 1}, {"i": 2}, {"i": 3}]))).unwrap();

    let outcome = orch.start_job(&created.job_id, None, false).await.unwrap();
    let report = match outcome {
        StartOutcome::Testing(report) => report,
        other => panic!("expected test report, got {other:?}"),
    };

    assert!(report.test_passed);
    assert!(report.awaiting_user_approval);
    assert_eq!(report.output.as_deref(), Some("ok"));
    assert_eq!(report.remaining_units, 2);

    let job = repo.get_job(&created.job_id).unwrap().unwrap();
    assert_eq!(job.status, JobStatus::Testing);
    assert!(job.test_passed);
    // The test unit counts as completed so the dispatch loop skips it.
    assert_eq!(job.completed_units, 1);
    assert_eq!(job.total_units, 3);
    assert_eq!(job.test_unit_id, Some(report.test_unit_id.clone()));

    let unit = repo.get_work_unit(&report.test_unit_id).unwrap().unwrap();
    assert_eq!(unit.status, WorkUnitStatus::Completed);
    assert!(unit.completed_at.is_some());
    assert_eq!(unit.cost_usd, Some(0.001));

    // Exactly one unit is completed.
    let counts = repo.count_units_by_status(&created.job_id).unwrap();
    assert_eq!(counts.get("completed"), Some(&1));
    assert_eq!(counts.get("pending"), Some(&2));
}

#[tokio::test]
async fn failed_test_reports_error_and_counts_nothing() {
    let (_dir, repo) = test_repo();
    let orch = orchestrator(&repo, FakeMode::AlwaysFail);
    let created = orch.create_job(items_params(json!([{"i": 1}]))).unwrap();

    let outcome = orch.start_job(&created.job_id, None, false).await.unwrap();
    let StartOutcome::Testing(report) = outcome else {
        panic!("expected test report");
    };

    assert!(!report.test_passed);
    assert_eq!(report.error.as_deref(), Some("scripted failure"));

    let job = repo.get_job(&created.job_id).unwrap().unwrap();
    assert!(!job.test_passed);
    assert_eq!(job.completed_units, 0);
}

#[tokio::test]
async fn rejecting_a_test_resets_to_created() {
    let (_dir, repo) = test_repo();
    let orch = orchestrator(&repo, FakeMode::AlwaysSucceed);
    let created = orch.create_job(items_params(json!([{"i": 1}, {"i": 2}]))).unwrap();

    orch.start_job(&created.job_id, None, false).await.unwrap();
    let outcome = orch.start_job(&created.job_id, Some(false), false).await.unwrap();
    assert!(matches!(outcome, StartOutcome::Reset { .. }));

    let job = repo.get_job(&created.job_id).unwrap().unwrap();
    assert_eq!(job.status, JobStatus::Created);
    assert!(!job.test_passed);
}

#[tokio::test]
async fn asking_again_replays_stored_test_results() {
    let (_dir, repo) = test_repo();
    let orch = orchestrator(&repo, FakeMode::AlwaysSucceed);
    let created = orch.create_job(items_params(json!([{"i": 1}, {"i": 2}]))).unwrap();

    let first = orch.start_job(&created.job_id, None, false).await.unwrap();
    let StartOutcome::Testing(first) = first else { panic!("expected test report") };

    let replay = orch.start_job(&created.job_id, None, false).await.unwrap();
    let StartOutcome::Testing(replay) = replay else { panic!("expected test report") };

    assert_eq!(replay.test_unit_id, first.test_unit_id);
    assert!(replay.test_passed);
    assert_eq!(replay.output.as_deref(), Some("ok"));
    assert!(replay.awaiting_user_approval);
}

#[tokio::test]
async fn start_rejects_terminal_states() {
    let (_dir, repo) = test_repo();
    let orch = orchestrator(&repo, FakeMode::AlwaysSucceed);
    let created = orch.create_job(items_params(json!([{"i": 1}]))).unwrap();

    let mut job = repo.get_job(&created.job_id).unwrap().unwrap();
    job.status = JobStatus::Completed;
    repo.update_job(&job).unwrap();

    let err = orch.start_job(&created.job_id, None, false).await.unwrap_err();
    assert!(matches!(err, EngineError::InvalidJobState(JobStatus::Completed)));

    let err = orch.start_job(&JobId::new("ghost"), None, false).await.unwrap_err();
    assert!(matches!(err, EngineError::JobNotFound(_)));
}

#[tokio::test]
async fn job_status_report_includes_unit_stats() {
    let (_dir, repo) = test_repo();
    let orch = orchestrator(&repo, FakeMode::AlwaysSucceed);
    let created = orch.create_job(items_params(json!([{"i": 1}, {"i": 2}]))).unwrap();

    let report = orch.get_job_status(&created.job_id).unwrap();
    assert_eq!(report.status, JobStatus::Created);
    assert_eq!(report.executor_state, controls::ExecutorState::NotStarted);
    assert_eq!(report.progress.total, 2);
    assert_eq!(report.unit_stats.get("pending"), Some(&2));
}
