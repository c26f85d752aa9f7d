// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use drover_core::{JobConfig, WorkUnit, WorkerId};
use serde_json::json;
use tempfile::TempDir;

fn test_repo() -> (TempDir, Repository) {
    let dir = TempDir::new().unwrap();
    let repo = Repository::open(dir.path().join("state.db")).unwrap();
    (dir, repo)
}

fn seed_job(repo: &Repository) -> Job {
    let job = Job::new(JobConfig::new("ctl", "d", "t", "items", 2));
    repo.create_job(&job).unwrap();
    job
}

/// A pid that cannot exist on Linux (beyond the default pid_max).
const DEAD_PID: i32 = 9_999_999;

#[test]
fn executor_status_distinguishes_missing_and_not_started() {
    let (_dir, repo) = test_repo();

    let status = get_executor_status(&repo, &JobId::new("ghost")).unwrap();
    assert_eq!(status.state, ExecutorState::NotFound);

    let job = seed_job(&repo);
    let status = get_executor_status(&repo, &job.job_id).unwrap();
    assert_eq!(status.state, ExecutorState::NotStarted);
    assert_eq!(status.job_status, Some(JobStatus::Created));
}

#[test]
fn executor_status_reports_dead_pid_as_stopped() {
    let (_dir, repo) = test_repo();
    let mut job = seed_job(&repo);
    job.record_executor_spawn(DEAD_PID, Utc::now());
    repo.update_job(&job).unwrap();

    let status = get_executor_status(&repo, &job.job_id).unwrap();
    assert_eq!(status.state, ExecutorState::Stopped);
    assert_eq!(status.pid, Some(DEAD_PID));
}

#[test]
fn executor_status_reports_live_pid_as_running() {
    let (_dir, repo) = test_repo();
    let mut job = seed_job(&repo);
    // Our own pid is definitely alive.
    job.record_executor_spawn(std::process::id() as i32, Utc::now());
    repo.update_job(&job).unwrap();

    let status = get_executor_status(&repo, &job.job_id).unwrap();
    assert_eq!(status.state, ExecutorState::Running);
}

#[test]
fn kill_executor_tolerates_already_dead_process() {
    let (_dir, repo) = test_repo();
    let mut job = seed_job(&repo);
    job.record_executor_spawn(DEAD_PID, Utc::now());
    repo.update_job(&job).unwrap();

    // A unit stuck in processing from the dead run.
    let mut stuck = WorkUnit::new(job.job_id.clone(), "items", json!({}));
    stuck.mark_assigned(WorkerId::new("w-1"), Utc::now());
    stuck.mark_processing(Utc::now());
    repo.create_work_unit(&stuck).unwrap();

    let result = kill_executor(&repo, &job.job_id).unwrap();
    assert!(result.success);

    let killed = repo.get_job(&job.job_id).unwrap().unwrap();
    assert_eq!(killed.status, JobStatus::Failed);
    assert!(killed.meta_str("killed_at").is_some());
    assert!(killed.meta_str("kill_reason").unwrap().contains("kill"));

    // Stuck units are back to pending for the next executor.
    let unit = repo.get_work_unit(&stuck.unit_id).unwrap().unwrap();
    assert_eq!(unit.status, WorkUnitStatus::Pending);
    assert!(unit.worker_id.is_none());
}

#[test]
fn kill_executor_refuses_without_pid() {
    let (_dir, repo) = test_repo();
    let job = seed_job(&repo);

    let result = kill_executor(&repo, &job.job_id).unwrap();
    assert!(!result.success);
    assert!(result.message.contains("no executor process"));

    let result = kill_executor(&repo, &JobId::new("ghost")).unwrap();
    assert!(!result.success);
}

#[test]
fn kill_work_unit_marks_stale_pid_failed() {
    let (_dir, repo) = test_repo();
    let job = seed_job(&repo);

    let mut unit = WorkUnit::new(job.job_id.clone(), "items", json!({}));
    unit.mark_assigned(WorkerId::new("w-1"), Utc::now());
    unit.mark_processing(Utc::now());
    unit.process_id = Some(DEAD_PID);
    repo.create_work_unit(&unit).unwrap();

    let result = kill_work_unit(&repo, &job.job_id, &unit.unit_id).unwrap();
    assert!(result.success);

    let loaded = repo.get_work_unit(&unit.unit_id).unwrap().unwrap();
    assert_eq!(loaded.status, WorkUnitStatus::Failed);
    assert!(loaded.error.unwrap().contains("already dead"));
    assert!(loaded.process_id.is_none());
}

#[test]
fn kill_work_unit_guards_identity() {
    let (_dir, repo) = test_repo();
    let job = seed_job(&repo);

    let result = kill_work_unit(&repo, &job.job_id, &UnitId::new("ghost")).unwrap();
    assert!(!result.success);

    let other_job = Job::new(JobConfig::new("ctl-other", "d", "t", "items", 2));
    repo.create_job(&other_job).unwrap();
    let unit = WorkUnit::new(other_job.job_id.clone(), "items", json!({}));
    repo.create_work_unit(&unit).unwrap();
    let result = kill_work_unit(&repo, &job.job_id, &unit.unit_id).unwrap();
    assert!(!result.success);
    assert!(result.message.contains("does not belong"));

    // A unit without a recorded pid is not killable.
    let idle = WorkUnit::new(job.job_id.clone(), "items", json!({}));
    repo.create_work_unit(&idle).unwrap();
    let result = kill_work_unit(&repo, &job.job_id, &idle.unit_id).unwrap();
    assert!(!result.success);
    assert!(result.message.contains("no process"));
}

#[test]
fn restart_work_unit_resets_everything_but_retry_count() {
    let (_dir, repo) = test_repo();
    let mut job = seed_job(&repo);
    job.failed_units = 1;
    repo.update_job(&job).unwrap();

    let mut unit = WorkUnit::new(job.job_id.clone(), "items", json!({"i": 1}));
    unit.status = WorkUnitStatus::Failed;
    unit.retry_count = 2;
    unit.error = Some("boom".into());
    unit.session_id = Some("sess".into());
    unit.cost_usd = Some(0.5);
    unit.process_id = Some(DEAD_PID);
    repo.create_work_unit(&unit).unwrap();

    let result = restart_work_unit(&repo, &job.job_id, &unit.unit_id).unwrap();
    assert!(result.success, "{}", result.message);

    let loaded = repo.get_work_unit(&unit.unit_id).unwrap().unwrap();
    assert_eq!(loaded.status, WorkUnitStatus::Pending);
    assert_eq!(loaded.retry_count, 2);
    assert!(loaded.error.is_none());
    assert!(loaded.result.is_none());
    assert!(loaded.worker_id.is_none());
    assert!(loaded.session_id.is_none());
    assert!(loaded.cost_usd.is_none());
    assert!(loaded.process_id.is_none());
    assert!(loaded.completed_at.is_none());

    let loaded_job = repo.get_job(&job.job_id).unwrap().unwrap();
    assert_eq!(loaded_job.failed_units, 0);

    // Decrement floors at zero on a second restart of another failure.
    let mut again = repo.get_work_unit(&unit.unit_id).unwrap().unwrap();
    again.status = WorkUnitStatus::Failed;
    repo.update_work_unit(&again).unwrap();
    restart_work_unit(&repo, &job.job_id, &unit.unit_id).unwrap();
    let loaded_job = repo.get_job(&job.job_id).unwrap().unwrap();
    assert_eq!(loaded_job.failed_units, 0);
}

#[test]
fn restart_work_unit_only_from_failed() {
    let (_dir, repo) = test_repo();
    let job = seed_job(&repo);

    let unit = WorkUnit::new(job.job_id.clone(), "items", json!({}));
    repo.create_work_unit(&unit).unwrap();

    let result = restart_work_unit(&repo, &job.job_id, &unit.unit_id).unwrap();
    assert!(!result.success);
    assert!(result.message.contains("pending"));
}

#[test]
fn resume_job_returns_none_without_pending_units() {
    let (_dir, repo) = test_repo();
    let job = seed_job(&repo);

    // No units at all.
    assert_eq!(resume_job(&repo, &job.job_id).unwrap(), None);
    assert_eq!(resume_job(&repo, &JobId::new("ghost")).unwrap(), None);
}

#[test]
fn resume_job_reports_live_executor() {
    let (_dir, repo) = test_repo();
    let mut job = seed_job(&repo);
    let self_pid = std::process::id() as i32;
    job.record_executor_spawn(self_pid, Utc::now());
    repo.update_job(&job).unwrap();

    let unit = WorkUnit::new(job.job_id.clone(), "items", json!({}));
    repo.create_work_unit(&unit).unwrap();

    assert_eq!(resume_job(&repo, &job.job_id).unwrap(), Some(self_pid));
}
