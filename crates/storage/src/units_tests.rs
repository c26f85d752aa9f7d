// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use crate::Repository;
use drover_core::{JobId, UnitId, WorkUnit, WorkUnitStatus, WorkerId};
use serde_json::json;
use tempfile::TempDir;

fn test_repo() -> (TempDir, Repository) {
    let dir = TempDir::new().unwrap();
    let repo = Repository::open(dir.path().join("state.db")).unwrap();
    (dir, repo)
}

fn unit(job: &str, payload: serde_json::Value) -> WorkUnit {
    WorkUnit::new(JobId::new(job), "items", payload)
}

#[test]
fn unit_round_trips() {
    let (_dir, repo) = test_repo();

    let mut u = unit("job-1", json!({"i": 1, "name": "first"}));
    u.session_id = Some("sess-1".into());
    u.cost_usd = Some(0.05);
    u.output_files = vec!["/tmp/out.txt".into()];
    u.conversation = Some(vec![json!({"type": "assistant"})]);
    repo.create_work_unit(&u).unwrap();

    let loaded = repo.get_work_unit(&u.unit_id).unwrap().unwrap();
    assert_eq!(loaded.job_id, "job-1");
    assert_eq!(loaded.status, WorkUnitStatus::Pending);
    assert_eq!(loaded.payload, u.payload);
    assert_eq!(loaded.session_id.as_deref(), Some("sess-1"));
    assert_eq!(loaded.cost_usd, Some(0.05));
    assert_eq!(loaded.output_files, vec!["/tmp/out.txt".to_string()]);
    assert_eq!(loaded.conversation, u.conversation);
    assert_eq!(loaded.created_at, u.created_at);
}

#[test]
fn pending_units_are_oldest_first_and_limited() {
    let (_dir, repo) = test_repo();
    let job = JobId::new("job-1");

    for i in 0..5i64 {
        let mut u = unit("job-1", json!({"i": i}));
        // Spread creation times so ordering is deterministic.
        u.created_at = chrono::Utc::now() + chrono::Duration::milliseconds(i);
        repo.create_work_unit(&u).unwrap();
    }
    let mut done = unit("job-1", json!({"i": 99}));
    done.status = WorkUnitStatus::Completed;
    repo.create_work_unit(&done).unwrap();

    let pending = repo.get_pending_units(&job, 3).unwrap();
    assert_eq!(pending.len(), 3);
    assert!(pending.iter().all(|u| u.status == WorkUnitStatus::Pending));
    assert_eq!(pending[0].payload["i"], 0);
    assert_eq!(pending[2].payload["i"], 2);
}

#[test]
fn count_units_by_status() {
    let (_dir, repo) = test_repo();
    let job = JobId::new("job-1");

    for status in
        [WorkUnitStatus::Pending, WorkUnitStatus::Pending, WorkUnitStatus::Failed]
    {
        let mut u = unit("job-1", json!({}));
        u.status = status;
        repo.create_work_unit(&u).unwrap();
    }

    let counts = repo.count_units_by_status(&job).unwrap();
    assert_eq!(counts.get("pending"), Some(&2));
    assert_eq!(counts.get("failed"), Some(&1));
    assert_eq!(counts.get("completed"), None);
}

#[test]
fn reset_stuck_units_is_idempotent() {
    let (_dir, repo) = test_repo();
    let job = JobId::new("job-1");

    let mut assigned = unit("job-1", json!({}));
    assigned.mark_assigned(WorkerId::new("w-1"), chrono::Utc::now());
    repo.create_work_unit(&assigned).unwrap();

    let mut processing = unit("job-1", json!({}));
    processing.mark_assigned(WorkerId::new("w-2"), chrono::Utc::now());
    processing.mark_processing(chrono::Utc::now());
    repo.create_work_unit(&processing).unwrap();

    let untouched = unit("job-1", json!({}));
    repo.create_work_unit(&untouched).unwrap();

    assert_eq!(repo.reset_stuck_units(&job).unwrap(), 2);
    assert_eq!(repo.reset_stuck_units(&job).unwrap(), 0);

    for id in [&assigned.unit_id, &processing.unit_id] {
        let u = repo.get_work_unit(id).unwrap().unwrap();
        assert_eq!(u.status, WorkUnitStatus::Pending);
        assert!(u.worker_id.is_none());
        assert!(u.assigned_at.is_none());
        assert!(u.started_at.is_none());
    }
}

#[test]
fn append_conversation_event_appends_in_order() {
    let (_dir, repo) = test_repo();

    let u = unit("job-1", json!({}));
    repo.create_work_unit(&u).unwrap();

    let first = json!({"type": "assistant", "seq": 1});
    let second = json!({"type": "tool_use", "seq": 2});
    assert!(repo.append_conversation_event(&u.unit_id, &first).unwrap());
    assert!(repo.append_conversation_event(&u.unit_id, &second).unwrap());

    let loaded = repo.get_work_unit(&u.unit_id).unwrap().unwrap();
    let conversation = loaded.conversation.unwrap();
    assert_eq!(conversation.len(), 2);
    assert_eq!(conversation[1], second);
}

#[test]
fn append_conversation_event_tolerates_missing_unit() {
    let (_dir, repo) = test_repo();
    let appended = repo
        .append_conversation_event(&UnitId::new("ghost"), &json!({"type": "assistant"}))
        .unwrap();
    assert!(!appended);
}

#[test]
fn targeted_setters_leave_other_fields_alone() {
    let (_dir, repo) = test_repo();

    let mut u = unit("job-1", json!({"keep": true}));
    u.error = Some("old error".into());
    repo.create_work_unit(&u).unwrap();

    repo.set_work_unit_session_id(&u.unit_id, "sess-42").unwrap();
    repo.set_work_unit_process_id(&u.unit_id, Some(777)).unwrap();

    let loaded = repo.get_work_unit(&u.unit_id).unwrap().unwrap();
    assert_eq!(loaded.session_id.as_deref(), Some("sess-42"));
    assert_eq!(loaded.process_id, Some(777));
    assert_eq!(loaded.error.as_deref(), Some("old error"));
    assert_eq!(loaded.payload, json!({"keep": true}));

    repo.set_work_unit_process_id(&u.unit_id, None).unwrap();
    let loaded = repo.get_work_unit(&u.unit_id).unwrap().unwrap();
    assert_eq!(loaded.process_id, None);
}

#[test]
fn total_cost_sums_recorded_costs() {
    let (_dir, repo) = test_repo();
    let job = JobId::new("job-1");

    assert_eq!(repo.get_job_total_cost(&job).unwrap(), None);

    for cost in [Some(0.25), Some(0.5), None] {
        let mut u = unit("job-1", json!({}));
        u.cost_usd = cost;
        repo.create_work_unit(&u).unwrap();
    }

    let total = repo.get_job_total_cost(&job).unwrap().unwrap();
    assert!((total - 0.75).abs() < 1e-9);
}
