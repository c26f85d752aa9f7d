// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

#[test]
fn assigned_worker_starts_busy() {
    let worker = WorkerProcess::assigned(JobId::new("job-1"), UnitId::new("unit-1"));

    assert_eq!(worker.status, WorkerStatus::Busy);
    assert_eq!(worker.job_id.as_ref().map(JobId::as_str), Some("job-1"));
    assert_eq!(worker.current_unit_id.as_ref().map(UnitId::as_str), Some("unit-1"));
    assert_eq!(worker.units_completed, 0);
}

#[test]
fn release_clears_unit_and_heartbeats() {
    let mut worker = WorkerProcess::assigned(JobId::new("j"), UnitId::new("u"));
    let now = Utc::now();

    worker.record_completion(1.5);
    worker.release(now);

    assert_eq!(worker.status, WorkerStatus::Idle);
    assert!(worker.current_unit_id.is_none());
    assert_eq!(worker.last_heartbeat, Some(now));
    assert_eq!(worker.units_completed, 1);
    assert!((worker.total_execution_time - 1.5).abs() < f64::EPSILON);
}

#[test]
fn failure_counter() {
    let mut worker = WorkerProcess::assigned(JobId::new("j"), UnitId::new("u"));
    worker.record_failure();
    assert_eq!(worker.units_failed, 1);
}
