// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use crate::{LogFilter, Repository};
use drover_core::{JobId, LogEntry, LogLevel, UnitId};
use serde_json::json;
use tempfile::TempDir;

fn test_repo() -> (TempDir, Repository) {
    let dir = TempDir::new().unwrap();
    let repo = Repository::open(dir.path().join("state.db")).unwrap();
    (dir, repo)
}

#[test]
fn log_round_trips_with_correlation() {
    let (_dir, repo) = test_repo();
    let job = JobId::new("job-1");

    let entry = LogEntry::new(job.clone(), "worker", LogLevel::Info, "unit started")
        .unit_id(UnitId::new("unit-1"))
        .extra(json!({"payload_keys": ["i"]}));
    repo.add_log(&entry).unwrap();

    let logs = repo.get_logs(&job, &LogFilter::default()).unwrap();
    assert_eq!(logs.len(), 1);
    let loaded = &logs[0];
    assert!(loaded.id.is_some());
    assert_eq!(loaded.source, "worker");
    assert_eq!(loaded.level, LogLevel::Info);
    assert_eq!(loaded.message, "unit started");
    assert_eq!(loaded.unit_id.as_ref().map(UnitId::as_str), Some("unit-1"));
    assert_eq!(loaded.extra, Some(json!({"payload_keys": ["i"]})));
}

#[test]
fn filters_by_source_level_and_since() {
    let (_dir, repo) = test_repo();
    let job = JobId::new("job-1");

    let early = LogEntry::new(job.clone(), "executor", LogLevel::Info, "started");
    let cutoff = early.timestamp.to_rfc3339();
    repo.add_log(&early).unwrap();

    let mut late = LogEntry::new(job.clone(), "pool", LogLevel::Error, "unit failed");
    late.timestamp = early.timestamp + chrono::Duration::seconds(5);
    repo.add_log(&late).unwrap();

    let by_source = repo
        .get_logs(&job, &LogFilter { source: Some("pool".into()), ..Default::default() })
        .unwrap();
    assert_eq!(by_source.len(), 1);
    assert_eq!(by_source[0].message, "unit failed");

    let by_level = repo
        .get_logs(&job, &LogFilter { level: Some(LogLevel::Info), ..Default::default() })
        .unwrap();
    assert_eq!(by_level.len(), 1);
    assert_eq!(by_level[0].message, "started");

    let since = repo
        .get_logs(&job, &LogFilter { since: Some(cutoff), ..Default::default() })
        .unwrap();
    assert_eq!(since.len(), 1);
    assert_eq!(since[0].message, "unit failed");
}

#[test]
fn newest_first_with_pagination() {
    let (_dir, repo) = test_repo();
    let job = JobId::new("job-1");

    let base = chrono::Utc::now();
    for i in 0..5i64 {
        let mut entry =
            LogEntry::new(job.clone(), "executor", LogLevel::Debug, format!("msg {i}"));
        entry.timestamp = base + chrono::Duration::seconds(i);
        repo.add_log(&entry).unwrap();
    }

    let page = repo
        .get_logs(&job, &LogFilter { limit: 2, offset: 1, ..Default::default() })
        .unwrap();
    assert_eq!(page.len(), 2);
    assert_eq!(page[0].message, "msg 3");
    assert_eq!(page[1].message, "msg 2");

    assert_eq!(repo.get_log_count(&job).unwrap(), 5);
}
