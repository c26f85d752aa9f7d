// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::Repository;
use tempfile::TempDir;

#[test]
fn init_is_idempotent() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("state.db");

    Repository::open(&path).unwrap();
    // Second open re-runs init + migrate against the existing file.
    Repository::open(&path).unwrap();
}

#[test]
fn migration_adds_missing_columns() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("state.db");

    // Simulate a database created by an older binary: the streaming and
    // post-processing columns do not exist yet.
    {
        let conn = rusqlite::Connection::open(&path).unwrap();
        conn.execute_batch(
            "CREATE TABLE jobs (
                job_id TEXT PRIMARY KEY,
                name TEXT NOT NULL,
                description TEXT NOT NULL,
                status TEXT NOT NULL,
                worker_prompt_template TEXT NOT NULL,
                unit_type TEXT NOT NULL,
                total_units INTEGER NOT NULL,
                completed_units INTEGER DEFAULT 0,
                failed_units INTEGER DEFAULT 0,
                max_workers INTEGER DEFAULT 4,
                created_at TEXT NOT NULL,
                started_at TEXT,
                completed_at TEXT,
                test_unit_id TEXT,
                test_passed INTEGER DEFAULT 0,
                output_strategy TEXT DEFAULT 'individual',
                metadata TEXT
            );
            CREATE TABLE work_units (
                unit_id TEXT PRIMARY KEY,
                job_id TEXT NOT NULL,
                unit_type TEXT NOT NULL,
                status TEXT NOT NULL,
                payload TEXT NOT NULL,
                created_at TEXT NOT NULL,
                assigned_at TEXT,
                started_at TEXT,
                completed_at TEXT,
                worker_id TEXT,
                result TEXT,
                error TEXT,
                retry_count INTEGER DEFAULT 0,
                max_retries INTEGER DEFAULT 3,
                execution_time_seconds REAL,
                output_files TEXT
            );",
        )
        .unwrap();
    }

    let repo = Repository::open(&path).unwrap();
    let conn = repo.connect().unwrap();

    let unit_cols = existing_columns(&conn, "work_units").unwrap();
    for col in ["rendered_prompt", "conversation", "session_id", "cost_usd", "process_id"] {
        assert!(unit_cols.contains(col), "missing column {col}");
    }

    let job_cols = existing_columns(&conn, "jobs").unwrap();
    for col in ["post_processing_prompt", "post_processing_unit_id", "bypass_failures"] {
        assert!(job_cols.contains(col), "missing column {col}");
    }
}
