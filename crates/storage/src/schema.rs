// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Schema creation and additive migration.
//!
//! Migration only ever adds columns. Old readers must keep working against
//! a newer file, so nothing is dropped or rewritten.

use crate::StorageError;
use rusqlite::Connection;
use std::collections::HashSet;

pub(crate) fn init(conn: &Connection) -> Result<(), StorageError> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS jobs (
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

        CREATE TABLE IF NOT EXISTS work_units (
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
            output_files TEXT,
            FOREIGN KEY (job_id) REFERENCES jobs(job_id)
        );

        CREATE TABLE IF NOT EXISTS workers (
            worker_id TEXT PRIMARY KEY,
            status TEXT NOT NULL,
            job_id TEXT,
            current_unit_id TEXT,
            process_id INTEGER,
            started_at TEXT NOT NULL,
            last_heartbeat TEXT,
            units_completed INTEGER DEFAULT 0,
            units_failed INTEGER DEFAULT 0,
            total_execution_time REAL DEFAULT 0.0
        );

        CREATE TABLE IF NOT EXISTS logs (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            job_id TEXT NOT NULL,
            source TEXT NOT NULL,
            level TEXT NOT NULL,
            message TEXT NOT NULL,
            timestamp TEXT NOT NULL,
            worker_id TEXT,
            unit_id TEXT,
            extra TEXT,
            FOREIGN KEY (job_id) REFERENCES jobs(job_id)
        );

        CREATE INDEX IF NOT EXISTS idx_work_units_job_id ON work_units(job_id);
        CREATE INDEX IF NOT EXISTS idx_work_units_status ON work_units(status);
        CREATE INDEX IF NOT EXISTS idx_work_units_worker_id ON work_units(worker_id);
        CREATE INDEX IF NOT EXISTS idx_workers_job_id ON workers(job_id);
        CREATE INDEX IF NOT EXISTS idx_logs_job_id ON logs(job_id);
        CREATE INDEX IF NOT EXISTS idx_logs_timestamp ON logs(timestamp);
        ",
    )?;

    migrate(conn)
}

/// Columns added after the initial schema shipped. Databases created by an
/// older binary gain them on open.
fn migrate(conn: &Connection) -> Result<(), StorageError> {
    let unit_columns = [
        ("rendered_prompt", "TEXT"),
        ("conversation", "TEXT"),
        ("session_id", "TEXT"),
        ("cost_usd", "REAL"),
        ("process_id", "INTEGER"),
    ];
    add_missing_columns(conn, "work_units", &unit_columns)?;

    let job_columns = [
        ("post_processing_prompt", "TEXT"),
        ("post_processing_unit_id", "TEXT"),
        ("bypass_failures", "INTEGER DEFAULT 0"),
    ];
    add_missing_columns(conn, "jobs", &job_columns)?;

    Ok(())
}

fn add_missing_columns(
    conn: &Connection,
    table: &str,
    columns: &[(&str, &str)],
) -> Result<(), StorageError> {
    let existing = existing_columns(conn, table)?;
    for (name, col_type) in columns {
        if !existing.contains(*name) {
            tracing::debug!(table, column = name, "adding missing column");
            conn.execute_batch(&format!("ALTER TABLE {table} ADD COLUMN {name} {col_type}"))?;
        }
    }
    Ok(())
}

fn existing_columns(conn: &Connection, table: &str) -> Result<HashSet<String>, StorageError> {
    let mut stmt = conn.prepare(&format!("PRAGMA table_info({table})"))?;
    let names = stmt
        .query_map([], |row| row.get::<_, String>(1))?
        .collect::<Result<HashSet<_>, _>>()?;
    Ok(names)
}

#[cfg(test)]
#[path = "schema_tests.rs"]
mod tests;
