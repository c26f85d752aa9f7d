// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Log append and query.
//!
//! Timestamps are supplied by the writer, not the database, so entries from
//! different processes order consistently with the writers' clocks.

use crate::{from_json_str, parse_datetime, parse_status, to_json_string, Repository, StorageError};
use drover_core::{defaults, JobId, LogEntry, LogLevel, UnitId, WorkerId};
use rusqlite::{params, Row};

/// Filters for [`Repository::get_logs`]. Defaults select everything,
/// newest first, first page.
#[derive(Debug, Clone)]
pub struct LogFilter {
    pub source: Option<String>,
    pub level: Option<LogLevel>,
    /// Only entries strictly after this RFC 3339 timestamp.
    pub since: Option<String>,
    pub limit: usize,
    pub offset: usize,
}

impl Default for LogFilter {
    fn default() -> Self {
        Self {
            source: None,
            level: None,
            since: None,
            limit: defaults::LOG_LIST_LIMIT,
            offset: 0,
        }
    }
}

impl Repository {
    pub fn add_log(&self, entry: &LogEntry) -> Result<(), StorageError> {
        self.with_tx(|tx| {
            tx.execute(
                "INSERT INTO logs (job_id, source, level, message, timestamp, worker_id, unit_id, extra)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
                params![
                    entry.job_id.as_str(),
                    entry.source,
                    entry.level.to_string(),
                    entry.message,
                    entry.timestamp.to_rfc3339(),
                    entry.worker_id.as_ref().map(WorkerId::as_str),
                    entry.unit_id.as_ref().map(UnitId::as_str),
                    entry.extra.as_ref().map(to_json_string).transpose()?,
                ],
            )?;
            Ok(())
        })
    }

    /// Logs for a job, newest first, with optional source/level/since
    /// filters and pagination.
    pub fn get_logs(&self, job_id: &JobId, filter: &LogFilter) -> Result<Vec<LogEntry>, StorageError> {
        let conn = self.connect()?;

        let mut sql = String::from("SELECT * FROM logs WHERE job_id = ?1");
        let mut args: Vec<Box<dyn rusqlite::ToSql>> = vec![Box::new(job_id.as_str().to_string())];

        if let Some(source) = &filter.source {
            args.push(Box::new(source.clone()));
            sql.push_str(&format!(" AND source = ?{}", args.len()));
        }
        if let Some(level) = filter.level {
            args.push(Box::new(level.to_string()));
            sql.push_str(&format!(" AND level = ?{}", args.len()));
        }
        if let Some(since) = &filter.since {
            args.push(Box::new(since.clone()));
            sql.push_str(&format!(" AND timestamp > ?{}", args.len()));
        }

        args.push(Box::new(filter.limit as i64));
        sql.push_str(&format!(" ORDER BY timestamp DESC LIMIT ?{}", args.len()));
        args.push(Box::new(filter.offset as i64));
        sql.push_str(&format!(" OFFSET ?{}", args.len()));

        let mut stmt = conn.prepare(&sql)?;
        let params: Vec<&dyn rusqlite::ToSql> = args.iter().map(AsRef::as_ref).collect();
        let raws: Vec<RawLog> =
            stmt.query_map(&params[..], RawLog::read)?.collect::<Result<_, _>>()?;
        raws.into_iter().map(RawLog::into_entry).collect()
    }

    pub fn get_log_count(&self, job_id: &JobId) -> Result<u64, StorageError> {
        let conn = self.connect()?;
        let count: u64 = conn.query_row(
            "SELECT COUNT(*) FROM logs WHERE job_id = ?1",
            params![job_id.as_str()],
            |row| row.get(0),
        )?;
        Ok(count)
    }
}

struct RawLog {
    id: i64,
    job_id: String,
    source: String,
    level: String,
    message: String,
    timestamp: String,
    worker_id: Option<String>,
    unit_id: Option<String>,
    extra: Option<String>,
}

impl RawLog {
    fn read(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get("id")?,
            job_id: row.get("job_id")?,
            source: row.get("source")?,
            level: row.get("level")?,
            message: row.get("message")?,
            timestamp: row.get("timestamp")?,
            worker_id: row.get("worker_id")?,
            unit_id: row.get("unit_id")?,
            extra: row.get("extra")?,
        })
    }

    fn into_entry(self) -> Result<LogEntry, StorageError> {
        Ok(LogEntry {
            id: Some(self.id),
            job_id: JobId::new(self.job_id),
            source: self.source,
            level: parse_status(&self.level)?,
            message: self.message,
            timestamp: parse_datetime(&self.timestamp)?,
            worker_id: self.worker_id.map(WorkerId::new),
            unit_id: self.unit_id.map(UnitId::new),
            extra: self.extra.as_deref().map(from_json_str).transpose()?,
        })
    }
}

#[cfg(test)]
#[path = "logs_tests.rs"]
mod tests;
