// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! SQLite-backed state repository.
//!
//! The single shared surface between the detached job executor and every
//! observer (CLI, dashboards, controls). Connections are opened per
//! operation with a bounded busy wait; write-ahead logging and NORMAL
//! synchronous mode allow concurrent readers while the executor writes.
//! All writes run inside a transaction.

mod activity;
mod jobs;
mod logs;
mod schema;
mod units;
mod workers;

pub use activity::{ActiveUnit, LatestEvent};
pub use logs::LogFilter;

use drover_core::defaults;
use rusqlite::Connection;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("database error: {0}")]
    Db(#[from] rusqlite::Error),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("invalid stored row: {0}")]
    Corrupt(String),
    #[error("no home directory available for default storage path")]
    NoHomeDir,
}

impl StorageError {
    /// True when the underlying database reported lock contention.
    /// Callers are expected to retry.
    pub fn is_busy(&self) -> bool {
        matches!(
            self,
            StorageError::Db(rusqlite::Error::SqliteFailure(err, _))
                if matches!(
                    err.code,
                    rusqlite::ErrorCode::DatabaseBusy | rusqlite::ErrorCode::DatabaseLocked
                )
        )
    }
}

/// Durable store for jobs, work units, worker records, and logs.
///
/// Cheap to clone conceptually: holds only the database path. Every
/// operation opens its own connection, which is what makes the same type
/// usable from the executor process and short-lived observer processes
/// at once.
#[derive(Debug, Clone)]
pub struct Repository {
    db_path: PathBuf,
}

impl Repository {
    /// Open (and initialize) the repository at an explicit path.
    pub fn open(db_path: impl Into<PathBuf>) -> Result<Self, StorageError> {
        let db_path = db_path.into();
        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let repo = Self { db_path };
        let conn = repo.connect()?;
        schema::init(&conn)?;
        Ok(repo)
    }

    /// Open the repository at the well-known default location
    /// (`~/.drover/drover.db`).
    pub fn open_default() -> Result<Self, StorageError> {
        let home = dirs::home_dir().ok_or(StorageError::NoHomeDir)?;
        Self::open(home.join(defaults::STORAGE_DIR).join(defaults::DB_FILENAME))
    }

    pub fn db_path(&self) -> &Path {
        &self.db_path
    }

    pub(crate) fn connect(&self) -> Result<Connection, StorageError> {
        let conn = Connection::open(&self.db_path)?;
        conn.busy_timeout(Duration::from_millis(defaults::DB_BUSY_TIMEOUT_MS))?;
        conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA synchronous=NORMAL;")?;
        Ok(conn)
    }

    /// Run `f` inside a transaction that commits on success and rolls back
    /// on error.
    pub(crate) fn with_tx<T>(
        &self,
        f: impl FnOnce(&rusqlite::Transaction<'_>) -> Result<T, StorageError>,
    ) -> Result<T, StorageError> {
        let mut conn = self.connect()?;
        let tx = conn.transaction()?;
        let out = f(&tx)?;
        tx.commit()?;
        Ok(out)
    }
}

// Conversion helpers shared by the per-entity modules.

pub(crate) fn to_json_string<T: serde::Serialize>(value: &T) -> Result<String, StorageError> {
    serde_json::to_string(value).map_err(|e| StorageError::Corrupt(e.to_string()))
}

pub(crate) fn from_json_str<T: serde::de::DeserializeOwned>(
    json: &str,
) -> Result<T, StorageError> {
    serde_json::from_str(json).map_err(|e| StorageError::Corrupt(e.to_string()))
}

pub(crate) fn parse_datetime(s: &str) -> Result<chrono::DateTime<chrono::Utc>, StorageError> {
    chrono::DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&chrono::Utc))
        .map_err(|e| StorageError::Corrupt(format!("bad timestamp {s:?}: {e}")))
}

pub(crate) fn parse_opt_datetime(
    s: Option<String>,
) -> Result<Option<chrono::DateTime<chrono::Utc>>, StorageError> {
    s.as_deref().map(parse_datetime).transpose()
}

pub(crate) fn parse_status<T: std::str::FromStr<Err = drover_core::ParseStatusError>>(
    s: &str,
) -> Result<T, StorageError> {
    s.parse().map_err(|e: drover_core::ParseStatusError| StorageError::Corrupt(e.to_string()))
}
