// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Worker record persistence.

use crate::{parse_datetime, parse_opt_datetime, parse_status, Repository, StorageError};
use drover_core::{JobId, UnitId, WorkerId, WorkerProcess, WorkerStatus};
use rusqlite::{params, Row};

impl Repository {
    pub fn create_worker(&self, worker: &WorkerProcess) -> Result<(), StorageError> {
        self.with_tx(|tx| {
            tx.execute(
                "INSERT INTO workers (
                    worker_id, status, job_id, current_unit_id,
                    process_id, started_at, last_heartbeat,
                    units_completed, units_failed, total_execution_time
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
                params![
                    worker.worker_id.as_str(),
                    worker.status.to_string(),
                    worker.job_id.as_ref().map(JobId::as_str),
                    worker.current_unit_id.as_ref().map(UnitId::as_str),
                    worker.process_id,
                    worker.started_at.to_rfc3339(),
                    worker.last_heartbeat.map(|t| t.to_rfc3339()),
                    worker.units_completed,
                    worker.units_failed,
                    worker.total_execution_time,
                ],
            )?;
            Ok(())
        })
    }

    pub fn update_worker(&self, worker: &WorkerProcess) -> Result<(), StorageError> {
        self.with_tx(|tx| {
            tx.execute(
                "UPDATE workers SET
                    status = ?1, job_id = ?2, current_unit_id = ?3,
                    last_heartbeat = ?4, units_completed = ?5,
                    units_failed = ?6, total_execution_time = ?7
                 WHERE worker_id = ?8",
                params![
                    worker.status.to_string(),
                    worker.job_id.as_ref().map(JobId::as_str),
                    worker.current_unit_id.as_ref().map(UnitId::as_str),
                    worker.last_heartbeat.map(|t| t.to_rfc3339()),
                    worker.units_completed,
                    worker.units_failed,
                    worker.total_execution_time,
                    worker.worker_id.as_str(),
                ],
            )?;
            Ok(())
        })
    }

    /// Workers still `idle` or `busy` for a job.
    pub fn get_active_workers(&self, job_id: &JobId) -> Result<Vec<WorkerProcess>, StorageError> {
        self.workers_with_status(
            job_id,
            &[WorkerStatus::Idle.to_string(), WorkerStatus::Busy.to_string()],
        )
    }

    /// Workers currently processing a unit.
    pub fn get_busy_workers(&self, job_id: &JobId) -> Result<Vec<WorkerProcess>, StorageError> {
        self.workers_with_status(job_id, &[WorkerStatus::Busy.to_string()])
    }

    /// Mark every `busy`/`idle` worker of the job as `terminated`.
    /// Idempotent; run on executor start to clear records left behind by a
    /// crashed run. Returns the number of rows changed.
    pub fn cleanup_stale_workers(&self, job_id: &JobId) -> Result<usize, StorageError> {
        self.with_tx(|tx| {
            let changed = tx.execute(
                "UPDATE workers SET status = ?1 WHERE job_id = ?2 AND status IN (?3, ?4)",
                params![
                    WorkerStatus::Terminated.to_string(),
                    job_id.as_str(),
                    WorkerStatus::Busy.to_string(),
                    WorkerStatus::Idle.to_string(),
                ],
            )?;
            Ok(changed)
        })
    }

    fn workers_with_status(
        &self,
        job_id: &JobId,
        statuses: &[String],
    ) -> Result<Vec<WorkerProcess>, StorageError> {
        let conn = self.connect()?;
        let placeholders =
            (0..statuses.len()).map(|i| format!("?{}", i + 2)).collect::<Vec<_>>().join(", ");
        let mut stmt = conn.prepare(&format!(
            "SELECT * FROM workers WHERE job_id = ?1 AND status IN ({placeholders})"
        ))?;

        let mut args: Vec<&dyn rusqlite::ToSql> = vec![&job_id.0];
        for s in statuses {
            args.push(s);
        }

        let raws: Vec<RawWorker> =
            stmt.query_map(&args[..], RawWorker::read)?.collect::<Result<_, _>>()?;
        raws.into_iter().map(RawWorker::into_worker).collect()
    }
}

struct RawWorker {
    worker_id: String,
    status: String,
    job_id: Option<String>,
    current_unit_id: Option<String>,
    process_id: Option<i32>,
    started_at: String,
    last_heartbeat: Option<String>,
    units_completed: u32,
    units_failed: u32,
    total_execution_time: f64,
}

impl RawWorker {
    fn read(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            worker_id: row.get("worker_id")?,
            status: row.get("status")?,
            job_id: row.get("job_id")?,
            current_unit_id: row.get("current_unit_id")?,
            process_id: row.get("process_id")?,
            started_at: row.get("started_at")?,
            last_heartbeat: row.get("last_heartbeat")?,
            units_completed: row.get("units_completed")?,
            units_failed: row.get("units_failed")?,
            total_execution_time: row.get("total_execution_time")?,
        })
    }

    fn into_worker(self) -> Result<WorkerProcess, StorageError> {
        Ok(WorkerProcess {
            worker_id: WorkerId::new(self.worker_id),
            status: parse_status(&self.status)?,
            job_id: self.job_id.map(JobId::new),
            current_unit_id: self.current_unit_id.map(UnitId::new),
            process_id: self.process_id,
            started_at: parse_datetime(&self.started_at)?,
            last_heartbeat: parse_opt_datetime(self.last_heartbeat)?,
            units_completed: self.units_completed,
            units_failed: self.units_failed,
            total_execution_time: self.total_execution_time,
        })
    }
}

#[cfg(test)]
#[path = "workers_tests.rs"]
mod tests;
