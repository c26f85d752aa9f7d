// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Work unit persistence, recovery resets, and streaming appends.

use crate::{
    from_json_str, parse_datetime, parse_opt_datetime, parse_status, to_json_string, Repository,
    StorageError,
};
use drover_core::{JobId, UnitId, WorkUnit, WorkUnitStatus, WorkerId};
use rusqlite::{params, OptionalExtension, Row};
use serde_json::Value;
use std::collections::HashMap;

impl Repository {
    pub fn create_work_unit(&self, unit: &WorkUnit) -> Result<(), StorageError> {
        self.with_tx(|tx| {
            tx.execute(
                "INSERT INTO work_units (
                    unit_id, job_id, unit_type, status, payload,
                    created_at, assigned_at, started_at, completed_at,
                    worker_id, result, error, retry_count, max_retries,
                    execution_time_seconds, output_files,
                    rendered_prompt, conversation, session_id, cost_usd, process_id
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13,
                          ?14, ?15, ?16, ?17, ?18, ?19, ?20, ?21)",
                params![
                    unit.unit_id.as_str(),
                    unit.job_id.as_str(),
                    unit.unit_type,
                    unit.status.to_string(),
                    to_json_string(&unit.payload)?,
                    unit.created_at.to_rfc3339(),
                    unit.assigned_at.map(|t| t.to_rfc3339()),
                    unit.started_at.map(|t| t.to_rfc3339()),
                    unit.completed_at.map(|t| t.to_rfc3339()),
                    unit.worker_id.as_ref().map(WorkerId::as_str),
                    unit.result.as_ref().map(to_json_string).transpose()?,
                    unit.error,
                    unit.retry_count,
                    unit.max_retries,
                    unit.execution_time_seconds,
                    to_json_string(&unit.output_files)?,
                    unit.rendered_prompt,
                    unit.conversation.as_ref().map(to_json_string).transpose()?,
                    unit.session_id,
                    unit.cost_usd,
                    unit.process_id,
                ],
            )?;
            Ok(())
        })
    }

    pub fn get_work_unit(&self, unit_id: &UnitId) -> Result<Option<WorkUnit>, StorageError> {
        let conn = self.connect()?;
        let raw = conn
            .query_row(
                "SELECT * FROM work_units WHERE unit_id = ?1",
                params![unit_id.as_str()],
                RawUnit::read,
            )
            .optional()?;
        raw.map(RawUnit::into_unit).transpose()
    }

    /// Persist the mutable fields of a unit. `payload` and `created_at`
    /// are immutable after creation.
    pub fn update_work_unit(&self, unit: &WorkUnit) -> Result<(), StorageError> {
        self.with_tx(|tx| {
            tx.execute(
                "UPDATE work_units SET
                    status = ?1, assigned_at = ?2, started_at = ?3, completed_at = ?4,
                    worker_id = ?5, result = ?6, error = ?7, retry_count = ?8,
                    execution_time_seconds = ?9, output_files = ?10,
                    rendered_prompt = ?11, conversation = ?12, session_id = ?13,
                    cost_usd = ?14, process_id = ?15
                 WHERE unit_id = ?16",
                params![
                    unit.status.to_string(),
                    unit.assigned_at.map(|t| t.to_rfc3339()),
                    unit.started_at.map(|t| t.to_rfc3339()),
                    unit.completed_at.map(|t| t.to_rfc3339()),
                    unit.worker_id.as_ref().map(WorkerId::as_str),
                    unit.result.as_ref().map(to_json_string).transpose()?,
                    unit.error,
                    unit.retry_count,
                    unit.execution_time_seconds,
                    to_json_string(&unit.output_files)?,
                    unit.rendered_prompt,
                    unit.conversation.as_ref().map(to_json_string).transpose()?,
                    unit.session_id,
                    unit.cost_usd,
                    unit.process_id,
                    unit.unit_id.as_str(),
                ],
            )?;
            Ok(())
        })
    }

    /// Oldest pending units first, up to `limit`.
    pub fn get_pending_units(
        &self,
        job_id: &JobId,
        limit: usize,
    ) -> Result<Vec<WorkUnit>, StorageError> {
        let conn = self.connect()?;
        let mut stmt = conn.prepare(
            "SELECT * FROM work_units
             WHERE job_id = ?1 AND status = ?2
             ORDER BY created_at
             LIMIT ?3",
        )?;
        let raws: Vec<RawUnit> = stmt
            .query_map(
                params![job_id.as_str(), WorkUnitStatus::Pending.to_string(), limit],
                RawUnit::read,
            )?
            .collect::<Result<_, _>>()?;
        raws.into_iter().map(RawUnit::into_unit).collect()
    }

    /// Units for a job with pagination, optionally filtered by status.
    pub fn get_units_for_job(
        &self,
        job_id: &JobId,
        status: Option<WorkUnitStatus>,
        limit: usize,
        offset: usize,
    ) -> Result<Vec<WorkUnit>, StorageError> {
        let conn = self.connect()?;
        let raws: Vec<RawUnit> = match status {
            Some(status) => {
                let mut stmt = conn.prepare(
                    "SELECT * FROM work_units
                     WHERE job_id = ?1 AND status = ?2
                     ORDER BY created_at
                     LIMIT ?3 OFFSET ?4",
                )?;
                let rows = stmt.query_map(
                    params![job_id.as_str(), status.to_string(), limit, offset],
                    RawUnit::read,
                )?;
                rows.collect::<Result<_, _>>()?
            }
            None => {
                let mut stmt = conn.prepare(
                    "SELECT * FROM work_units
                     WHERE job_id = ?1
                     ORDER BY created_at
                     LIMIT ?2 OFFSET ?3",
                )?;
                let rows = stmt.query_map(params![job_id.as_str(), limit, offset], RawUnit::read)?;
                rows.collect::<Result<_, _>>()?
            }
        };
        raws.into_iter().map(RawUnit::into_unit).collect()
    }

    pub fn count_units_by_status(
        &self,
        job_id: &JobId,
    ) -> Result<HashMap<String, u32>, StorageError> {
        let conn = self.connect()?;
        let mut stmt = conn.prepare(
            "SELECT status, COUNT(*) FROM work_units WHERE job_id = ?1 GROUP BY status",
        )?;
        let counts = stmt
            .query_map(params![job_id.as_str()], |row| {
                Ok((row.get::<_, String>(0)?, row.get::<_, u32>(1)?))
            })?
            .collect::<Result<HashMap<_, _>, _>>()?;
        Ok(counts)
    }

    /// Return every `assigned`/`processing` unit to `pending`, clearing
    /// assignment fields. Idempotent; run on executor start to recover
    /// from a crashed run. Returns the number of rows changed.
    pub fn reset_stuck_units(&self, job_id: &JobId) -> Result<usize, StorageError> {
        self.with_tx(|tx| {
            let changed = tx.execute(
                "UPDATE work_units
                 SET status = ?1, worker_id = NULL, assigned_at = NULL, started_at = NULL
                 WHERE job_id = ?2 AND status IN (?3, ?4)",
                params![
                    WorkUnitStatus::Pending.to_string(),
                    job_id.as_str(),
                    WorkUnitStatus::Assigned.to_string(),
                    WorkUnitStatus::Processing.to_string(),
                ],
            )?;
            Ok(changed)
        })
    }

    /// Append one event to a unit's conversation inside a single
    /// transaction. Returns `Ok(false)` when the unit does not exist.
    pub fn append_conversation_event(
        &self,
        unit_id: &UnitId,
        event: &Value,
    ) -> Result<bool, StorageError> {
        self.with_tx(|tx| {
            let stored: Option<Option<String>> = tx
                .query_row(
                    "SELECT conversation FROM work_units WHERE unit_id = ?1",
                    params![unit_id.as_str()],
                    |row| row.get(0),
                )
                .optional()?;

            let Some(stored) = stored else {
                return Ok(false);
            };

            let mut events: Vec<Value> = match stored.as_deref() {
                Some(json) => from_json_str(json)?,
                None => Vec::new(),
            };
            events.push(event.clone());

            tx.execute(
                "UPDATE work_units SET conversation = ?1 WHERE unit_id = ?2",
                params![to_json_string(&events)?, unit_id.as_str()],
            )?;
            Ok(true)
        })
    }

    /// Targeted update that leaves every other field untouched.
    pub fn set_work_unit_session_id(
        &self,
        unit_id: &UnitId,
        session_id: &str,
    ) -> Result<(), StorageError> {
        self.with_tx(|tx| {
            tx.execute(
                "UPDATE work_units SET session_id = ?1 WHERE unit_id = ?2",
                params![session_id, unit_id.as_str()],
            )?;
            Ok(())
        })
    }

    /// Targeted update that leaves every other field untouched.
    /// Pass `None` to clear the pid once the subprocess is gone.
    pub fn set_work_unit_process_id(
        &self,
        unit_id: &UnitId,
        process_id: Option<i32>,
    ) -> Result<(), StorageError> {
        self.with_tx(|tx| {
            tx.execute(
                "UPDATE work_units SET process_id = ?1 WHERE unit_id = ?2",
                params![process_id, unit_id.as_str()],
            )?;
            Ok(())
        })
    }

    /// Sum of recorded per-unit costs, or `None` when nothing was recorded.
    pub fn get_job_total_cost(&self, job_id: &JobId) -> Result<Option<f64>, StorageError> {
        let conn = self.connect()?;
        let total: Option<f64> = conn.query_row(
            "SELECT SUM(cost_usd) FROM work_units WHERE job_id = ?1 AND cost_usd IS NOT NULL",
            params![job_id.as_str()],
            |row| row.get(0),
        )?;
        Ok(total)
    }
}

struct RawUnit {
    unit_id: String,
    job_id: String,
    unit_type: String,
    status: String,
    payload: String,
    created_at: String,
    assigned_at: Option<String>,
    started_at: Option<String>,
    completed_at: Option<String>,
    worker_id: Option<String>,
    result: Option<String>,
    error: Option<String>,
    retry_count: u32,
    max_retries: u32,
    execution_time_seconds: Option<f64>,
    output_files: Option<String>,
    rendered_prompt: Option<String>,
    conversation: Option<String>,
    session_id: Option<String>,
    cost_usd: Option<f64>,
    process_id: Option<i32>,
}

impl RawUnit {
    fn read(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            unit_id: row.get("unit_id")?,
            job_id: row.get("job_id")?,
            unit_type: row.get("unit_type")?,
            status: row.get("status")?,
            payload: row.get("payload")?,
            created_at: row.get("created_at")?,
            assigned_at: row.get("assigned_at")?,
            started_at: row.get("started_at")?,
            completed_at: row.get("completed_at")?,
            worker_id: row.get("worker_id")?,
            result: row.get("result")?,
            error: row.get("error")?,
            retry_count: row.get("retry_count")?,
            max_retries: row.get("max_retries")?,
            execution_time_seconds: row.get("execution_time_seconds")?,
            output_files: row.get("output_files")?,
            rendered_prompt: row.get("rendered_prompt")?,
            conversation: row.get("conversation")?,
            session_id: row.get("session_id")?,
            cost_usd: row.get("cost_usd")?,
            process_id: row.get("process_id")?,
        })
    }

    fn into_unit(self) -> Result<WorkUnit, StorageError> {
        Ok(WorkUnit {
            unit_id: UnitId::new(self.unit_id),
            job_id: JobId::new(self.job_id),
            unit_type: self.unit_type,
            status: parse_status(&self.status)?,
            payload: from_json_str(&self.payload)?,
            created_at: parse_datetime(&self.created_at)?,
            assigned_at: parse_opt_datetime(self.assigned_at)?,
            started_at: parse_opt_datetime(self.started_at)?,
            completed_at: parse_opt_datetime(self.completed_at)?,
            worker_id: self.worker_id.map(WorkerId::new),
            result: self.result.as_deref().map(from_json_str).transpose()?,
            error: self.error,
            retry_count: self.retry_count,
            max_retries: self.max_retries,
            execution_time_seconds: self.execution_time_seconds,
            output_files: match self.output_files.as_deref() {
                Some(json) => from_json_str(json)?,
                None => Vec::new(),
            },
            rendered_prompt: self.rendered_prompt,
            conversation: self.conversation.as_deref().map(from_json_str).transpose()?,
            session_id: self.session_id,
            cost_usd: self.cost_usd,
            process_id: self.process_id,
        })
    }
}

#[cfg(test)]
#[path = "units_tests.rs"]
mod tests;
