// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Job persistence.

use crate::{
    from_json_str, parse_datetime, parse_opt_datetime, parse_status, to_json_string, Repository,
    StorageError,
};
use drover_core::{Job, JobId, JobStatus, Metadata, UnitId};
use rusqlite::{params, OptionalExtension, Row};

impl Repository {
    pub fn create_job(&self, job: &Job) -> Result<(), StorageError> {
        self.with_tx(|tx| {
            tx.execute(
                "INSERT INTO jobs (
                    job_id, name, description, status, worker_prompt_template,
                    unit_type, total_units, completed_units, failed_units,
                    max_workers, created_at, started_at, completed_at,
                    test_unit_id, test_passed, output_strategy,
                    metadata, post_processing_prompt, post_processing_unit_id,
                    bypass_failures
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13,
                          ?14, ?15, ?16, ?17, ?18, ?19, ?20)",
                params![
                    job.job_id.as_str(),
                    job.name,
                    job.description,
                    job.status.to_string(),
                    job.worker_prompt_template,
                    job.unit_type,
                    job.total_units,
                    job.completed_units,
                    job.failed_units,
                    job.max_workers,
                    job.created_at.to_rfc3339(),
                    job.started_at.map(|t| t.to_rfc3339()),
                    job.completed_at.map(|t| t.to_rfc3339()),
                    job.test_unit_id.as_ref().map(UnitId::as_str),
                    job.test_passed,
                    job.output_strategy,
                    to_json_string(&job.metadata)?,
                    job.post_processing_prompt,
                    job.post_processing_unit_id.as_ref().map(UnitId::as_str),
                    job.bypass_failures,
                ],
            )?;
            Ok(())
        })
    }

    pub fn get_job(&self, job_id: &JobId) -> Result<Option<Job>, StorageError> {
        let conn = self.connect()?;
        let raw = conn
            .query_row("SELECT * FROM jobs WHERE job_id = ?1", params![job_id.as_str()], RawJob::read)
            .optional()?;
        raw.map(RawJob::into_job).transpose()
    }

    /// Persist the mutable fields of a job. Identity and template fields
    /// are immutable after creation.
    pub fn update_job(&self, job: &Job) -> Result<(), StorageError> {
        self.with_tx(|tx| {
            tx.execute(
                "UPDATE jobs SET
                    status = ?1, completed_units = ?2, failed_units = ?3,
                    started_at = ?4, completed_at = ?5, test_unit_id = ?6,
                    test_passed = ?7, metadata = ?8,
                    post_processing_prompt = ?9, post_processing_unit_id = ?10,
                    bypass_failures = ?11
                 WHERE job_id = ?12",
                params![
                    job.status.to_string(),
                    job.completed_units,
                    job.failed_units,
                    job.started_at.map(|t| t.to_rfc3339()),
                    job.completed_at.map(|t| t.to_rfc3339()),
                    job.test_unit_id.as_ref().map(UnitId::as_str),
                    job.test_passed,
                    to_json_string(&job.metadata)?,
                    job.post_processing_prompt,
                    job.post_processing_unit_id.as_ref().map(UnitId::as_str),
                    job.bypass_failures,
                    job.job_id.as_str(),
                ],
            )?;
            Ok(())
        })
    }

    /// Recent jobs first, optionally filtered by status.
    pub fn list_jobs(
        &self,
        limit: usize,
        status: Option<JobStatus>,
    ) -> Result<Vec<Job>, StorageError> {
        let conn = self.connect()?;
        let raws: Vec<RawJob> = match status {
            Some(status) => {
                let mut stmt = conn.prepare(
                    "SELECT * FROM jobs WHERE status = ?1 ORDER BY created_at DESC LIMIT ?2",
                )?;
                let rows = stmt.query_map(params![status.to_string(), limit], RawJob::read)?;
                rows.collect::<Result<_, _>>()?
            }
            None => {
                let mut stmt =
                    conn.prepare("SELECT * FROM jobs ORDER BY created_at DESC LIMIT ?1")?;
                let rows = stmt.query_map(params![limit], RawJob::read)?;
                rows.collect::<Result<_, _>>()?
            }
        };
        raws.into_iter().map(RawJob::into_job).collect()
    }
}

/// Raw column values, extracted before fallible conversion so rusqlite
/// errors and corrupt-row errors stay separate.
struct RawJob {
    job_id: String,
    name: String,
    description: String,
    status: String,
    worker_prompt_template: String,
    unit_type: String,
    total_units: u32,
    completed_units: u32,
    failed_units: u32,
    max_workers: u32,
    created_at: String,
    started_at: Option<String>,
    completed_at: Option<String>,
    test_unit_id: Option<String>,
    test_passed: bool,
    output_strategy: String,
    metadata: Option<String>,
    post_processing_prompt: Option<String>,
    post_processing_unit_id: Option<String>,
    bypass_failures: bool,
}

impl RawJob {
    fn read(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            job_id: row.get("job_id")?,
            name: row.get("name")?,
            description: row.get("description")?,
            status: row.get("status")?,
            worker_prompt_template: row.get("worker_prompt_template")?,
            unit_type: row.get("unit_type")?,
            total_units: row.get("total_units")?,
            completed_units: row.get("completed_units")?,
            failed_units: row.get("failed_units")?,
            max_workers: row.get("max_workers")?,
            created_at: row.get("created_at")?,
            started_at: row.get("started_at")?,
            completed_at: row.get("completed_at")?,
            test_unit_id: row.get("test_unit_id")?,
            test_passed: row.get("test_passed")?,
            output_strategy: row.get("output_strategy")?,
            metadata: row.get("metadata")?,
            post_processing_prompt: row.get("post_processing_prompt")?,
            post_processing_unit_id: row.get("post_processing_unit_id")?,
            bypass_failures: row.get("bypass_failures")?,
        })
    }

    fn into_job(self) -> Result<Job, StorageError> {
        Ok(Job {
            job_id: JobId::new(self.job_id),
            name: self.name,
            description: self.description,
            status: parse_status(&self.status)?,
            worker_prompt_template: self.worker_prompt_template,
            unit_type: self.unit_type,
            total_units: self.total_units,
            completed_units: self.completed_units,
            failed_units: self.failed_units,
            max_workers: self.max_workers,
            created_at: parse_datetime(&self.created_at)?,
            started_at: parse_opt_datetime(self.started_at)?,
            completed_at: parse_opt_datetime(self.completed_at)?,
            test_unit_id: self.test_unit_id.map(UnitId::new),
            test_passed: self.test_passed,
            output_strategy: self.output_strategy,
            metadata: match self.metadata.as_deref() {
                Some(json) => from_json_str::<Metadata>(json)?,
                None => Metadata::new(),
            },
            post_processing_prompt: self.post_processing_prompt,
            post_processing_unit_id: self.post_processing_unit_id.map(UnitId::new),
            bypass_failures: self.bypass_failures,
        })
    }
}

#[cfg(test)]
#[path = "jobs_tests.rs"]
mod tests;
