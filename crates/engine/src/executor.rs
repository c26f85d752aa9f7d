// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Job executor: drives one job from recovery to its final status.
//!
//! Runs inside the detached executor process. The loop is deliberately
//! simple: recover stuck state, mark the job running, feed pending units
//! to the pool until none remain, drain, optionally run the synthesis
//! unit, then decide the final status from the counters and exit.

use crate::driver::Driver;
use crate::error::EngineError;
use crate::logger::JobLogger;
use crate::pool::{UnitCallback, WorkerPool};
use chrono::Utc;
use drover_core::{Job, JobId, JobStatus, WorkUnit, WorkUnitStatus, POST_PROCESSING_TYPE};
use drover_storage::Repository;
use serde_json::{json, Map, Value};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

const IDLE_POLL: Duration = Duration::from_secs(1);
const SLOT_WAIT: Duration = Duration::from_secs(1);

pub struct JobExecutor {
    job_id: JobId,
    repository: Repository,
    driver: Arc<dyn Driver>,
    unit_timeout: Duration,
}

impl JobExecutor {
    pub fn new(
        job_id: JobId,
        repository: Repository,
        driver: Arc<dyn Driver>,
        unit_timeout: Duration,
    ) -> Self {
        Self { job_id, repository, driver, unit_timeout }
    }

    /// Run the job to completion. Any failure is recorded on the job
    /// (`status = failed`, `metadata.executor_error*`) before the error
    /// propagates to the process exit code.
    pub async fn run(&self, should_stop: Arc<AtomicBool>) -> Result<(), EngineError> {
        let logger = JobLogger::new(self.repository.clone(), self.job_id.clone(), "executor");

        match self.run_inner(&logger, should_stop).await {
            Ok(()) => Ok(()),
            Err(e) => {
                logger.error(format!("job executor crashed: {e}"));
                if let Ok(Some(mut job)) = self.repository.get_job(&self.job_id) {
                    job.status = JobStatus::Failed;
                    job.record_executor_error(&e.to_string(), Utc::now());
                    if let Err(persist) = self.repository.update_job(&job) {
                        tracing::error!(error = %persist, "failed to record executor crash");
                    }
                }
                Err(e)
            }
        }
    }

    async fn run_inner(
        &self,
        logger: &JobLogger,
        should_stop: Arc<AtomicBool>,
    ) -> Result<(), EngineError> {
        logger.info(format!("job executor process started (pid: {})", std::process::id()));

        let Some(mut job) = self.repository.get_job(&self.job_id)? else {
            logger.error(format!("job {} not found in database", self.job_id));
            return Ok(());
        };

        logger.info(format!(
            "starting job '{}' with {} units, max_workers={}",
            job.name, job.total_units, job.max_workers
        ));

        // Recovery: idempotent reset of anything a previous crashed run
        // left behind.
        let stale_workers = self.repository.cleanup_stale_workers(&self.job_id)?;
        let stuck_units = self.repository.reset_stuck_units(&self.job_id)?;
        if stale_workers > 0 || stuck_units > 0 {
            logger.info(format!(
                "cleaned up {stale_workers} stale workers and reset {stuck_units} stuck units from previous run"
            ));
        }

        job.status = JobStatus::Running;
        job.started_at = Some(Utc::now());
        self.repository.update_job(&job)?;

        let pool = WorkerPool::new(
            self.job_id.clone(),
            Arc::clone(&self.driver),
            self.repository.clone(),
            job.max_workers,
            self.unit_timeout,
            Some(self.on_unit_complete()),
            Some(self.on_unit_failed()),
        );
        pool.start();
        logger.info(format!("worker pool started with {} max workers", job.max_workers));

        let outcome = self.dispatch_and_post(&job, &pool, logger, should_stop).await;
        pool.stop().await;
        logger.info("worker pool stopped");
        outcome?;

        // Final status from fresh counters.
        if let Some(mut job) = self.repository.get_job(&self.job_id)? {
            let post_unit = match &job.post_processing_unit_id {
                Some(id) => self.repository.get_work_unit(id)?,
                None => None,
            };
            let status = determine_final_status(&job, post_unit.as_ref());
            log_final_status(logger, &job, status);
            job.status = status;
            job.completed_at = Some(Utc::now());
            job.record_executor_completed(Utc::now());
            self.repository.update_job(&job)?;
        }

        Ok(())
    }

    async fn dispatch_and_post(
        &self,
        job: &Job,
        pool: &WorkerPool,
        logger: &JobLogger,
        should_stop: Arc<AtomicBool>,
    ) -> Result<(), EngineError> {
        let mut units_submitted: u64 = 0;

        while !should_stop.load(Ordering::SeqCst) {
            let pending =
                self.repository.get_pending_units(&self.job_id, job.max_workers as usize)?;

            if pending.is_empty() {
                if pool.active_worker_count() == 0 {
                    logger.info("no more pending units and no active workers, processing complete");
                    break;
                }
                tokio::time::sleep(IDLE_POLL).await;
                continue;
            }

            for unit in pending {
                if should_stop.load(Ordering::SeqCst) {
                    break;
                }
                while !pool.wait_for_available_slot(SLOT_WAIT).await {
                    if should_stop.load(Ordering::SeqCst) {
                        break;
                    }
                }
                if should_stop.load(Ordering::SeqCst) {
                    break;
                }

                let unit_id = unit.unit_id.clone();
                if pool.submit(unit, &job.worker_prompt_template)? {
                    units_submitted += 1;
                    logger.with().unit(&unit_id).debug(format!(
                        "submitted unit {} ({units_submitted} total)",
                        unit_id.short(8)
                    ));
                }
            }
        }

        logger.info("waiting for remaining workers to complete");
        pool.wait_for_completion().await;

        if let Some(job) = self.repository.get_job(&self.job_id)? {
            let all_units_done = job.completed_units + job.failed_units == job.total_units;
            let all_succeeded = job.completed_units == job.total_units;
            let should_post = job.post_processing_prompt.is_some()
                && (all_succeeded || (job.bypass_failures && all_units_done));

            if should_post {
                if job.bypass_failures && !all_succeeded {
                    logger.info(format!(
                        "bypass failures enabled, running post-processing despite {} failed units",
                        job.failed_units
                    ));
                } else {
                    logger.info(format!(
                        "all {} units completed successfully, starting post-processing",
                        job.total_units
                    ));
                }
                self.run_post_processing(job, pool, logger).await?;
            }
        }

        Ok(())
    }

    /// Synthesis step: one synthetic unit carrying aggregate context,
    /// executed through the same pool.
    async fn run_post_processing(
        &self,
        mut job: Job,
        pool: &WorkerPool,
        logger: &JobLogger,
    ) -> Result<(), EngineError> {
        let Some(post_prompt) = job.post_processing_prompt.clone() else {
            return Ok(());
        };

        job.status = JobStatus::PostProcessing;
        self.repository.update_job(&job)?;

        let mut payload = Map::new();
        payload.insert("type".into(), json!(POST_PROCESSING_TYPE));
        payload.insert("total_units_processed".into(), json!(job.total_units));
        payload.insert("completed_units".into(), json!(job.completed_units));
        payload.insert("job_name".into(), json!(job.name));
        payload.insert("job_description".into(), json!(job.description));
        for (meta_key, payload_key) in [
            ("post_processing_name", "name"),
            ("post_processing_working_directory", "working_directory"),
            ("post_processing_output_directory", "output_directory"),
        ] {
            if let Some(v) = job.meta_str(meta_key) {
                payload.insert(payload_key.into(), json!(v));
            }
        }

        let post_unit =
            WorkUnit::new(self.job_id.clone(), POST_PROCESSING_TYPE, Value::Object(payload))
                .max_retries(job.post_processing_max_retries());
        let post_unit_id = post_unit.unit_id.clone();
        self.repository.create_work_unit(&post_unit)?;

        job.post_processing_unit_id = Some(post_unit_id.clone());
        self.repository.update_job(&job)?;

        logger
            .with()
            .unit(&post_unit_id)
            .info(format!("created post-processing unit {}", post_unit_id.short(8)));

        pool.start();
        while !pool.submit(post_unit.clone(), &post_prompt)? {
            pool.wait_for_available_slot(SLOT_WAIT).await;
        }

        logger.info("waiting for post-processing to complete");
        pool.wait_for_completion().await;

        match self.repository.get_work_unit(&post_unit_id)? {
            Some(unit) if unit.status == WorkUnitStatus::Completed => {
                logger.info("post-processing completed successfully");
            }
            Some(unit) if unit.status == WorkUnitStatus::Failed => {
                logger.error(format!(
                    "post-processing failed: {}",
                    unit.error.as_deref().unwrap_or("unknown error")
                ));
            }
            Some(unit) => {
                logger.warning(format!("post-processing ended with status: {}", unit.status));
            }
            None => logger.warning("post-processing unit disappeared"),
        }

        Ok(())
    }

    /// Counter updates live here, in the executor process, never in the
    /// pool or in observers.
    fn on_unit_complete(&self) -> UnitCallback {
        let repository = self.repository.clone();
        let job_id = self.job_id.clone();
        let logger = JobLogger::new(repository.clone(), job_id.clone(), "executor");

        Arc::new(move |unit: &mut WorkUnit, result| {
            let Ok(Some(mut job)) = repository.get_job(&job_id) else {
                return;
            };
            if !job.is_post_processing_unit(&unit.unit_id) {
                job.completed_units += 1;
                if let Err(e) = repository.update_job(&job) {
                    tracing::error!(error = %e, "failed to bump completed_units");
                }
            }
            logger
                .with()
                .unit(&unit.unit_id)
                .extra(json!({
                    "execution_time": result.execution_time_seconds,
                    "cost_usd": result.metadata.total_cost_usd,
                }))
                .info(format!(
                    "unit completed: {} ({}/{})",
                    unit.unit_id.short(8),
                    job.completed_units,
                    job.total_units
                ));
        })
    }

    fn on_unit_failed(&self) -> UnitCallback {
        let repository = self.repository.clone();
        let job_id = self.job_id.clone();
        let logger = JobLogger::new(repository.clone(), job_id.clone(), "executor");

        Arc::new(move |unit: &mut WorkUnit, result| {
            let error_msg = result.error.clone().unwrap_or_else(|| "unknown error".to_string());
            let job = repository.get_job(&job_id).ok().flatten();
            let is_post = job
                .as_ref()
                .is_some_and(|job| job.is_post_processing_unit(&unit.unit_id));

            if unit.can_retry() && !is_post {
                unit.reset_for_retry();
                if let Err(e) = repository.update_work_unit(unit) {
                    tracing::error!(error = %e, "failed to requeue unit for retry");
                }
                logger.with().unit(&unit.unit_id).warning(format!(
                    "unit failed, will retry ({}/{}): {} - {error_msg}",
                    unit.retry_count,
                    unit.max_retries,
                    unit.unit_id.short(8)
                ));
            } else {
                if let Some(mut job) = job {
                    if !is_post {
                        job.failed_units += 1;
                        if let Err(e) = repository.update_job(&job) {
                            tracing::error!(error = %e, "failed to bump failed_units");
                        }
                    }
                }
                logger
                    .with()
                    .unit(&unit.unit_id)
                    .extra(json!({"error": error_msg}))
                    .error(format!(
                        "unit failed permanently after {} retries: {} - {error_msg}",
                        unit.max_retries,
                        unit.unit_id.short(8)
                    ));
            }
        })
    }
}

/// Final-status decision table. Pure: depends only on the job's counters
/// and flags plus the post-processing unit's terminal status.
pub fn determine_final_status(job: &Job, post_unit: Option<&WorkUnit>) -> JobStatus {
    let all_units_done = job.completed_units + job.failed_units == job.total_units;
    let all_succeeded = job.completed_units == job.total_units;

    let post_failed = post_unit.is_some_and(|u| u.status == WorkUnitStatus::Failed);
    let post_succeeded = post_unit.is_some_and(|u| u.status == WorkUnitStatus::Completed);

    if post_failed {
        return JobStatus::Failed;
    }
    if all_succeeded && (job.post_processing_prompt.is_none() || post_succeeded) {
        return JobStatus::Completed;
    }
    if job.bypass_failures && post_succeeded {
        return JobStatus::Completed;
    }
    if job.failed_units > 0 && all_units_done {
        return JobStatus::Failed;
    }
    JobStatus::Paused
}

fn log_final_status(logger: &JobLogger, job: &Job, status: JobStatus) {
    match status {
        JobStatus::Failed if job.post_processing_unit_id.is_some() && job.failed_units == 0 => {
            logger.warning("job failed: post-processing step failed");
        }
        JobStatus::Failed => {
            logger.warning(format!(
                "job finished with failures: {} completed, {} failed",
                job.completed_units, job.failed_units
            ));
        }
        JobStatus::Completed if job.bypass_failures && job.failed_units > 0 => {
            logger.info(format!(
                "job completed with bypassed failures: {} succeeded, {} bypassed",
                job.completed_units, job.failed_units
            ));
        }
        JobStatus::Completed => {
            logger.info(format!(
                "job completed successfully: {}/{} units",
                job.completed_units, job.total_units
            ));
        }
        _ => {
            let pending =
                job.total_units.saturating_sub(job.completed_units + job.failed_units);
            logger.info(format!(
                "job paused: {} completed, {} failed, {pending} pending",
                job.completed_units, job.failed_units
            ));
        }
    }
}

#[cfg(test)]
#[path = "executor_tests.rs"]
mod tests;
