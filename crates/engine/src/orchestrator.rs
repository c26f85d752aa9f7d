// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Orchestrator: job creation and the test/approve state machine.
//!
//! The in-process facade the CLI (and any other host) calls. Everything
//! long-lived happens in the detached executor; the orchestrator only
//! creates rows, runs the synchronous test phase, and spawns executors.

use crate::config::EngineConfig;
use crate::controls;
use crate::driver::{Driver, StreamHooks};
use crate::error::EngineError;
use crate::logger::JobLogger;
use crate::spawn;
use crate::synth;
use chrono::Utc;
use drover_core::{
    Job, JobConfig, JobId, JobStatus, Metadata, UnitId, WorkUnit, WorkUnitStatus,
};
use drover_enumerators::{create_enumerator, EnumerateResult};
use drover_storage::Repository;
use serde::Serialize;
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::Arc;

pub struct Orchestrator {
    repository: Repository,
    driver: Arc<dyn Driver>,
    config: EngineConfig,
}

/// Inputs for [`Orchestrator::create_job`].
pub struct CreateJobParams {
    pub name: String,
    /// The user's description of what to do with each item.
    pub user_intent: String,
    pub enumerator_type: String,
    pub enumerator_config: Value,
    pub max_workers: Option<u32>,
    pub max_retries: Option<u32>,
    pub post_processing_prompt: Option<String>,
    pub bypass_failures: bool,
    pub metadata: Metadata,
}

#[derive(Debug, Serialize)]
pub struct JobCreated {
    pub job_id: JobId,
    pub total_items: usize,
    pub enumerator_type: String,
    pub enumerator_metadata: Value,
    pub worker_prompt: String,
    pub has_post_processing: bool,
    pub message: String,
}

/// Outcome of the test phase, returned for user review. The caller must
/// explicitly approve before the rest of the batch runs.
#[derive(Debug, Serialize)]
pub struct TestReport {
    pub job_id: JobId,
    pub test_unit_id: UnitId,
    pub test_passed: bool,
    pub test_unit_payload: Value,
    pub output: Option<String>,
    pub error: Option<String>,
    pub execution_time: Option<f64>,
    pub cost_usd: Option<f64>,
    pub remaining_units: u32,
    pub awaiting_user_approval: bool,
    pub message: String,
}

#[derive(Debug, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum StartOutcome {
    /// Test ran (or its results are being replayed); awaiting approval.
    Testing(TestReport),
    /// Rejected: job reverted to created for prompt adjustments.
    Reset { job_id: JobId, message: String },
    /// A live executor already owns this job.
    AlreadyRunning { job_id: JobId, pid: i32 },
    /// Detached executor spawned.
    Started { job_id: JobId, pid: i32, remaining_units: u32 },
}

#[derive(Debug, Serialize)]
pub struct JobStatusReport {
    pub job_id: JobId,
    pub status: JobStatus,
    pub executor_state: controls::ExecutorState,
    pub executor_pid: Option<i32>,
    pub progress: controls::Progress,
    pub unit_stats: std::collections::HashMap<String, u32>,
}

impl Orchestrator {
    pub fn new(repository: Repository, driver: Arc<dyn Driver>, config: EngineConfig) -> Self {
        Self { repository, driver, config }
    }

    /// Create a job and its pending work units from an enumerated source.
    /// Nothing is persisted unless enumeration yields at least one item.
    pub fn create_job(&self, params: CreateJobParams) -> Result<JobCreated, EngineError> {
        let enumerator =
            create_enumerator(&params.enumerator_type, &params.enumerator_config)?;
        enumerator.validate_config()?;
        let result = enumerator.enumerate()?;
        if result.items.is_empty() {
            return Err(EngineError::NoItems);
        }

        let worker_prompt = if params.enumerator_type == "file" {
            synth::file_processing_prompt(&params.user_intent)
        } else {
            let payload_description = extract_payload_description(&result);
            synth::generic_prompt(
                &params.user_intent,
                Some(&params.enumerator_type),
                payload_description.as_ref(),
            )
        };

        let max_workers = params.max_workers.unwrap_or(self.config.max_workers);
        let max_retries = params.max_retries.unwrap_or(self.config.max_retries);

        let mut job = Job::new(
            JobConfig::new(
                params.name.clone(),
                params.user_intent,
                worker_prompt.clone(),
                params.enumerator_type.clone(),
                result.items.len() as u32,
            )
            .max_workers(max_workers)
            .bypass_failures(params.bypass_failures)
            .metadata(params.metadata),
        );
        if let Some(prompt) = params.post_processing_prompt {
            job.post_processing_prompt = Some(prompt);
        }
        job.insert_meta("max_retries", max_retries);

        self.repository.create_job(&job)?;
        for item in &result.items {
            let unit = WorkUnit::new(job.job_id.clone(), &params.enumerator_type, item.clone())
                .max_retries(max_retries);
            self.repository.create_work_unit(&unit)?;
        }

        let has_post_processing = job.post_processing_prompt.is_some();
        let message = format!(
            "created job '{}' with {} items to process{}",
            params.name,
            result.items.len(),
            if has_post_processing { " (with post-processing step)" } else { "" }
        );

        Ok(JobCreated {
            job_id: job.job_id,
            total_items: result.items.len(),
            enumerator_type: params.enumerator_type,
            enumerator_metadata: Value::Object(result.metadata),
            worker_prompt,
            has_post_processing,
            message,
        })
    }

    /// Drive the test/approve state machine.
    ///
    /// * `created`: run the test phase, unless a skip was requested.
    /// * `testing`: approve starts the executor; reject reverts to
    ///   `created`; no decision replays the stored test results.
    /// * `running`: report the live executor, or restart a dead one.
    pub async fn start_job(
        &self,
        job_id: &JobId,
        approve: Option<bool>,
        skip_test: bool,
    ) -> Result<StartOutcome, EngineError> {
        let mut job = self
            .repository
            .get_job(job_id)?
            .ok_or_else(|| EngineError::JobNotFound(job_id.as_str().to_string()))?;

        match job.status {
            JobStatus::Created => {
                if skip_test || self.config.skip_test {
                    self.start_executor(job)
                } else {
                    self.run_test_phase(job).await
                }
            }
            JobStatus::Testing => match approve {
                Some(true) => self.start_executor(job),
                Some(false) => {
                    job.status = JobStatus::Created;
                    job.test_passed = false;
                    self.repository.update_job(&job)?;
                    Ok(StartOutcome::Reset {
                        job_id: job.job_id,
                        message: "job reset to created; adjust the prompt and try again"
                            .to_string(),
                    })
                }
                None => self.stored_test_results(&job),
            },
            JobStatus::Running => {
                let status = controls::get_executor_status(&self.repository, job_id)?;
                match (status.state, status.pid) {
                    (controls::ExecutorState::Running, Some(pid)) => {
                        Ok(StartOutcome::AlreadyRunning { job_id: job.job_id, pid })
                    }
                    _ => self.start_executor(job),
                }
            }
            status => Err(EngineError::InvalidJobState(status)),
        }
    }

    /// Run the first pending unit synchronously and report the outcome.
    /// Blocks the caller for the whole agent run; never auto-continues.
    async fn run_test_phase(&self, mut job: Job) -> Result<StartOutcome, EngineError> {
        let logger =
            JobLogger::new(self.repository.clone(), job.job_id.clone(), "orchestrator");

        let mut units = self.repository.get_pending_units(&job.job_id, 1)?;
        let Some(mut test_unit) = units.pop() else {
            return Err(EngineError::NoPendingUnits);
        };

        job.status = JobStatus::Testing;
        job.test_unit_id = Some(test_unit.unit_id.clone());
        self.repository.update_job(&job)?;

        test_unit.mark_processing(Utc::now());
        self.repository.update_work_unit(&test_unit)?;

        logger
            .with()
            .unit(&test_unit.unit_id)
            .info(format!("running test unit {}", test_unit.unit_id.short(8)));

        let hooks = self.test_hooks(&test_unit.unit_id);
        let result = self
            .driver
            .execute(
                &job.worker_prompt_template,
                &test_unit.payload,
                self.config.worker_timeout,
                &hooks,
            )
            .await;

        test_unit.status =
            if result.success { WorkUnitStatus::Completed } else { WorkUnitStatus::Failed };
        test_unit.completed_at = Some(Utc::now());
        test_unit.result = Some(serde_json::json!({"output": result.output}));
        test_unit.error = result.error.clone();
        test_unit.conversation = Some(result.conversation.clone());
        test_unit.execution_time_seconds = result.execution_time_seconds;
        test_unit.cost_usd = result.metadata.total_cost_usd;
        test_unit.process_id = None;
        self.repository.update_work_unit(&test_unit)?;

        job.test_passed = result.success;
        if result.success {
            // The test unit is done; the dispatch loop must not redo it.
            job.completed_units = 1;
        }
        self.repository.update_job(&job)?;

        let message = if result.success {
            "TEST COMPLETE - USER APPROVAL REQUIRED. Review the output and approve to process \
             the remaining units, or reject to reset and adjust the prompt."
        } else {
            "Test failed. Review the error, reject to reset, then adjust the prompt and try again."
        };

        Ok(StartOutcome::Testing(TestReport {
            job_id: job.job_id.clone(),
            test_unit_id: test_unit.unit_id,
            test_passed: result.success,
            test_unit_payload: test_unit.payload,
            output: result.output,
            error: result.error,
            execution_time: result.execution_time_seconds,
            cost_usd: test_unit.cost_usd,
            remaining_units: job.total_units.saturating_sub(1),
            awaiting_user_approval: true,
            message: message.to_string(),
        }))
    }

    /// Replay the stored test results for a job already in `testing`.
    fn stored_test_results(&self, job: &Job) -> Result<StartOutcome, EngineError> {
        let test_unit_id = job
            .test_unit_id
            .clone()
            .ok_or_else(|| EngineError::UnitNotFound("no test unit recorded".to_string()))?;
        let test_unit = self
            .repository
            .get_work_unit(&test_unit_id)?
            .ok_or_else(|| EngineError::UnitNotFound(test_unit_id.as_str().to_string()))?;

        Ok(StartOutcome::Testing(TestReport {
            job_id: job.job_id.clone(),
            test_unit_id: test_unit.unit_id.clone(),
            test_passed: job.test_passed,
            test_unit_payload: test_unit.payload.clone(),
            output: test_unit
                .result
                .as_ref()
                .and_then(|r| r.get("output"))
                .and_then(Value::as_str)
                .map(str::to_string),
            error: test_unit.error.clone(),
            execution_time: test_unit.execution_time_seconds,
            cost_usd: test_unit.cost_usd,
            remaining_units: job.total_units.saturating_sub(job.completed_units),
            awaiting_user_approval: true,
            message: "USER APPROVAL REQUIRED. Approve to process the remaining units, or reject \
                      to reset."
                .to_string(),
        }))
    }

    fn start_executor(&self, mut job: Job) -> Result<StartOutcome, EngineError> {
        job.status = JobStatus::Running;
        job.started_at = Some(Utc::now());
        self.repository.update_job(&job)?;

        let pid = spawn::start_detached(&self.repository, &job.job_id)?;
        let remaining = job.total_units.saturating_sub(job.completed_units);
        Ok(StartOutcome::Started { job_id: job.job_id, pid, remaining_units: remaining })
    }

    /// Current job status with executor liveness and per-status unit
    /// counts. Counter skew against unit rows is possible mid-write and
    /// tolerated.
    pub fn get_job_status(&self, job_id: &JobId) -> Result<JobStatusReport, EngineError> {
        let job = self
            .repository
            .get_job(job_id)?
            .ok_or_else(|| EngineError::JobNotFound(job_id.as_str().to_string()))?;
        let executor = controls::get_executor_status(&self.repository, job_id)?;
        let unit_stats = self.repository.count_units_by_status(job_id)?;

        Ok(JobStatusReport {
            job_id: job.job_id.clone(),
            status: job.status,
            executor_state: executor.state,
            executor_pid: executor.pid,
            progress: controls::Progress::of(&job),
            unit_stats,
        })
    }

    fn test_hooks(&self, unit_id: &UnitId) -> StreamHooks {
        let repo = self.repository.clone();
        let id = unit_id.clone();
        let on_event = Box::new(move |event_type: &str, event: &Value| {
            if event_type == "system"
                && event.get("subtype").and_then(Value::as_str) == Some("init")
            {
                if let Some(session_id) = event.get("session_id").and_then(Value::as_str) {
                    let _ = repo.set_work_unit_session_id(&id, session_id);
                }
            } else if matches!(event_type, "user" | "assistant" | "tool_use" | "tool_result") {
                let _ = repo.append_conversation_event(&id, event);
            }
        });

        let repo = self.repository.clone();
        let id = unit_id.clone();
        let on_process_start = Box::new(move |pid: i32| {
            let _ = repo.set_work_unit_process_id(&id, Some(pid));
        });

        StreamHooks { on_event, on_process_start }
    }
}

/// Field descriptions for the generic prompt: column names from the
/// enumerator's metadata when present, else the keys of the first item
/// (skipping `_`-prefixed internals).
fn extract_payload_description(result: &EnumerateResult) -> Option<BTreeMap<String, String>> {
    if let Some(columns) = result.metadata.get("columns").and_then(Value::as_array) {
        let fields: BTreeMap<String, String> = columns
            .iter()
            .filter_map(Value::as_str)
            .map(|col| (col.to_string(), format!("from column '{col}'")))
            .collect();
        if !fields.is_empty() {
            return Some(fields);
        }
    }

    let sample = result.items.first()?.as_object()?;
    let fields: BTreeMap<String, String> = sample
        .keys()
        .filter(|key| !key.starts_with('_'))
        .map(|key| (key.clone(), "payload field".to_string()))
        .collect();
    if fields.is_empty() {
        None
    } else {
        Some(fields)
    }
}

#[cfg(test)]
#[path = "orchestrator_tests.rs"]
mod tests;
