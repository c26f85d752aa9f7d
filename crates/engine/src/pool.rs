// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Bounded intra-job worker pool.
//!
//! Up to `max_workers` units run concurrently, each on a fresh
//! `WorkerProcess` record. One worker handles exactly one unit; the
//! record stays behind as history once the slot is released. The pool
//! lock guards only the active-worker map and the admission check.

use crate::driver::{Driver, StreamHooks};
use crate::error::EngineError;
use crate::logger::JobLogger;
use chrono::Utc;
use drover_core::{JobId, WorkUnit, WorkUnitStatus, WorkerProcess, WorkerResult, WorkerStatus};
use drover_storage::Repository;
use parking_lot::Mutex;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

const SLOT_POLL: Duration = Duration::from_millis(100);
const COMPLETION_POLL: Duration = Duration::from_millis(200);

/// Callback fired from the worker body after the driver returns.
///
/// Runs against the in-flight unit before the pool's final persist, so a
/// mutation made here (the retry reset) is what lands in the database.
pub type UnitCallback = Arc<dyn Fn(&mut WorkUnit, &WorkerResult) + Send + Sync>;

pub struct WorkerPool {
    inner: Arc<PoolInner>,
}

struct PoolInner {
    job_id: JobId,
    driver: Arc<dyn Driver>,
    repository: Repository,
    max_workers: usize,
    unit_timeout: Duration,
    on_unit_complete: Option<UnitCallback>,
    on_unit_failed: Option<UnitCallback>,
    active: Mutex<HashMap<String, WorkerProcess>>,
    running: AtomicBool,
    logger: JobLogger,
}

impl WorkerPool {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        job_id: JobId,
        driver: Arc<dyn Driver>,
        repository: Repository,
        max_workers: u32,
        unit_timeout: Duration,
        on_unit_complete: Option<UnitCallback>,
        on_unit_failed: Option<UnitCallback>,
    ) -> Self {
        let logger = JobLogger::new(repository.clone(), job_id.clone(), "worker");
        Self {
            inner: Arc::new(PoolInner {
                job_id,
                driver,
                repository,
                max_workers: max_workers.max(1) as usize,
                unit_timeout,
                on_unit_complete,
                on_unit_failed,
                active: Mutex::new(HashMap::new()),
                running: AtomicBool::new(false),
                logger,
            }),
        }
    }

    /// Allow submissions. Idempotent.
    pub fn start(&self) {
        self.inner.running.store(true, Ordering::SeqCst);
    }

    /// Disallow new submissions, drain running work, and mark leftover
    /// worker records terminated.
    pub async fn stop(&self) {
        self.inner.running.store(false, Ordering::SeqCst);
        self.wait_for_completion().await;

        let leftovers: Vec<WorkerProcess> = {
            let mut active = self.inner.active.lock();
            active
                .values_mut()
                .map(|worker| {
                    worker.status = WorkerStatus::Terminated;
                    worker.clone()
                })
                .collect()
        };
        for worker in &leftovers {
            if let Err(e) = self.inner.repository.update_worker(worker) {
                tracing::warn!(error = %e, worker_id = %worker.worker_id, "failed to terminate worker record");
            }
        }
    }

    /// Submit a unit for execution. Returns `Ok(false)` when the pool is
    /// full or not running; the caller is expected to wait and retry.
    pub fn submit(&self, mut unit: WorkUnit, prompt_template: &str) -> Result<bool, EngineError> {
        if !self.inner.running.load(Ordering::SeqCst) {
            return Ok(false);
        }

        let worker = {
            let mut active = self.inner.active.lock();
            if active.len() >= self.inner.max_workers {
                return Ok(false);
            }
            let worker = WorkerProcess::assigned(self.inner.job_id.clone(), unit.unit_id.clone());
            active.insert(worker.worker_id.as_str().to_string(), worker.clone());
            worker
        };

        unit.mark_assigned(worker.worker_id.clone(), Utc::now());

        let persisted = self
            .inner
            .repository
            .create_worker(&worker)
            .and_then(|()| self.inner.repository.update_work_unit(&unit));
        if let Err(e) = persisted {
            self.inner.active.lock().remove(worker.worker_id.as_str());
            return Err(e.into());
        }

        let inner = Arc::clone(&self.inner);
        let template = prompt_template.to_string();
        tokio::spawn(async move {
            inner.run_unit(worker, unit, template).await;
        });

        Ok(true)
    }

    /// Block until a slot frees up, bounded by `timeout`.
    pub async fn wait_for_available_slot(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        loop {
            if self.inner.active.lock().len() < self.inner.max_workers {
                return true;
            }
            if Instant::now() >= deadline {
                return false;
            }
            tokio::time::sleep(SLOT_POLL).await;
        }
    }

    pub fn active_worker_count(&self) -> usize {
        self.inner.active.lock().len()
    }

    /// Block until every active worker has finished.
    pub async fn wait_for_completion(&self) {
        loop {
            if self.inner.active.lock().is_empty() {
                return;
            }
            tokio::time::sleep(COMPLETION_POLL).await;
        }
    }
}

impl PoolInner {
    /// Worker body: one unit from `processing` to its terminal status.
    async fn run_unit(&self, mut worker: WorkerProcess, mut unit: WorkUnit, template: String) {
        self.logger
            .with()
            .worker(&worker.worker_id)
            .unit(&unit.unit_id)
            .extra(json!({"payload_keys": payload_keys(&unit.payload)}))
            .info(format!(
                "worker {} starting unit {}",
                worker.worker_id.short(8),
                unit.unit_id.short(8)
            ));

        unit.mark_processing(Utc::now());
        if let Err(e) = self.repository.update_work_unit(&unit) {
            tracing::error!(error = %e, unit_id = %unit.unit_id, "failed to mark unit processing");
        }

        let hooks = self.streaming_hooks(&unit);
        let result =
            self.driver.execute(&template, &unit.payload, self.unit_timeout, &hooks).await;

        unit.completed_at = Some(Utc::now());
        unit.execution_time_seconds = result.execution_time_seconds;
        unit.output_files = result.output_files.clone();
        unit.rendered_prompt = result.rendered_prompt.clone();
        unit.conversation = Some(result.conversation.clone());
        unit.session_id = result.metadata.session_id.clone();
        unit.cost_usd = result.metadata.total_cost_usd;
        unit.process_id = None;

        if result.success {
            unit.status = WorkUnitStatus::Completed;
            unit.result = Some(result.to_value());
            worker.record_completion(result.execution_time_seconds.unwrap_or(0.0));

            self.logger
                .with()
                .worker(&worker.worker_id)
                .unit(&unit.unit_id)
                .extra(json!({
                    "execution_time": result.execution_time_seconds,
                    "cost_usd": result.metadata.total_cost_usd,
                    "num_turns": result.metadata.num_turns,
                }))
                .info(format!(
                    "worker {} completed unit {} in {:.1}s",
                    worker.worker_id.short(8),
                    unit.unit_id.short(8),
                    result.execution_time_seconds.unwrap_or(0.0)
                ));

            if let Some(callback) = &self.on_unit_complete {
                callback(&mut unit, &result);
            }
        } else {
            unit.status = WorkUnitStatus::Failed;
            unit.error = result.error.clone();
            unit.result = Some(result.to_value());
            worker.record_failure();

            self.logger
                .with()
                .worker(&worker.worker_id)
                .unit(&unit.unit_id)
                .extra(json!({"error": result.error}))
                .error(format!(
                    "worker {} failed on unit {}: {}",
                    worker.worker_id.short(8),
                    unit.unit_id.short(8),
                    result.error.as_deref().unwrap_or("unknown error")
                ));

            if let Some(callback) = &self.on_unit_failed {
                callback(&mut unit, &result);
            }
        }

        // Callbacks run first so the retry path's reset wins this write.
        if let Err(e) = self.repository.update_work_unit(&unit) {
            tracing::error!(error = %e, unit_id = %unit.unit_id, "failed to persist unit outcome");
        }

        worker.release(Utc::now());
        if let Err(e) = self.repository.update_worker(&worker) {
            tracing::warn!(error = %e, worker_id = %worker.worker_id, "failed to persist worker release");
        }
        self.active.lock().remove(worker.worker_id.as_str());
    }

    /// Hooks that stream the agent's progress into the repository as it
    /// happens: conversation events, the session id, and the subprocess
    /// pid used by kill controls.
    fn streaming_hooks(&self, unit: &WorkUnit) -> StreamHooks {
        let repo = self.repository.clone();
        let unit_id = unit.unit_id.clone();
        let on_event = Box::new(move |event_type: &str, event: &Value| {
            if event_type == "system"
                && event.get("subtype").and_then(Value::as_str) == Some("init")
            {
                if let Some(session_id) = event.get("session_id").and_then(Value::as_str) {
                    if let Err(e) = repo.set_work_unit_session_id(&unit_id, session_id) {
                        tracing::warn!(error = %e, "failed to record session id");
                    }
                }
            } else if matches!(event_type, "user" | "assistant" | "tool_use" | "tool_result") {
                if let Err(e) = repo.append_conversation_event(&unit_id, event) {
                    tracing::warn!(error = %e, "failed to append conversation event");
                }
            }
        });

        let repo = self.repository.clone();
        let unit_id = unit.unit_id.clone();
        let on_process_start = Box::new(move |pid: i32| {
            if let Err(e) = repo.set_work_unit_process_id(&unit_id, Some(pid)) {
                tracing::warn!(error = %e, "failed to record process id");
            }
        });

        StreamHooks { on_event, on_process_start }
    }
}

fn payload_keys(payload: &Value) -> Vec<String> {
    payload
        .as_object()
        .map(|obj| obj.keys().cloned().collect())
        .unwrap_or_default()
}

#[cfg(test)]
#[path = "pool_tests.rs"]
mod tests;
