// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Process controls: stateless operations over pids recorded in the
//! repository.
//!
//! Used by observers to inspect, kill, or restart executors and
//! individual units. Every operation tolerates "process already gone"
//! and uses it to bring status rows back in line with reality.

use crate::error::EngineError;
use crate::logger::JobLogger;
use crate::process::{kill_if_alive, pid_alive, signal_group_or_pid};
use crate::spawn;
use chrono::Utc;
use drover_core::{Job, JobId, JobStatus, UnitId, WorkUnitStatus};
use drover_storage::Repository;
use nix::sys::signal::{kill, Signal};
use nix::unistd::Pid;
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutorState {
    NotFound,
    NotStarted,
    Running,
    Stopped,
}

#[derive(Debug, Clone, Copy, Serialize)]
pub struct Progress {
    pub total: u32,
    pub completed: u32,
    pub failed: u32,
    pub percentage: f64,
}

impl Progress {
    pub fn of(job: &Job) -> Self {
        Self {
            total: job.total_units,
            completed: job.completed_units,
            failed: job.failed_units,
            percentage: job.progress_percentage(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ExecutorStatus {
    pub state: ExecutorState,
    pub pid: Option<i32>,
    pub job_status: Option<JobStatus>,
    pub started_at: Option<String>,
    pub completed_at: Option<String>,
    pub error: Option<String>,
    pub progress: Option<Progress>,
}

/// Outcome of a kill/restart operation. `success: false` carries a
/// caller-usable explanation; database failures surface as errors
/// instead.
#[derive(Debug, Serialize)]
pub struct ControlResult {
    pub success: bool,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pid: Option<i32>,
}

impl ControlResult {
    fn ok(message: impl Into<String>) -> Self {
        Self { success: true, message: message.into(), pid: None }
    }

    fn ok_with_pid(message: impl Into<String>, pid: i32) -> Self {
        Self { success: true, message: message.into(), pid: Some(pid) }
    }

    fn refused(message: impl Into<String>) -> Self {
        Self { success: false, message: message.into(), pid: None }
    }
}

/// Liveness and progress of a job's executor, from the pid recorded in
/// job metadata.
pub fn get_executor_status(
    repository: &Repository,
    job_id: &JobId,
) -> Result<ExecutorStatus, EngineError> {
    let Some(job) = repository.get_job(job_id)? else {
        return Ok(ExecutorStatus {
            state: ExecutorState::NotFound,
            pid: None,
            job_status: None,
            started_at: None,
            completed_at: None,
            error: None,
            progress: None,
        });
    };

    let Some(pid) = job.executor_pid() else {
        return Ok(ExecutorStatus {
            state: ExecutorState::NotStarted,
            pid: None,
            job_status: Some(job.status),
            started_at: None,
            completed_at: None,
            error: None,
            progress: Some(Progress::of(&job)),
        });
    };

    let state = if pid_alive(pid) { ExecutorState::Running } else { ExecutorState::Stopped };
    Ok(ExecutorStatus {
        state,
        pid: Some(pid),
        job_status: Some(job.status),
        started_at: job.meta_str("executor_started_at").map(str::to_string),
        completed_at: job.meta_str("executor_completed_at").map(str::to_string),
        error: job.meta_str("executor_error").map(str::to_string),
        progress: Some(Progress::of(&job)),
    })
}

/// Ask the executor to finish current work and exit (SIGTERM). Returns
/// whether a signal was actually sent.
pub fn stop_executor(repository: &Repository, job_id: &JobId) -> Result<bool, EngineError> {
    let Some(job) = repository.get_job(job_id)? else {
        return Ok(false);
    };
    let Some(pid) = job.executor_pid() else {
        return Ok(false);
    };
    Ok(kill(Pid::from_raw(pid), Signal::SIGTERM).is_ok())
}

/// Hard-kill the executor's process group and mark the job failed.
/// Stuck units are reset so observers see a clean state either way.
pub fn kill_executor(
    repository: &Repository,
    job_id: &JobId,
) -> Result<ControlResult, EngineError> {
    let Some(mut job) = repository.get_job(job_id)? else {
        return Ok(ControlResult::refused("job not found"));
    };
    let Some(pid) = job.executor_pid() else {
        return Ok(ControlResult::refused("no executor process found"));
    };

    let logger = JobLogger::new(repository.clone(), job_id.clone(), "control");

    if !pid_alive(pid) {
        job.status = JobStatus::Failed;
        job.record_kill("user requested kill (process already dead)", Utc::now());
        repository.update_job(&job)?;
        repository.reset_stuck_units(job_id)?;
        logger.warning("kill requested but executor was already dead; job marked failed");
        return Ok(ControlResult::ok("process was already dead, job marked as failed"));
    }

    let _ = signal_group_or_pid(pid, Signal::SIGKILL);

    job.status = JobStatus::Failed;
    job.record_kill("user requested kill", Utc::now());
    repository.update_job(&job)?;
    repository.reset_stuck_units(job_id)?;
    logger.warning(format!("executor {pid} killed by user"));

    Ok(ControlResult::ok_with_pid("job executor killed", pid))
}

/// Kill one unit's agent subprocess. The executor's driver path notices
/// the death and routes the unit through the normal failure machinery.
pub fn kill_work_unit(
    repository: &Repository,
    job_id: &JobId,
    unit_id: &UnitId,
) -> Result<ControlResult, EngineError> {
    let Some(mut unit) = repository.get_work_unit(unit_id)? else {
        return Ok(ControlResult::refused("work unit not found"));
    };
    if unit.job_id != *job_id {
        return Ok(ControlResult::refused("work unit does not belong to this job"));
    }
    let Some(pid) = unit.process_id else {
        return Ok(ControlResult::refused(
            "no process found for this unit (it may not be running)",
        ));
    };

    if !pid_alive(pid) {
        // Stale pid: bring the row in line with reality.
        unit.status = WorkUnitStatus::Failed;
        unit.error = Some("process killed by user (process already dead)".to_string());
        unit.process_id = None;
        repository.update_work_unit(&unit)?;
        return Ok(ControlResult::ok("process was already dead, unit marked as failed"));
    }

    let _ = signal_group_or_pid(pid, Signal::SIGKILL);
    repository.set_work_unit_process_id(unit_id, None)?;

    Ok(ControlResult::ok_with_pid("work unit process killed", pid))
}

/// Reset a failed unit to pending for another run.
///
/// `retry_count` survives so total attempts stay visible across manual
/// restarts. The caller is responsible for an executor being alive;
/// this never spawns one.
pub fn restart_work_unit(
    repository: &Repository,
    job_id: &JobId,
    unit_id: &UnitId,
) -> Result<ControlResult, EngineError> {
    let Some(mut unit) = repository.get_work_unit(unit_id)? else {
        return Ok(ControlResult::refused("work unit not found"));
    };
    if unit.job_id != *job_id {
        return Ok(ControlResult::refused("work unit does not belong to this job"));
    }
    if unit.status != WorkUnitStatus::Failed {
        return Ok(ControlResult::refused(format!(
            "cannot restart unit with status '{}'; only failed units can be restarted",
            unit.status
        )));
    }

    if let Some(pid) = unit.process_id {
        kill_if_alive(pid);
    }

    if let Some(mut job) = repository.get_job(job_id)? {
        job.failed_units = job.failed_units.saturating_sub(1);
        repository.update_job(&job)?;
    }

    unit.reset_for_restart();
    repository.update_work_unit(&unit)?;

    Ok(ControlResult::ok("work unit reset to pending"))
}

/// Resume a paused or failed job: spawn a fresh executor unless one is
/// already alive or nothing is pending. Returns the executor pid.
pub fn resume_job(
    repository: &Repository,
    job_id: &JobId,
) -> Result<Option<i32>, EngineError> {
    if repository.get_job(job_id)?.is_none() {
        return Ok(None);
    }
    if repository.get_pending_units(job_id, 1)?.is_empty() {
        return Ok(None);
    }

    let status = get_executor_status(repository, job_id)?;
    if status.state == ExecutorState::Running {
        return Ok(status.pid);
    }

    Ok(Some(spawn::start_detached(repository, job_id)?))
}

#[cfg(test)]
#[path = "controls_tests.rs"]
mod tests;
