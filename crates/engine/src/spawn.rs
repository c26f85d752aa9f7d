// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Detached executor spawning.
//!
//! The executor must outlive whichever short-lived process created it, so
//! it is started by re-executing the current binary with the hidden
//! `executor` subcommand in its own process group, with all stdio
//! detached. Parent and child share nothing but the database.

use crate::error::EngineError;
use chrono::Utc;
use drover_core::JobId;
use drover_storage::Repository;
use std::process::Stdio;

/// Spawn a detached executor for the job and record its pid in
/// `job.metadata.executor_pid`. Returns the pid.
pub fn start_detached(repository: &Repository, job_id: &JobId) -> Result<i32, EngineError> {
    let exe = std::env::current_exe()?;

    let mut cmd = std::process::Command::new(exe);
    cmd.arg("executor")
        .arg("--job")
        .arg(job_id.as_str())
        .arg("--db")
        .arg(repository.db_path())
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null());
    #[cfg(unix)]
    {
        use std::os::unix::process::CommandExt;
        cmd.process_group(0);
    }

    let child = cmd.spawn()?;
    let pid = child.id() as i32;
    tracing::info!(job_id = %job_id, pid, "spawned detached executor");

    if let Some(mut job) = repository.get_job(job_id)? {
        job.record_executor_spawn(pid, Utc::now());
        repository.update_job(&job)?;
    }

    Ok(pid)
}
