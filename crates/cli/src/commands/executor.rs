// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Hidden `drover executor` subcommand: the detached executor process.
//!
//! Spawned by `start`/`resume` via re-exec. Reconstructs everything from
//! the database path and the job's metadata, honors SIGTERM/SIGINT as
//! "finish current work and exit", and exits non-zero on a crash.

use super::build_driver;
use anyhow::{Context, Result};
use clap::Args;
use drover_core::JobId;
use drover_engine::{EngineConfig, JobExecutor};
use drover_storage::Repository;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

#[derive(Args)]
pub struct ExecutorArgs {
    /// Job to execute
    #[arg(long)]
    pub job: String,

    /// State database path
    #[arg(long)]
    pub db: std::path::PathBuf,
}

pub async fn run(args: ExecutorArgs) -> Result<()> {
    let config = EngineConfig::from_env();
    let repository = Repository::open(&args.db).context("opening state database")?;
    let job_id = JobId::new(args.job);

    let job = repository
        .get_job(&job_id)?
        .with_context(|| format!("job not found: {job_id}"))?;
    let driver = build_driver(
        job.worker_type().unwrap_or("claude-cli"),
        None,
        job.worker_model().map(str::to_string),
        job.worker_max_turns(),
    )?;

    let should_stop = Arc::new(AtomicBool::new(false));
    spawn_signal_listeners(Arc::clone(&should_stop))?;

    let executor = JobExecutor::new(job_id, repository, driver, config.worker_timeout);
    executor.run(should_stop).await?;
    Ok(())
}

/// SIGTERM and SIGINT both mean graceful stop. Nothing but the flag
/// store happens in signal context.
fn spawn_signal_listeners(should_stop: Arc<AtomicBool>) -> Result<()> {
    use tokio::signal::unix::{signal, SignalKind};

    let mut term = signal(SignalKind::terminate()).context("installing SIGTERM handler")?;
    let mut int = signal(SignalKind::interrupt()).context("installing SIGINT handler")?;

    tokio::spawn(async move {
        tokio::select! {
            _ = term.recv() => {
                tracing::info!("received SIGTERM, initiating graceful shutdown");
            }
            _ = int.recv() => {
                tracing::info!("received SIGINT, initiating graceful shutdown");
            }
        }
        should_stop.store(true, Ordering::SeqCst);
    });

    Ok(())
}
