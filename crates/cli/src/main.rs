// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `drover` - batch orchestration for agent-CLI workloads.

mod commands;

use anyhow::Result;
use clap::{Parser, Subcommand};
use commands::{control, executor, job};

/// Package version plus the short git hash baked in by build.rs.
const VERSION: &str = concat!(env!("CARGO_PKG_VERSION"), " (", env!("BUILD_GIT_HASH"), ")");

#[derive(Parser)]
#[command(
    name = "drover",
    version = VERSION,
    about = "Drive batches of work through agent subprocesses"
)]
struct Cli {
    /// Emit machine-readable JSON instead of human output
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Create a job from an enumerated source
    Create(job::CreateArgs),
    /// Start a job (test phase, approval, or restart)
    Start(job::StartArgs),
    /// Show job status and progress
    Status(job::StatusArgs),
    /// List recent jobs
    List(job::ListArgs),
    /// List a job's work units
    Units(job::UnitsArgs),
    /// Show a job's operational logs
    Logs(job::LogsArgs),
    /// Show live activity for in-flight units
    Activity(job::ActivityArgs),
    /// Show the job's total agent cost
    Cost(job::CostArgs),
    /// Ask the executor to finish current work and exit
    Stop(control::StopArgs),
    /// Hard-kill the executor and mark the job failed
    Kill(control::KillArgs),
    /// Kill one unit's agent subprocess
    KillUnit(control::KillUnitArgs),
    /// Reset a failed unit to pending
    RestartUnit(control::RestartUnitArgs),
    /// Spawn a fresh executor for a paused or failed job
    Resume(control::ResumeArgs),
    /// Internal: detached executor entry point
    #[command(hide = true)]
    Executor(executor::ExecutorArgs),
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let json = cli.json;

    match cli.command {
        Command::Create(args) => job::create(args, json).await,
        Command::Start(args) => job::start(args, json).await,
        Command::Status(args) => job::status(args, json),
        Command::List(args) => job::list(args, json),
        Command::Units(args) => job::units(args, json),
        Command::Logs(args) => job::logs(args, json),
        Command::Activity(args) => job::activity(args, json),
        Command::Cost(args) => job::cost(args, json),
        Command::Stop(args) => control::stop(args, json),
        Command::Kill(args) => control::kill(args, json),
        Command::KillUnit(args) => control::kill_unit(args, json),
        Command::RestartUnit(args) => control::restart_unit(args, json),
        Command::Resume(args) => control::resume(args, json),
        Command::Executor(args) => executor::run(args).await,
    }
}
