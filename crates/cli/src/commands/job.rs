// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `drover create/start/status/list/units/logs/activity/cost`

use super::{build_driver, open_repository, print_json};
use anyhow::{bail, Context, Result};
use clap::Args;
use drover_core::{JobId, JobStatus, Metadata, WorkUnitStatus};
use drover_engine::{CreateJobParams, EngineConfig, Orchestrator, StartOutcome};
use drover_storage::LogFilter;
use serde_json::Value;

#[derive(Args)]
pub struct CreateArgs {
    /// Human-readable job name
    pub name: String,

    /// What to do with each item (the worker prompt is synthesized from this)
    pub intent: String,

    /// Item source: file, csv, json, sql, items
    #[arg(long)]
    pub source: String,

    /// Source configuration as a JSON object
    #[arg(long)]
    pub config: String,

    /// Maximum concurrent workers
    #[arg(long)]
    pub workers: Option<u32>,

    /// Per-unit retry ceiling
    #[arg(long)]
    pub retries: Option<u32>,

    /// Prompt for the synthesis step after all units finish
    #[arg(long = "post-process")]
    pub post_processing_prompt: Option<String>,

    /// Run post-processing even if some units failed permanently
    #[arg(long)]
    pub bypass_failures: bool,

    /// Worker driver tag (claude-cli or claude-cli-files)
    #[arg(long, default_value = "claude-cli")]
    pub worker_type: String,

    /// Model override passed to the agent CLI
    #[arg(long)]
    pub model: Option<String>,

    /// Max agentic turns per unit
    #[arg(long)]
    pub max_turns: Option<u32>,

    /// Extra metadata entries (key=value, repeatable)
    #[arg(long = "meta", value_parser = parse_key_value)]
    pub meta: Vec<(String, String)>,
}

pub async fn create(args: CreateArgs, json: bool) -> Result<()> {
    let config = EngineConfig::from_env();
    let repository = open_repository(&config)?;
    let enumerator_config: Value =
        serde_json::from_str(&args.config).context("--config must be a JSON object")?;

    let mut metadata = Metadata::new();
    // The detached executor re-creates the driver from these keys.
    metadata.insert("worker_type".into(), Value::String(args.worker_type.clone()));
    if let Some(model) = &args.model {
        metadata.insert("worker_model".into(), Value::String(model.clone()));
    }
    if let Some(max_turns) = args.max_turns {
        metadata.insert("worker_max_turns".into(), Value::from(max_turns));
    }
    for (key, value) in args.meta {
        metadata.insert(key, Value::String(value));
    }

    let driver = build_driver(&args.worker_type, None, args.model, args.max_turns)?;
    let orchestrator = Orchestrator::new(repository, driver, config);

    let created = orchestrator.create_job(CreateJobParams {
        name: args.name,
        user_intent: args.intent,
        enumerator_type: args.source,
        enumerator_config,
        max_workers: args.workers,
        max_retries: args.retries,
        post_processing_prompt: args.post_processing_prompt,
        bypass_failures: args.bypass_failures,
        metadata,
    })?;

    if json {
        return print_json(&created);
    }
    println!("{}", created.message);
    println!("job id: {}", created.job_id);
    Ok(())
}

#[derive(Args)]
pub struct StartArgs {
    /// Job ID
    pub job_id: String,

    /// Approve the test results and process the remaining units
    #[arg(long, conflicts_with = "reject")]
    pub approve: bool,

    /// Reject the test results and reset the job
    #[arg(long)]
    pub reject: bool,

    /// Skip the test phase and start immediately
    #[arg(long)]
    pub skip_test: bool,
}

pub async fn start(args: StartArgs, json: bool) -> Result<()> {
    let config = EngineConfig::from_env();
    let repository = open_repository(&config)?;
    let job_id = JobId::new(args.job_id);

    let job = repository
        .get_job(&job_id)?
        .with_context(|| format!("job not found: {job_id}"))?;
    let driver = build_driver(
        job.worker_type().unwrap_or("claude-cli"),
        None,
        job.worker_model().map(str::to_string),
        job.worker_max_turns(),
    )?;
    let orchestrator = Orchestrator::new(repository, driver, config);

    let approve = match (args.approve, args.reject) {
        (true, _) => Some(true),
        (_, true) => Some(false),
        _ => None,
    };

    let outcome = orchestrator.start_job(&job_id, approve, args.skip_test).await?;
    if json {
        return print_json(&outcome);
    }

    match outcome {
        StartOutcome::Testing(report) => {
            println!(
                "test {}: unit {}",
                if report.test_passed { "passed" } else { "failed" },
                report.test_unit_id
            );
            if let Some(output) = &report.output {
                println!("--- output ---\n{output}");
            }
            if let Some(error) = &report.error {
                println!("--- error ---\n{error}");
            }
            if let Some(cost) = report.cost_usd {
                println!("cost: ${cost:.4}");
            }
            println!("{}", report.message);
        }
        StartOutcome::Reset { message, .. } => println!("{message}"),
        StartOutcome::AlreadyRunning { pid, .. } => {
            println!("job is already running (executor pid {pid})");
        }
        StartOutcome::Started { pid, remaining_units, .. } => {
            println!("job started: executor pid {pid}, {remaining_units} units remaining");
        }
    }
    Ok(())
}

#[derive(Args)]
pub struct StatusArgs {
    /// Job ID
    pub job_id: String,
}

pub fn status(args: StatusArgs, json: bool) -> Result<()> {
    let config = EngineConfig::from_env();
    let repository = open_repository(&config)?;
    let driver = build_driver("claude-cli", None, None, None)?;
    let orchestrator = Orchestrator::new(repository, driver, config);

    let report = match orchestrator.get_job_status(&JobId::new(args.job_id)) {
        Ok(report) => report,
        Err(e) if e.is_busy() => bail!("database busy or locked, try again: {e}"),
        Err(e) => return Err(e.into()),
    };

    if json {
        return print_json(&report);
    }
    println!("job {} [{}]", report.job_id, report.status);
    println!(
        "progress: {}/{} completed, {} failed ({:.1}%)",
        report.progress.completed, report.progress.total, report.progress.failed,
        report.progress.percentage
    );
    println!("executor: {:?} (pid {:?})", report.executor_state, report.executor_pid);
    for (status, count) in &report.unit_stats {
        println!("  {status}: {count}");
    }
    Ok(())
}

#[derive(Args)]
pub struct ListArgs {
    /// Filter by status (created, testing, running, paused, post_processing, completed, failed)
    #[arg(long)]
    pub status: Option<String>,

    /// Maximum number of jobs to show
    #[arg(short = 'n', long, default_value = "20")]
    pub limit: usize,
}

pub fn list(args: ListArgs, json: bool) -> Result<()> {
    let config = EngineConfig::from_env();
    let repository = open_repository(&config)?;

    let status = args
        .status
        .as_deref()
        .map(|s| s.parse::<JobStatus>())
        .transpose()
        .context("invalid status filter")?;
    let jobs = repository.list_jobs(args.limit, status)?;

    if json {
        return print_json(&jobs);
    }
    for job in jobs {
        println!(
            "{}  {:<16} {:<10} {}/{} done, {} failed",
            job.job_id, job.name, job.status, job.completed_units, job.total_units,
            job.failed_units
        );
    }
    Ok(())
}

#[derive(Args)]
pub struct UnitsArgs {
    /// Job ID
    pub job_id: String,

    /// Filter by unit status
    #[arg(long)]
    pub status: Option<String>,

    /// Maximum number of units to show
    #[arg(short = 'n', long, default_value = "50")]
    pub limit: usize,

    /// Pagination offset
    #[arg(long, default_value = "0")]
    pub offset: usize,
}

pub fn units(args: UnitsArgs, json: bool) -> Result<()> {
    let config = EngineConfig::from_env();
    let repository = open_repository(&config)?;

    let status = args
        .status
        .as_deref()
        .map(|s| s.parse::<WorkUnitStatus>())
        .transpose()
        .context("invalid status filter")?;
    let units = repository.get_units_for_job(
        &JobId::new(args.job_id),
        status,
        args.limit,
        args.offset,
    )?;

    if json {
        return print_json(&units);
    }
    for unit in units {
        println!(
            "{}  {:<10} retries={} {}",
            unit.unit_id,
            unit.status,
            unit.retry_count,
            unit.error.as_deref().unwrap_or("")
        );
    }
    Ok(())
}

#[derive(Args)]
pub struct LogsArgs {
    /// Job ID
    pub job_id: String,

    /// Filter by source (executor, worker, orchestrator, control)
    #[arg(long)]
    pub source: Option<String>,

    /// Filter by level (debug, info, warning, error)
    #[arg(long)]
    pub level: Option<String>,

    /// Only entries after this RFC 3339 timestamp
    #[arg(long)]
    pub since: Option<String>,

    /// Maximum number of entries
    #[arg(short = 'n', long, default_value = "100")]
    pub limit: usize,

    /// Pagination offset
    #[arg(long, default_value = "0")]
    pub offset: usize,
}

pub fn logs(args: LogsArgs, json: bool) -> Result<()> {
    let config = EngineConfig::from_env();
    let repository = open_repository(&config)?;

    let level = args
        .level
        .as_deref()
        .map(|s| s.parse())
        .transpose()
        .context("invalid level filter")?;
    let entries = repository.get_logs(
        &JobId::new(args.job_id),
        &LogFilter {
            source: args.source,
            level,
            since: args.since,
            limit: args.limit,
            offset: args.offset,
        },
    )?;

    if json {
        return print_json(&entries);
    }
    for entry in entries {
        println!(
            "{} [{}] {}: {}",
            entry.timestamp.to_rfc3339(),
            entry.source,
            entry.level,
            entry.message
        );
    }
    Ok(())
}

#[derive(Args)]
pub struct ActivityArgs {
    /// Job ID
    pub job_id: String,
}

pub fn activity(args: ActivityArgs, json: bool) -> Result<()> {
    let config = EngineConfig::from_env();
    let repository = open_repository(&config)?;
    let active =
        repository.get_active_units_with_latest_conversation(&JobId::new(args.job_id))?;

    if json {
        return print_json(&active);
    }
    if active.is_empty() {
        println!("no units in flight");
        return Ok(());
    }
    for unit in active {
        let latest = match &unit.latest_event {
            Some(drover_storage::LatestEvent::Text { content }) => content.clone(),
            Some(drover_storage::LatestEvent::ToolUse { tool, input_preview }) => {
                format!("[{tool}] {input_preview}")
            }
            None => "(no activity yet)".to_string(),
        };
        println!("{}  {:<10} pid={:?}  {latest}", unit.unit_id, unit.status, unit.process_id);
    }
    Ok(())
}

#[derive(Args)]
pub struct CostArgs {
    /// Job ID
    pub job_id: String,
}

pub fn cost(args: CostArgs, json: bool) -> Result<()> {
    let config = EngineConfig::from_env();
    let repository = open_repository(&config)?;
    let total = repository.get_job_total_cost(&JobId::new(args.job_id))?;

    if json {
        return print_json(&serde_json::json!({"total_cost_usd": total}));
    }
    match total {
        Some(total) => println!("total cost: ${total:.4}"),
        None => println!("no cost recorded"),
    }
    Ok(())
}

fn parse_key_value(s: &str) -> Result<(String, String), String> {
    s.split_once('=')
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .ok_or_else(|| format!("expected key=value, got {s:?}"))
}
