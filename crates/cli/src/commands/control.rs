// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `drover stop/kill/kill-unit/restart-unit/resume`

use super::{open_repository, print_json};
use anyhow::Result;
use clap::Args;
use drover_core::{JobId, UnitId};
use drover_engine::{controls, EngineConfig};

#[derive(Args)]
pub struct StopArgs {
    /// Job ID
    pub job_id: String,
}

pub fn stop(args: StopArgs, json: bool) -> Result<()> {
    let repository = open_repository(&EngineConfig::from_env())?;
    let sent = controls::stop_executor(&repository, &JobId::new(args.job_id))?;

    if json {
        return print_json(&serde_json::json!({"signal_sent": sent}));
    }
    if sent {
        println!("stop signal sent; the executor will finish current work and exit");
    } else {
        println!("no running executor to stop");
    }
    Ok(())
}

#[derive(Args)]
pub struct KillArgs {
    /// Job ID
    pub job_id: String,
}

pub fn kill(args: KillArgs, json: bool) -> Result<()> {
    let repository = open_repository(&EngineConfig::from_env())?;
    let result = controls::kill_executor(&repository, &JobId::new(args.job_id))?;

    if json {
        return print_json(&result);
    }
    println!("{}", result.message);
    Ok(())
}

#[derive(Args)]
pub struct KillUnitArgs {
    /// Job ID
    pub job_id: String,
    /// Work unit ID
    pub unit_id: String,
}

pub fn kill_unit(args: KillUnitArgs, json: bool) -> Result<()> {
    let repository = open_repository(&EngineConfig::from_env())?;
    let result = controls::kill_work_unit(
        &repository,
        &JobId::new(args.job_id),
        &UnitId::new(args.unit_id),
    )?;

    if json {
        return print_json(&result);
    }
    println!("{}", result.message);
    Ok(())
}

#[derive(Args)]
pub struct RestartUnitArgs {
    /// Job ID
    pub job_id: String,
    /// Work unit ID
    pub unit_id: String,
}

pub fn restart_unit(args: RestartUnitArgs, json: bool) -> Result<()> {
    let repository = open_repository(&EngineConfig::from_env())?;
    let result = controls::restart_work_unit(
        &repository,
        &JobId::new(args.job_id),
        &UnitId::new(args.unit_id),
    )?;

    if json {
        return print_json(&result);
    }
    println!("{}", result.message);
    Ok(())
}

#[derive(Args)]
pub struct ResumeArgs {
    /// Job ID
    pub job_id: String,
}

pub fn resume(args: ResumeArgs, json: bool) -> Result<()> {
    let repository = open_repository(&EngineConfig::from_env())?;
    let pid = controls::resume_job(&repository, &JobId::new(args.job_id))?;

    if json {
        return print_json(&serde_json::json!({"executor_pid": pid}));
    }
    match pid {
        Some(pid) => println!("executor running with pid {pid}"),
        None => println!("nothing to resume (no pending units, or job not found)"),
    }
    Ok(())
}
