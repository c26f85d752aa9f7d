// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Command handlers.

pub mod control;
pub mod executor;
pub mod job;

use anyhow::{Context, Result};
use drover_engine::{driver_from_tag, Driver, EngineConfig};
use drover_storage::Repository;
use std::sync::Arc;

/// Open the repository from the configured or default location.
pub(crate) fn open_repository(config: &EngineConfig) -> Result<Repository> {
    match &config.db_path {
        Some(path) => Repository::open(path).context("opening state database"),
        None => Repository::open_default().context("opening state database"),
    }
}

/// Build the driver a command should use, from explicit options.
pub(crate) fn build_driver(
    worker_type: &str,
    cli_path: Option<String>,
    model: Option<String>,
    max_turns: Option<u32>,
) -> Result<Arc<dyn Driver>> {
    let options = drover_engine::driver::DriverOptions { cli_path, model, max_turns };
    driver_from_tag(worker_type, options).context("building agent driver")
}

/// Print a serializable value as pretty JSON.
pub(crate) fn print_json<T: serde::Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
