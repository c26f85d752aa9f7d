// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Engine configuration from the environment.

use drover_core::defaults;
use std::path::PathBuf;
use std::time::Duration;

/// Recognized environment variables.
pub const ENV_DB: &str = "DROVER_DB";
pub const ENV_MAX_WORKERS: &str = "DROVER_MAX_WORKERS";
pub const ENV_MAX_RETRIES: &str = "DROVER_MAX_RETRIES";
pub const ENV_SKIP_TEST: &str = "DROVER_SKIP_TEST";
pub const ENV_WORKER_TIMEOUT: &str = "DROVER_WORKER_TIMEOUT";
pub const ENV_DASHBOARD_PORT: &str = "DROVER_DASHBOARD_PORT";

/// Defaults used by newly created jobs and by the executor, overridable
/// per-variable from the environment.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// State database location. `None` means the well-known default
    /// under the user's home directory.
    pub db_path: Option<PathBuf>,
    pub max_workers: u32,
    pub max_retries: u32,
    /// When set, `start_job` on a created job bypasses the test phase.
    pub skip_test: bool,
    pub worker_timeout: Duration,
    /// Port an external read-only dashboard binds to. Recognized here so
    /// every surface agrees on the value; nothing in this crate serves it.
    pub dashboard_port: u16,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            db_path: None,
            max_workers: defaults::MAX_WORKERS,
            max_retries: defaults::MAX_RETRIES,
            skip_test: false,
            worker_timeout: Duration::from_secs(defaults::WORKER_TIMEOUT_SECS),
            dashboard_port: 8080,
        }
    }
}

impl EngineConfig {
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(path) = std::env::var(ENV_DB) {
            if !path.is_empty() {
                config.db_path = Some(PathBuf::from(path));
            }
        }
        if let Some(v) = env_parse::<u32>(ENV_MAX_WORKERS) {
            config.max_workers = v.max(1);
        }
        if let Some(v) = env_parse::<u32>(ENV_MAX_RETRIES) {
            config.max_retries = v;
        }
        config.skip_test = env_truthy(ENV_SKIP_TEST);
        if let Some(v) = env_parse::<u64>(ENV_WORKER_TIMEOUT) {
            config.worker_timeout = Duration::from_secs(v);
        }
        if let Some(v) = env_parse::<u16>(ENV_DASHBOARD_PORT) {
            config.dashboard_port = v;
        }

        config
    }
}

fn env_parse<T: std::str::FromStr>(name: &str) -> Option<T> {
    std::env::var(name).ok().and_then(|v| v.parse().ok())
}

fn env_truthy(name: &str) -> bool {
    matches!(
        std::env::var(name).unwrap_or_default().to_lowercase().as_str(),
        "1" | "true" | "yes"
    )
}
