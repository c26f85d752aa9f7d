// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Agent drivers: one subprocess per work unit.

mod claude;
#[cfg(test)]
pub(crate) mod fake;

pub use claude::{ClaudeCliDriver, FileAccess};

use crate::error::EngineError;
use async_trait::async_trait;
use drover_core::WorkerResult;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;

/// Callbacks wired into a driver invocation by its observer.
///
/// `on_event` fires synchronously from the stdout reader for every
/// recognized stream event, so repository writes made inside it are
/// serialized per unit. `on_process_start` fires once, right after spawn.
pub struct StreamHooks {
    pub on_event: Box<dyn Fn(&str, &Value) + Send + Sync>,
    pub on_process_start: Box<dyn Fn(i32) + Send + Sync>,
}

impl StreamHooks {
    /// Hooks that ignore everything.
    pub fn noop() -> Self {
        Self { on_event: Box::new(|_, _| {}), on_process_start: Box::new(|_| {}) }
    }

    pub fn event(&self, event_type: &str, event: &Value) {
        (self.on_event)(event_type, event);
    }

    pub fn process_start(&self, pid: i32) {
        (self.on_process_start)(pid);
    }
}

/// Capability of executing one work unit against the agent tool.
///
/// Implementations never return an error: every failure mode is folded
/// into a `WorkerResult` with `success = false`, which is what the retry
/// machinery consumes.
#[async_trait]
pub trait Driver: Send + Sync {
    async fn execute(
        &self,
        prompt_template: &str,
        payload: &Value,
        timeout: Duration,
        hooks: &StreamHooks,
    ) -> WorkerResult;

    /// Whether the underlying tool can be found on this host.
    fn is_available(&self) -> bool;

    fn name(&self) -> &'static str;
}

/// Options shared by the agent-CLI driver variants.
#[derive(Debug, Clone, Default)]
pub struct DriverOptions {
    pub cli_path: Option<String>,
    pub model: Option<String>,
    pub max_turns: Option<u32>,
}

/// Instantiate a driver by its tag.
pub fn driver_from_tag(
    tag: &str,
    options: DriverOptions,
) -> Result<Arc<dyn Driver>, EngineError> {
    match tag {
        "claude-cli" => Ok(Arc::new(ClaudeCliDriver::new(options, FileAccess::Inherit))),
        "claude-cli-files" => {
            Ok(Arc::new(ClaudeCliDriver::new(options, FileAccess::GrantPayloadDirs)))
        }
        other => Err(EngineError::UnknownWorkerType(other.to_string())),
    }
}
