// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Outcome of a single agent-driver invocation.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Metadata extracted from the agent's terminal `result` event plus the
/// subprocess exit code.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResultMetadata {
    pub session_id: Option<String>,
    pub num_turns: Option<u64>,
    pub total_cost_usd: Option<f64>,
    pub duration_ms: Option<u64>,
    pub duration_api_ms: Option<u64>,
    pub return_code: Option<i32>,
}

/// Result of driving one work unit through the agent tool.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WorkerResult {
    pub success: bool,
    pub output: Option<String>,
    pub error: Option<String>,
    pub execution_time_seconds: Option<f64>,
    pub output_files: Vec<String>,
    pub metadata: ResultMetadata,
    /// Full event stream captured from the agent's stdout.
    pub conversation: Vec<Value>,
    /// The prompt actually sent, after template rendering.
    pub rendered_prompt: Option<String>,
}

impl WorkerResult {
    /// A failed result carrying only an error message and timing.
    pub fn failure(error: impl Into<String>, execution_time_seconds: f64) -> Self {
        Self {
            success: false,
            error: Some(error.into()),
            execution_time_seconds: Some(execution_time_seconds),
            ..Self::default()
        }
    }

    /// Serialize for storage in the unit's `result` column.
    pub fn to_value(&self) -> Value {
        serde_json::to_value(self).unwrap_or(Value::Null)
    }
}
