// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Work unit entity.

use crate::defaults;
use crate::id::{JobId, UnitId, WorkerId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Unit type tag reserved for the synthesis step.
pub const POST_PROCESSING_TYPE: &str = "post_processing";

/// Lifecycle status of a work unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkUnitStatus {
    Pending,
    Assigned,
    Processing,
    Completed,
    Failed,
}

crate::status_str! {
    WorkUnitStatus, "work unit" {
        Pending => "pending",
        Assigned => "assigned",
        Processing => "processing",
        Completed => "completed",
        Failed => "failed",
    }
}

/// One item of work, processed by a single agent subprocess invocation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkUnit {
    pub unit_id: UnitId,
    pub job_id: JobId,
    pub unit_type: String,
    pub status: WorkUnitStatus,
    /// Opaque input. Immutable after creation; placeholder substitution
    /// may read top-level fields.
    pub payload: Value,
    pub created_at: DateTime<Utc>,
    pub assigned_at: Option<DateTime<Utc>>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub worker_id: Option<WorkerId>,
    pub result: Option<Value>,
    pub error: Option<String>,
    pub retry_count: u32,
    pub max_retries: u32,
    pub execution_time_seconds: Option<f64>,
    pub output_files: Vec<String>,
    pub rendered_prompt: Option<String>,
    /// Ordered stream of agent events captured during execution.
    pub conversation: Option<Vec<Value>>,
    pub session_id: Option<String>,
    pub cost_usd: Option<f64>,
    /// OS pid of the running agent subprocess. A stale value is a hint only.
    pub process_id: Option<i32>,
}

impl WorkUnit {
    pub fn new(job_id: JobId, unit_type: impl Into<String>, payload: Value) -> Self {
        Self {
            unit_id: UnitId::generate(),
            job_id,
            unit_type: unit_type.into(),
            status: WorkUnitStatus::Pending,
            payload,
            created_at: Utc::now(),
            assigned_at: None,
            started_at: None,
            completed_at: None,
            worker_id: None,
            result: None,
            error: None,
            retry_count: 0,
            max_retries: defaults::MAX_RETRIES,
            execution_time_seconds: None,
            output_files: Vec::new(),
            rendered_prompt: None,
            conversation: None,
            session_id: None,
            cost_usd: None,
            process_id: None,
        }
    }

    pub fn max_retries(mut self, v: u32) -> Self {
        self.max_retries = v;
        self
    }

    /// True while the automatic retry budget is not exhausted.
    pub fn can_retry(&self) -> bool {
        self.retry_count < self.max_retries
    }

    pub fn is_post_processing(&self) -> bool {
        self.unit_type == POST_PROCESSING_TYPE
    }

    pub fn mark_assigned(&mut self, worker_id: WorkerId, at: DateTime<Utc>) {
        self.status = WorkUnitStatus::Assigned;
        self.worker_id = Some(worker_id);
        self.assigned_at = Some(at);
    }

    pub fn mark_processing(&mut self, at: DateTime<Utc>) {
        self.status = WorkUnitStatus::Processing;
        self.started_at = Some(at);
    }

    /// Return the unit to the queue after a retriable failure.
    ///
    /// Assignment fields are cleared; artifacts of the failed attempt
    /// (error, conversation, timings) are left in place for inspection
    /// until the next attempt overwrites them.
    pub fn reset_for_retry(&mut self) {
        self.status = WorkUnitStatus::Pending;
        self.retry_count += 1;
        self.worker_id = None;
        self.assigned_at = None;
        self.started_at = None;
    }

    /// Reset every per-attempt field for a manual restart.
    ///
    /// `retry_count` deliberately survives so total attempts stay visible
    /// across manual restarts.
    pub fn reset_for_restart(&mut self) {
        self.status = WorkUnitStatus::Pending;
        self.error = None;
        self.result = None;
        self.worker_id = None;
        self.assigned_at = None;
        self.started_at = None;
        self.completed_at = None;
        self.execution_time_seconds = None;
        self.process_id = None;
        self.conversation = None;
        self.rendered_prompt = None;
        self.session_id = None;
        self.cost_usd = None;
    }
}

crate::builder! {
    pub struct WorkUnitBuilder => WorkUnit {
        convert {
            unit_id: UnitId = UnitId::new("unit-test"),
            job_id: JobId = JobId::new("job-test"),
            unit_type: String = "items".to_string(),
        }
        plain {
            status: WorkUnitStatus = WorkUnitStatus::Pending,
            payload: Value = serde_json::json!({}),
            retry_count: u32 = 0,
            max_retries: u32 = 3,
            output_files: Vec<String> = Vec::new(),
        }
        optional {
            assigned_at: DateTime<Utc>,
            started_at: DateTime<Utc>,
            completed_at: DateTime<Utc>,
            worker_id: WorkerId,
            result: Value,
            error: String,
            execution_time_seconds: f64,
            rendered_prompt: String,
            conversation: Vec<Value>,
            session_id: String,
            cost_usd: f64,
            process_id: i32,
        }
        auto {
            created_at: DateTime<Utc> = Utc::now(),
        }
    }
}

#[cfg(test)]
#[path = "unit_tests.rs"]
mod tests;
