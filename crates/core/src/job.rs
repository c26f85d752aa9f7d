// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Job entity and state machine.

use crate::defaults;
use crate::id::{JobId, UnitId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Open metadata bag carried by a job.
///
/// Holds executor bookkeeping (`executor_pid`, `killed_at`, ...) plus any
/// hints forwarded from enumeration or prompt synthesis. Unknown keys are
/// opaque to readers and writers alike.
pub type Metadata = serde_json::Map<String, Value>;

/// Lifecycle status of a job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    /// Created, units persisted, not yet started
    Created,
    /// Test unit ran; awaiting user approval
    Testing,
    /// Executor is dispatching units
    Running,
    /// Stopped with pending units outstanding and no live executor
    Paused,
    /// Synthesis unit is running
    PostProcessing,
    Completed,
    Failed,
}

crate::status_str! {
    JobStatus, "job" {
        Created => "created",
        Testing => "testing",
        Running => "running",
        Paused => "paused",
        PostProcessing => "post_processing",
        Completed => "completed",
        Failed => "failed",
    }
}

/// Configuration for creating a new job.
#[derive(Debug, Clone)]
pub struct JobConfig {
    pub name: String,
    pub description: String,
    pub worker_prompt_template: String,
    pub unit_type: String,
    pub total_units: u32,
    pub max_workers: u32,
    pub post_processing_prompt: Option<String>,
    pub bypass_failures: bool,
    pub metadata: Metadata,
}

impl JobConfig {
    pub fn new(
        name: impl Into<String>,
        description: impl Into<String>,
        worker_prompt_template: impl Into<String>,
        unit_type: impl Into<String>,
        total_units: u32,
    ) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            worker_prompt_template: worker_prompt_template.into(),
            unit_type: unit_type.into(),
            total_units,
            max_workers: defaults::MAX_WORKERS,
            post_processing_prompt: None,
            bypass_failures: false,
            metadata: Metadata::new(),
        }
    }

    pub fn max_workers(mut self, v: u32) -> Self {
        self.max_workers = v.max(1);
        self
    }

    pub fn post_processing_prompt(mut self, v: impl Into<String>) -> Self {
        self.post_processing_prompt = Some(v.into());
        self
    }

    pub fn bypass_failures(mut self, v: bool) -> Self {
        self.bypass_failures = v;
        self
    }

    pub fn metadata(mut self, v: Metadata) -> Self {
        self.metadata = v;
        self
    }
}

/// A named batch of work units sharing a prompt template and configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Job {
    pub job_id: JobId,
    pub name: String,
    pub description: String,
    pub status: JobStatus,
    pub worker_prompt_template: String,
    pub unit_type: String,
    pub total_units: u32,
    pub completed_units: u32,
    pub failed_units: u32,
    pub max_workers: u32,
    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    /// Unit used for the test phase, if one ran.
    pub test_unit_id: Option<UnitId>,
    pub test_passed: bool,
    pub output_strategy: String,
    pub metadata: Metadata,
    pub post_processing_prompt: Option<String>,
    /// Synthetic synthesis unit. Never counted in `total_units`.
    pub post_processing_unit_id: Option<UnitId>,
    /// Allow post-processing to run even when some units failed permanently.
    pub bypass_failures: bool,
}

impl Job {
    pub fn new(config: JobConfig) -> Self {
        Self {
            job_id: JobId::generate(),
            name: config.name,
            description: config.description,
            status: JobStatus::Created,
            worker_prompt_template: config.worker_prompt_template,
            unit_type: config.unit_type,
            total_units: config.total_units,
            completed_units: 0,
            failed_units: 0,
            max_workers: config.max_workers.max(1),
            created_at: Utc::now(),
            started_at: None,
            completed_at: None,
            test_unit_id: None,
            test_passed: false,
            output_strategy: "individual".to_string(),
            metadata: config.metadata,
            post_processing_prompt: config.post_processing_prompt,
            post_processing_unit_id: None,
            bypass_failures: config.bypass_failures,
        }
    }

    /// Completion percentage over regular units. Zero-unit jobs report 0.
    pub fn progress_percentage(&self) -> f64 {
        if self.total_units == 0 {
            return 0.0;
        }
        (self.completed_units as f64 / self.total_units as f64) * 100.0
    }

    /// True when the given unit id is this job's synthesis unit.
    pub fn is_post_processing_unit(&self, unit_id: &UnitId) -> bool {
        self.post_processing_unit_id.as_ref() == Some(unit_id)
    }

    // Metadata accessors for well-known keys. The bag itself stays open:
    // anything not listed here is carried through untouched.

    pub fn meta_str(&self, key: &str) -> Option<&str> {
        self.metadata.get(key).and_then(Value::as_str)
    }

    pub fn meta_u64(&self, key: &str) -> Option<u64> {
        self.metadata.get(key).and_then(Value::as_u64)
    }

    pub fn insert_meta(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.metadata.insert(key.into(), value.into());
    }

    /// PID of the detached executor, if one was recorded.
    pub fn executor_pid(&self) -> Option<i32> {
        self.metadata.get("executor_pid").and_then(Value::as_i64).map(|p| p as i32)
    }

    pub fn record_executor_spawn(&mut self, pid: i32, at: DateTime<Utc>) {
        self.insert_meta("executor_pid", pid);
        self.insert_meta("executor_started_at", at.to_rfc3339());
    }

    pub fn record_executor_completed(&mut self, at: DateTime<Utc>) {
        self.insert_meta("executor_completed_at", at.to_rfc3339());
    }

    pub fn record_executor_error(&mut self, error: &str, at: DateTime<Utc>) {
        self.insert_meta("executor_error", error);
        self.insert_meta("executor_error_at", at.to_rfc3339());
    }

    pub fn record_kill(&mut self, reason: &str, at: DateTime<Utc>) {
        self.insert_meta("killed_at", at.to_rfc3339());
        self.insert_meta("kill_reason", reason);
    }

    /// Driver tag the detached executor should instantiate.
    pub fn worker_type(&self) -> Option<&str> {
        self.meta_str("worker_type")
    }

    pub fn worker_model(&self) -> Option<&str> {
        self.meta_str("worker_model")
    }

    pub fn worker_max_turns(&self) -> Option<u32> {
        self.meta_u64("worker_max_turns").map(|v| v as u32)
    }

    /// Per-unit retry ceiling forwarded for the post-processing unit.
    pub fn post_processing_max_retries(&self) -> u32 {
        self.meta_u64("max_retries").map_or(crate::defaults::MAX_RETRIES, |v| v as u32)
    }
}

crate::builder! {
    pub struct JobBuilder => Job {
        convert {
            job_id: JobId = JobId::new("job-test"),
            name: String = "test-job".to_string(),
            description: String = "test job".to_string(),
            worker_prompt_template: String = "process {payload}".to_string(),
            unit_type: String = "items".to_string(),
            output_strategy: String = "individual".to_string(),
        }
        plain {
            status: JobStatus = JobStatus::Created,
            total_units: u32 = 0,
            completed_units: u32 = 0,
            failed_units: u32 = 0,
            max_workers: u32 = 2,
            test_passed: bool = false,
            bypass_failures: bool = false,
            metadata: Metadata = Metadata::new(),
        }
        optional {
            started_at: DateTime<Utc>,
            completed_at: DateTime<Utc>,
            test_unit_id: UnitId,
            post_processing_prompt: String,
            post_processing_unit_id: UnitId,
        }
        auto {
            created_at: DateTime<Utc> = Utc::now(),
        }
    }
}

#[cfg(test)]
#[path = "job_tests.rs"]
mod tests;
