// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Append-only operational log entries.

use crate::id::{JobId, UnitId, WorkerId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogLevel {
    Debug,
    Info,
    Warning,
    Error,
}

crate::status_str! {
    LogLevel, "log level" {
        Debug => "debug",
        Info => "info",
        Warning => "warning",
        Error => "error",
    }
}

/// One operational breadcrumb, keyed by job.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogEntry {
    /// Assigned by the database on insert.
    pub id: Option<i64>,
    pub job_id: JobId,
    /// Emitting component: "executor", "worker", "pool", "orchestrator", ...
    pub source: String,
    pub level: LogLevel,
    pub message: String,
    pub timestamp: DateTime<Utc>,
    pub worker_id: Option<WorkerId>,
    pub unit_id: Option<UnitId>,
    pub extra: Option<Value>,
}

impl LogEntry {
    pub fn new(
        job_id: JobId,
        source: impl Into<String>,
        level: LogLevel,
        message: impl Into<String>,
    ) -> Self {
        Self {
            id: None,
            job_id,
            source: source.into(),
            level,
            message: message.into(),
            timestamp: Utc::now(),
            worker_id: None,
            unit_id: None,
            extra: None,
        }
    }

    pub fn worker_id(mut self, v: WorkerId) -> Self {
        self.worker_id = Some(v);
        self
    }

    pub fn unit_id(mut self, v: UnitId) -> Self {
        self.unit_id = Some(v);
        self
    }

    pub fn extra(mut self, v: Value) -> Self {
        self.extra = Some(v);
        self
    }
}
