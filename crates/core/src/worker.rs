// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Worker assignment records.
//!
//! A worker is bookkeeping for one in-flight unit assignment, not an OS
//! process. A fresh record is allocated per assignment and kept as history
//! after the slot is released.

use crate::id::{JobId, UnitId, WorkerId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkerStatus {
    Idle,
    Busy,
    Failed,
    Terminated,
}

crate::status_str! {
    WorkerStatus, "worker" {
        Idle => "idle",
        Busy => "busy",
        Failed => "failed",
        Terminated => "terminated",
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkerProcess {
    pub worker_id: WorkerId,
    pub status: WorkerStatus,
    pub job_id: Option<JobId>,
    pub current_unit_id: Option<UnitId>,
    pub process_id: Option<i32>,
    pub started_at: DateTime<Utc>,
    pub last_heartbeat: Option<DateTime<Utc>>,
    pub units_completed: u32,
    pub units_failed: u32,
    pub total_execution_time: f64,
}

impl WorkerProcess {
    /// Allocate a busy worker record for a new unit assignment.
    pub fn assigned(job_id: JobId, unit_id: UnitId) -> Self {
        Self {
            worker_id: WorkerId::generate(),
            status: WorkerStatus::Busy,
            job_id: Some(job_id),
            current_unit_id: Some(unit_id),
            process_id: None,
            started_at: Utc::now(),
            last_heartbeat: None,
            units_completed: 0,
            units_failed: 0,
            total_execution_time: 0.0,
        }
    }

    pub fn record_completion(&mut self, execution_time: f64) {
        self.units_completed += 1;
        self.total_execution_time += execution_time;
    }

    pub fn record_failure(&mut self) {
        self.units_failed += 1;
    }

    /// Release the worker back to idle once its unit is done.
    pub fn release(&mut self, at: DateTime<Utc>) {
        self.status = WorkerStatus::Idle;
        self.current_unit_id = None;
        self.last_heartbeat = Some(at);
    }
}

crate::builder! {
    pub struct WorkerProcessBuilder => WorkerProcess {
        convert {
            worker_id: WorkerId = WorkerId::new("worker-test"),
        }
        plain {
            status: WorkerStatus = WorkerStatus::Busy,
            units_completed: u32 = 0,
            units_failed: u32 = 0,
            total_execution_time: f64 = 0.0,
        }
        optional {
            job_id: JobId,
            current_unit_id: UnitId,
            process_id: i32,
            last_heartbeat: DateTime<Utc>,
        }
        auto {
            started_at: DateTime<Utc> = Utc::now(),
        }
    }
}

#[cfg(test)]
#[path = "worker_tests.rs"]
mod tests;
