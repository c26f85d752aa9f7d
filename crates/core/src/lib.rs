// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Core data model for drover batch processing.
//!
//! Defines the entities shared by every process that touches the state
//! database: jobs, work units, worker records, log entries, and the
//! result type produced by agent drivers.

pub mod defaults;
pub mod id;
pub mod job;
pub mod log;
pub mod macros;
pub mod result;
pub mod unit;
pub mod worker;

pub use id::{JobId, UnitId, WorkerId};
pub use job::{Job, JobConfig, JobStatus, Metadata};
pub use log::{LogEntry, LogLevel};
pub use result::{ResultMetadata, WorkerResult};
pub use unit::{WorkUnit, WorkUnitStatus, POST_PROCESSING_TYPE};
pub use worker::{WorkerProcess, WorkerStatus};

use thiserror::Error;

/// Error returned when parsing a status string from the database.
#[derive(Debug, Error, PartialEq, Eq)]
#[error("unknown {kind} status: {value:?}")]
pub struct ParseStatusError {
    pub kind: &'static str,
    pub value: String,
}
