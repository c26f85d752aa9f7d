// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Engine error types.

use drover_core::JobStatus;
use drover_enumerators::EnumerateError;
use drover_storage::StorageError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),
    #[error(transparent)]
    Enumerate(#[from] EnumerateError),
    #[error("no items found to process")]
    NoItems,
    #[error("job not found: {0}")]
    JobNotFound(String),
    #[error("work unit not found: {0}")]
    UnitNotFound(String),
    #[error("work unit {unit_id} does not belong to job {job_id}")]
    UnitJobMismatch { unit_id: String, job_id: String },
    #[error("cannot start job in {0} status")]
    InvalidJobState(JobStatus),
    #[error("no pending units to test")]
    NoPendingUnits,
    #[error("unknown worker type: {0}")]
    UnknownWorkerType(String),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl EngineError {
    /// True when the failure is database contention the caller should
    /// retry rather than treat as fatal.
    pub fn is_busy(&self) -> bool {
        matches!(self, EngineError::Storage(e) if e.is_busy())
    }
}
