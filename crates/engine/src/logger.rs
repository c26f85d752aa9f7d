// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Database-backed job logger.
//!
//! Every noteworthy transition lands as a row in the `logs` table so
//! observers can reconstruct a run without access to the executor's
//! stderr. Log writes are best-effort: a full disk or a locked database
//! must not take down the run it is describing.

use drover_core::{JobId, LogEntry, LogLevel, UnitId, WorkerId};
use drover_storage::Repository;
use serde_json::Value;

#[derive(Clone)]
pub struct JobLogger {
    repository: Repository,
    job_id: JobId,
    source: &'static str,
}

impl JobLogger {
    pub fn new(repository: Repository, job_id: JobId, source: &'static str) -> Self {
        Self { repository, job_id, source }
    }

    pub fn debug(&self, message: impl Into<String>) {
        self.with().write(LogLevel::Debug, message);
    }

    pub fn info(&self, message: impl Into<String>) {
        self.with().write(LogLevel::Info, message);
    }

    pub fn warning(&self, message: impl Into<String>) {
        self.with().write(LogLevel::Warning, message);
    }

    pub fn error(&self, message: impl Into<String>) {
        self.with().write(LogLevel::Error, message);
    }

    /// Start a line with correlation ids or extra context attached.
    pub fn with(&self) -> LogLine<'_> {
        LogLine { logger: self, unit_id: None, worker_id: None, extra: None }
    }
}

/// Builder for one log line.
pub struct LogLine<'a> {
    logger: &'a JobLogger,
    unit_id: Option<UnitId>,
    worker_id: Option<WorkerId>,
    extra: Option<Value>,
}

impl LogLine<'_> {
    pub fn unit(mut self, unit_id: &UnitId) -> Self {
        self.unit_id = Some(unit_id.clone());
        self
    }

    pub fn worker(mut self, worker_id: &WorkerId) -> Self {
        self.worker_id = Some(worker_id.clone());
        self
    }

    pub fn extra(mut self, extra: Value) -> Self {
        self.extra = Some(extra);
        self
    }

    pub fn debug(self, message: impl Into<String>) {
        self.write(LogLevel::Debug, message);
    }

    pub fn info(self, message: impl Into<String>) {
        self.write(LogLevel::Info, message);
    }

    pub fn warning(self, message: impl Into<String>) {
        self.write(LogLevel::Warning, message);
    }

    pub fn error(self, message: impl Into<String>) {
        self.write(LogLevel::Error, message);
    }

    fn write(self, level: LogLevel, message: impl Into<String>) {
        let message = message.into();
        let logger = self.logger;

        match level {
            LogLevel::Debug => tracing::debug!(source = logger.source, "{message}"),
            LogLevel::Info => tracing::info!(source = logger.source, "{message}"),
            LogLevel::Warning => tracing::warn!(source = logger.source, "{message}"),
            LogLevel::Error => tracing::error!(source = logger.source, "{message}"),
        }

        let mut entry =
            LogEntry::new(logger.job_id.clone(), logger.source, level, message);
        entry.worker_id = self.worker_id;
        entry.unit_id = self.unit_id;
        entry.extra = self.extra;

        if let Err(e) = logger.repository.add_log(&entry) {
            tracing::warn!(error = %e, "failed to write log entry");
        }
    }
}
