// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Default configuration values shared across crates.

/// Default number of concurrent workers per job.
pub const MAX_WORKERS: u32 = 4;

/// Default per-unit retry ceiling.
pub const MAX_RETRIES: u32 = 3;

/// Default wall-clock timeout for a single agent invocation, in seconds.
pub const WORKER_TIMEOUT_SECS: u64 = 600;

/// Default SQLite busy timeout, in milliseconds.
pub const DB_BUSY_TIMEOUT_MS: u64 = 30_000;

/// Directory under `$HOME` holding the state database.
pub const STORAGE_DIR: &str = ".drover";

/// Database file name inside [`STORAGE_DIR`].
pub const DB_FILENAME: &str = "drover.db";

/// Default page sizes for list queries.
pub const JOB_LIST_LIMIT: usize = 50;
pub const UNIT_LIST_LIMIT: usize = 100;
pub const LOG_LIST_LIMIT: usize = 100;

/// Truncation limits for live-activity previews.
pub const PREVIEW_TEXT_LIMIT: usize = 200;
pub const PREVIEW_INPUT_LIMIT: usize = 100;
