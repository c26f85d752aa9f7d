// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Item enumerators: pluggable producers of work-unit payloads.
//!
//! An enumerator turns a source description (a glob, a CSV file, a SQL
//! query, an inline list) into a list of JSON payloads, one per future
//! work unit. Enumeration happens entirely server-side; only the payloads
//! enter the system.

mod csv_source;
mod file;
mod items;
mod json_source;
mod sql;

pub use csv_source::CsvEnumerator;
pub use file::FileEnumerator;
pub use items::ItemsEnumerator;
pub use json_source::JsonEnumerator;
pub use sql::SqlEnumerator;

use serde_json::{Map, Value};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum EnumerateError {
    #[error("unknown enumerator type: {0}")]
    UnknownType(String),
    #[error("invalid enumerator config: {0}")]
    InvalidConfig(String),
    #[error("enumeration failed: {0}")]
    Failed(String),
}

/// Result of a successful enumeration.
#[derive(Debug, Clone, Default)]
pub struct EnumerateResult {
    /// One payload object per item.
    pub items: Vec<Value>,
    pub total_count: usize,
    /// Source-specific facts: column names, extension histograms, ...
    pub metadata: Map<String, Value>,
}

impl EnumerateResult {
    pub fn new(items: Vec<Value>, metadata: Map<String, Value>) -> Self {
        let total_count = items.len();
        Self { items, total_count, metadata }
    }
}

/// Capability the core depends on: validate, then produce payloads.
pub trait Enumerate {
    /// Tag this enumerator registers under.
    fn kind(&self) -> &'static str;

    /// Check the configuration without touching the source.
    fn validate_config(&self) -> Result<(), EnumerateError>;

    fn enumerate(&self) -> Result<EnumerateResult, EnumerateError>;
}

/// Build an enumerator from its tag and JSON configuration.
///
/// The `dynamic` tag maps to the inline-items enumerator: user-approved
/// enumeration code runs outside this process and hands its result in as
/// a literal list.
pub fn create_enumerator(tag: &str, config: &Value) -> Result<Box<dyn Enumerate>, EnumerateError> {
    match tag {
        "file" => Ok(Box::new(FileEnumerator::from_config(config)?)),
        "csv" => Ok(Box::new(CsvEnumerator::from_config(config)?)),
        "json" => Ok(Box::new(JsonEnumerator::from_config(config)?)),
        "sql" => Ok(Box::new(SqlEnumerator::from_config(config)?)),
        "items" | "dynamic" => Ok(Box::new(ItemsEnumerator::from_config(config)?)),
        other => Err(EnumerateError::UnknownType(other.to_string())),
    }
}

pub(crate) fn config_str(config: &Value, key: &str) -> Option<String> {
    config.get(key).and_then(Value::as_str).map(str::to_string)
}

pub(crate) fn config_usize(config: &Value, key: &str) -> Option<usize> {
    config.get(key).and_then(Value::as_u64).map(|v| v as usize)
}

/// Payloads must be objects so placeholder substitution has fields to
/// read. Bare scalars are wrapped under a `value` key.
pub(crate) fn ensure_object(item: Value) -> Value {
    match item {
        Value::Object(_) => item,
        other => {
            let mut map = Map::new();
            map.insert("value".to_string(), other);
            Value::Object(map)
        }
    }
}
