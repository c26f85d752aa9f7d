// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! CSV enumerator: one payload per row, keyed by header.

use crate::{config_str, config_usize, Enumerate, EnumerateError, EnumerateResult};
use serde_json::{json, Map, Value};
use std::path::PathBuf;

pub struct CsvEnumerator {
    path: PathBuf,
    /// Optional projection; defaults to every column.
    columns: Option<Vec<String>>,
    limit: Option<usize>,
}

impl CsvEnumerator {
    pub fn from_config(config: &Value) -> Result<Self, EnumerateError> {
        let path = config_str(config, "path")
            .ok_or_else(|| EnumerateError::InvalidConfig("csv source requires 'path'".into()))?;
        let columns = config.get("columns").and_then(Value::as_array).map(|arr| {
            arr.iter().filter_map(Value::as_str).map(str::to_string).collect::<Vec<_>>()
        });
        Ok(Self { path: PathBuf::from(path), columns, limit: config_usize(config, "limit") })
    }
}

impl Enumerate for CsvEnumerator {
    fn kind(&self) -> &'static str {
        "csv"
    }

    fn validate_config(&self) -> Result<(), EnumerateError> {
        if !self.path.is_file() {
            return Err(EnumerateError::InvalidConfig(format!(
                "csv file does not exist: {}",
                self.path.display()
            )));
        }
        Ok(())
    }

    fn enumerate(&self) -> Result<EnumerateResult, EnumerateError> {
        self.validate_config()?;

        let mut reader = csv::Reader::from_path(&self.path)
            .map_err(|e| EnumerateError::Failed(format!("cannot open csv: {e}")))?;

        let headers: Vec<String> = reader
            .headers()
            .map_err(|e| EnumerateError::Failed(format!("cannot read csv headers: {e}")))?
            .iter()
            .map(str::to_string)
            .collect();

        let selected: Vec<String> = match &self.columns {
            Some(cols) => {
                for col in cols {
                    if !headers.contains(col) {
                        return Err(EnumerateError::InvalidConfig(format!(
                            "column {col:?} not present in csv headers"
                        )));
                    }
                }
                cols.clone()
            }
            None => headers.clone(),
        };

        let mut items = Vec::new();
        for record in reader.records() {
            let record =
                record.map_err(|e| EnumerateError::Failed(format!("csv parse error: {e}")))?;
            let mut obj = Map::new();
            for (header, field) in headers.iter().zip(record.iter()) {
                if selected.contains(header) {
                    obj.insert(header.clone(), json!(field));
                }
            }
            items.push(Value::Object(obj));

            if let Some(limit) = self.limit {
                if items.len() >= limit {
                    break;
                }
            }
        }

        let mut metadata = Map::new();
        metadata.insert("path".into(), json!(self.path.to_string_lossy()));
        metadata.insert("columns".into(), json!(selected));

        Ok(EnumerateResult::new(items, metadata))
    }
}

#[cfg(test)]
#[path = "csv_source_tests.rs"]
mod tests;
