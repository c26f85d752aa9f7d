// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! JSON enumerator: a top-level array, or an object with an `items` array.

use crate::{config_str, config_usize, ensure_object, Enumerate, EnumerateError, EnumerateResult};
use serde_json::{json, Map, Value};
use std::path::PathBuf;

pub struct JsonEnumerator {
    path: PathBuf,
    limit: Option<usize>,
}

impl JsonEnumerator {
    pub fn from_config(config: &Value) -> Result<Self, EnumerateError> {
        let path = config_str(config, "path")
            .ok_or_else(|| EnumerateError::InvalidConfig("json source requires 'path'".into()))?;
        Ok(Self { path: PathBuf::from(path), limit: config_usize(config, "limit") })
    }
}

impl Enumerate for JsonEnumerator {
    fn kind(&self) -> &'static str {
        "json"
    }

    fn validate_config(&self) -> Result<(), EnumerateError> {
        if !self.path.is_file() {
            return Err(EnumerateError::InvalidConfig(format!(
                "json file does not exist: {}",
                self.path.display()
            )));
        }
        Ok(())
    }

    fn enumerate(&self) -> Result<EnumerateResult, EnumerateError> {
        self.validate_config()?;

        let raw = std::fs::read_to_string(&self.path)
            .map_err(|e| EnumerateError::Failed(format!("cannot read json: {e}")))?;
        let parsed: Value = serde_json::from_str(&raw)
            .map_err(|e| EnumerateError::Failed(format!("invalid json: {e}")))?;

        let array = match parsed {
            Value::Array(items) => items,
            Value::Object(mut obj) => match obj.remove("items") {
                Some(Value::Array(items)) => items,
                _ => {
                    return Err(EnumerateError::Failed(
                        "json must be an array or an object with an 'items' array".into(),
                    ))
                }
            },
            _ => {
                return Err(EnumerateError::Failed(
                    "json must be an array or an object with an 'items' array".into(),
                ))
            }
        };

        let mut items: Vec<Value> = array.into_iter().map(ensure_object).collect();
        if let Some(limit) = self.limit {
            items.truncate(limit);
        }

        let mut metadata = Map::new();
        metadata.insert("path".into(), json!(self.path.to_string_lossy()));

        Ok(EnumerateResult::new(items, metadata))
    }
}
