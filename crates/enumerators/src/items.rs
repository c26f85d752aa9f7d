// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Inline-list enumerator.
//!
//! The caller hands the items in directly; this is the seam for
//! user-approved dynamic enumeration, whose code runs elsewhere.

use crate::{ensure_object, Enumerate, EnumerateError, EnumerateResult};
use serde_json::{Map, Value};

pub struct ItemsEnumerator {
    items: Vec<Value>,
}

impl ItemsEnumerator {
    pub fn from_config(config: &Value) -> Result<Self, EnumerateError> {
        let items = config
            .get("items")
            .and_then(Value::as_array)
            .ok_or_else(|| {
                EnumerateError::InvalidConfig("items source requires an 'items' array".into())
            })?
            .clone();
        Ok(Self { items })
    }
}

impl Enumerate for ItemsEnumerator {
    fn kind(&self) -> &'static str {
        "items"
    }

    fn validate_config(&self) -> Result<(), EnumerateError> {
        Ok(())
    }

    fn enumerate(&self) -> Result<EnumerateResult, EnumerateError> {
        let items: Vec<Value> = self.items.iter().cloned().map(ensure_object).collect();
        Ok(EnumerateResult::new(items, Map::new()))
    }
}
