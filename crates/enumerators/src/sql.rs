// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! SQL enumerator: a read-only query against a SQLite file.
//!
//! Every row becomes a payload keyed by column name. The connection is
//! opened read-only so a stray `DELETE` in the config cannot touch the
//! source.

use crate::{config_str, config_usize, Enumerate, EnumerateError, EnumerateResult};
use rusqlite::types::ValueRef;
use rusqlite::{Connection, OpenFlags};
use serde_json::{json, Map, Value};
use std::path::PathBuf;

pub struct SqlEnumerator {
    database: PathBuf,
    query: String,
    limit: Option<usize>,
}

impl SqlEnumerator {
    pub fn from_config(config: &Value) -> Result<Self, EnumerateError> {
        let database = config_str(config, "database").ok_or_else(|| {
            EnumerateError::InvalidConfig("sql source requires 'database'".into())
        })?;
        let query = config_str(config, "query")
            .ok_or_else(|| EnumerateError::InvalidConfig("sql source requires 'query'".into()))?;
        Ok(Self {
            database: PathBuf::from(database),
            query,
            limit: config_usize(config, "limit"),
        })
    }
}

impl Enumerate for SqlEnumerator {
    fn kind(&self) -> &'static str {
        "sql"
    }

    fn validate_config(&self) -> Result<(), EnumerateError> {
        if !self.database.is_file() {
            return Err(EnumerateError::InvalidConfig(format!(
                "database does not exist: {}",
                self.database.display()
            )));
        }
        if self.query.trim().is_empty() {
            return Err(EnumerateError::InvalidConfig("query cannot be empty".into()));
        }
        Ok(())
    }

    fn enumerate(&self) -> Result<EnumerateResult, EnumerateError> {
        self.validate_config()?;

        let conn = Connection::open_with_flags(
            &self.database,
            OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )
        .map_err(|e| EnumerateError::Failed(format!("cannot open database: {e}")))?;

        let mut stmt = conn
            .prepare(&self.query)
            .map_err(|e| EnumerateError::InvalidConfig(format!("bad query: {e}")))?;
        let columns: Vec<String> = stmt.column_names().iter().map(|c| c.to_string()).collect();

        let mut rows = stmt
            .query([])
            .map_err(|e| EnumerateError::Failed(format!("query failed: {e}")))?;

        let mut items = Vec::new();
        loop {
            let row = match rows.next() {
                Ok(Some(row)) => row,
                Ok(None) => break,
                Err(e) => return Err(EnumerateError::Failed(format!("query failed: {e}"))),
            };

            let mut obj = Map::new();
            for (i, column) in columns.iter().enumerate() {
                let value = match row.get_ref(i) {
                    Ok(ValueRef::Null) => Value::Null,
                    Ok(ValueRef::Integer(v)) => json!(v),
                    Ok(ValueRef::Real(v)) => json!(v),
                    Ok(ValueRef::Text(v)) => json!(String::from_utf8_lossy(v)),
                    Ok(ValueRef::Blob(_)) => Value::Null,
                    Err(e) => return Err(EnumerateError::Failed(format!("bad column: {e}"))),
                };
                obj.insert(column.clone(), value);
            }
            items.push(Value::Object(obj));

            if let Some(limit) = self.limit {
                if items.len() >= limit {
                    break;
                }
            }
        }

        let mut metadata = Map::new();
        metadata.insert("database".into(), json!(self.database.to_string_lossy()));
        metadata.insert("columns".into(), json!(columns));

        Ok(EnumerateResult::new(items, metadata))
    }
}

#[cfg(test)]
#[path = "sql_tests.rs"]
mod tests;
