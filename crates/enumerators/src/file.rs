// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Filesystem enumerator over glob patterns.

use crate::{config_str, config_usize, Enumerate, EnumerateError, EnumerateResult};
use serde_json::{json, Map, Value};
use std::collections::BTreeMap;
use std::path::PathBuf;

/// Enumerate files under a base directory matching a glob pattern.
///
/// Each payload carries `file_path`, `relative_path`, `file_name`,
/// `file_extension`, and `file_size`.
pub struct FileEnumerator {
    base_directory: PathBuf,
    pattern: String,
    exclude_patterns: Vec<String>,
    include_hidden: bool,
    limit: Option<usize>,
}

impl FileEnumerator {
    pub fn from_config(config: &Value) -> Result<Self, EnumerateError> {
        let exclude_patterns = config
            .get("exclude_patterns")
            .and_then(Value::as_array)
            .map(|arr| {
                arr.iter().filter_map(Value::as_str).map(str::to_string).collect::<Vec<_>>()
            })
            .unwrap_or_default();

        Ok(Self {
            base_directory: PathBuf::from(
                config_str(config, "base_directory").unwrap_or_else(|| ".".to_string()),
            ),
            pattern: config_str(config, "pattern").unwrap_or_else(|| "**/*".to_string()),
            exclude_patterns,
            include_hidden: config
                .get("include_hidden")
                .and_then(Value::as_bool)
                .unwrap_or(false),
            limit: config_usize(config, "limit"),
        })
    }
}

impl Enumerate for FileEnumerator {
    fn kind(&self) -> &'static str {
        "file"
    }

    fn validate_config(&self) -> Result<(), EnumerateError> {
        if !self.base_directory.exists() {
            return Err(EnumerateError::InvalidConfig(format!(
                "base directory does not exist: {}",
                self.base_directory.display()
            )));
        }
        if !self.base_directory.is_dir() {
            return Err(EnumerateError::InvalidConfig(format!(
                "base directory is not a directory: {}",
                self.base_directory.display()
            )));
        }
        if self.pattern.is_empty() {
            return Err(EnumerateError::InvalidConfig("pattern cannot be empty".to_string()));
        }
        Ok(())
    }

    fn enumerate(&self) -> Result<EnumerateResult, EnumerateError> {
        self.validate_config()?;

        let base = self
            .base_directory
            .canonicalize()
            .map_err(|e| EnumerateError::Failed(format!("cannot resolve base directory: {e}")))?;

        let full_pattern = base.join(&self.pattern);
        let pattern_str = full_pattern.to_string_lossy();
        let matches = glob::glob(&pattern_str)
            .map_err(|e| EnumerateError::InvalidConfig(format!("bad glob pattern: {e}")))?;

        let excludes: Vec<glob::Pattern> = self
            .exclude_patterns
            .iter()
            .map(|p| {
                glob::Pattern::new(p)
                    .map_err(|e| EnumerateError::InvalidConfig(format!("bad exclude pattern: {e}")))
            })
            .collect::<Result<_, _>>()?;

        let mut items = Vec::new();
        for entry in matches {
            let path = match entry {
                Ok(p) => p,
                Err(_) => continue,
            };
            if !path.is_file() {
                continue;
            }

            let file_name = match path.file_name() {
                Some(name) => name.to_string_lossy().into_owned(),
                None => continue,
            };
            if !self.include_hidden && file_name.starts_with('.') {
                continue;
            }

            let relative = path.strip_prefix(&base).unwrap_or(&path);
            if excludes.iter().any(|p| p.matches_path(relative)) {
                continue;
            }

            let size = std::fs::metadata(&path).map(|m| m.len()).unwrap_or(0);
            let extension = path
                .extension()
                .map(|e| format!(".{}", e.to_string_lossy().to_lowercase()))
                .unwrap_or_default();

            items.push(json!({
                "file_path": path.to_string_lossy(),
                "relative_path": relative.to_string_lossy(),
                "file_name": file_name,
                "file_extension": extension,
                "file_size": size,
            }));

            if let Some(limit) = self.limit {
                if items.len() >= limit {
                    break;
                }
            }
        }

        items.sort_by(|a, b| {
            let a = a["file_path"].as_str().unwrap_or_default();
            let b = b["file_path"].as_str().unwrap_or_default();
            a.cmp(b)
        });

        let mut by_extension: BTreeMap<String, u64> = BTreeMap::new();
        for item in &items {
            let ext = match item["file_extension"].as_str() {
                Some("") | None => "(no extension)",
                Some(ext) => ext,
            };
            *by_extension.entry(ext.to_string()).or_insert(0) += 1;
        }

        let mut metadata = Map::new();
        metadata.insert("base_directory".into(), json!(base.to_string_lossy()));
        metadata.insert("pattern".into(), json!(self.pattern));
        metadata.insert("file_counts_by_extension".into(), json!(by_extension));

        Ok(EnumerateResult::new(items, metadata))
    }
}

#[cfg(test)]
#[path = "file_tests.rs"]
mod tests;
