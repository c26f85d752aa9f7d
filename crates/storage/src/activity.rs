// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Live-activity view over in-flight units.
//!
//! Dashboards poll this instead of pulling whole conversations: for each
//! active unit only the most recent meaningful event is extracted.

use crate::{from_json_str, parse_status, Repository, StorageError};
use drover_core::{defaults, JobId, UnitId, WorkUnitStatus};
use rusqlite::params;
use serde::Serialize;
use serde_json::Value;

/// The latest meaningful event of a unit's conversation: the final
/// assistant text block, or the last tool invocation with a truncated
/// input preview.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum LatestEvent {
    Text { content: String },
    ToolUse { tool: String, input_preview: String },
}

/// One in-flight unit as shown by live-activity polling.
#[derive(Debug, Clone, Serialize)]
pub struct ActiveUnit {
    pub unit_id: UnitId,
    pub payload: Value,
    pub status: WorkUnitStatus,
    pub process_id: Option<i32>,
    pub latest_event: Option<LatestEvent>,
}

impl Repository {
    /// Active (`assigned`/`processing`) units with their latest
    /// conversation snippet, most recently started first.
    pub fn get_active_units_with_latest_conversation(
        &self,
        job_id: &JobId,
    ) -> Result<Vec<ActiveUnit>, StorageError> {
        let conn = self.connect()?;
        let mut stmt = conn.prepare(
            "SELECT unit_id, payload, status, process_id, conversation
             FROM work_units
             WHERE job_id = ?1 AND status IN ('processing', 'assigned')
             ORDER BY started_at DESC",
        )?;

        let rows: Vec<(String, String, String, Option<i32>, Option<String>)> = stmt
            .query_map(params![job_id.as_str()], |row| {
                Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?, row.get(4)?))
            })?
            .collect::<Result<_, _>>()?;

        rows.into_iter()
            .map(|(unit_id, payload, status, process_id, conversation)| {
                Ok(ActiveUnit {
                    unit_id: UnitId::new(unit_id),
                    payload: from_json_str(&payload)?,
                    status: parse_status(&status)?,
                    process_id,
                    latest_event: conversation.as_deref().and_then(extract_latest_event),
                })
            })
            .collect()
    }
}

/// Walk the conversation backwards for the newest assistant text block or
/// tool invocation. Malformed JSON yields `None` rather than an error:
/// a torn read of a row mid-append must not break the poll.
fn extract_latest_event(conversation_json: &str) -> Option<LatestEvent> {
    let conversation: Vec<Value> = serde_json::from_str(conversation_json).ok()?;

    for event in conversation.iter().rev() {
        if event.get("type").and_then(Value::as_str) != Some("assistant") {
            continue;
        }
        let Some(content) =
            event.get("message").and_then(|m| m.get("content")).and_then(Value::as_array)
        else {
            continue;
        };
        for block in content.iter().rev() {
            match block.get("type").and_then(Value::as_str) {
                Some("text") => {
                    if let Some(text) = block.get("text").and_then(Value::as_str) {
                        if !text.is_empty() {
                            return Some(LatestEvent::Text {
                                content: truncate(text, defaults::PREVIEW_TEXT_LIMIT),
                            });
                        }
                    }
                }
                Some("tool_use") => {
                    let tool = block
                        .get("name")
                        .and_then(Value::as_str)
                        .unwrap_or("unknown")
                        .to_string();
                    let input = block.get("input").cloned().unwrap_or(Value::Null);
                    return Some(LatestEvent::ToolUse {
                        tool,
                        input_preview: truncate(&input.to_string(), defaults::PREVIEW_INPUT_LIMIT),
                    });
                }
                _ => {}
            }
        }
    }

    None
}

fn truncate(s: &str, limit: usize) -> String {
    let end = s.char_indices().nth(limit).map_or(s.len(), |(i, _)| i);
    s[..end].to_string()
}

#[cfg(test)]
#[path = "activity_tests.rs"]
mod tests;
