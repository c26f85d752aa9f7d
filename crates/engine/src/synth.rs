// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Prompt synthesis: turn user intent into a per-unit prompt template.
//!
//! Pure string transforms. The templates carry `{placeholder}` markers
//! that the driver later resolves against each unit's payload.

use std::collections::BTreeMap;

/// Template for file-processing jobs. Includes the `{file_path}`
/// placeholder contract every file enumerator payload satisfies.
pub fn file_processing_prompt(user_intent: &str) -> String {
    format!(
        "You are processing a file as part of a batch operation.\n\
         \n\
         FILE TO PROCESS: {{file_path}}\n\
         \n\
         === YOUR COMPLETE TASK ===\n\
         The following describes EVERYTHING you must do. Follow ALL instructions including any output/storage requirements:\n\
         \n\
         {user_intent}\n\
         \n\
         === END TASK ===\n\
         \n\
         EXECUTION GUIDELINES:\n\
         - Use your available tools to complete this task\n\
         - Work autonomously - you have full tool access\n\
         - If you encounter errors, try to resolve them or fail gracefully\n\
         - Complete ALL parts of the task above, including any output requirements\n\
         - Report your results clearly at the end\n\
         \n\
         Complete ALL aspects of the task and report success or failure."
    )
}

/// Template for any other unit type. When payload field descriptions are
/// known (column names, sample keys) they are listed with their
/// placeholders so the agent sees what data it has.
pub fn generic_prompt(
    user_intent: &str,
    unit_type: Option<&str>,
    payload_description: Option<&BTreeMap<String, String>>,
) -> String {
    let mut parts: Vec<String> = Vec::new();

    match unit_type {
        Some(unit_type) => {
            parts.push(format!("You are processing a {unit_type} as part of a batch operation."));
        }
        None => parts.push("You are processing an item as part of a batch operation.".to_string()),
    }

    parts.push(String::new());
    parts.push("WORK UNIT DATA:".to_string());
    parts.push(
        "The payload for this work unit is provided below. Use the data to complete your task."
            .to_string(),
    );

    if let Some(fields) = payload_description {
        parts.push(String::new());
        for (field, description) in fields {
            parts.push(format!("- {field}: {{{field}}}  ({description})"));
        }
    }

    parts.push(String::new());
    parts.push("=== YOUR COMPLETE TASK ===".to_string());
    parts.push(
        "The following describes EVERYTHING you must do. Follow ALL instructions including any output/storage requirements:"
            .to_string(),
    );
    parts.push(String::new());
    parts.push(user_intent.to_string());
    parts.push(String::new());
    parts.push("=== END TASK ===".to_string());
    parts.push(String::new());
    parts.push("EXECUTION GUIDELINES:".to_string());
    parts.push("- Use your available tools to complete this task".to_string());
    parts.push("- Work autonomously - you have full tool access".to_string());
    parts.push("- If you encounter errors, try to resolve them or fail gracefully".to_string());
    parts.push(
        "- Complete ALL parts of the task above, including any output requirements".to_string(),
    );
    parts.push("- Report your results clearly at the end".to_string());
    parts.push(String::new());
    parts.push("Complete ALL aspects of the task and report success or failure.".to_string());

    parts.join("\n")
}

#[cfg(test)]
#[path = "synth_tests.rs"]
mod tests;
