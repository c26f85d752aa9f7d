// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Prompt template rendering.
//!
//! The template language is deliberately minimal: flat `{key}`
//! substitution against the payload's top-level fields, plus a special
//! `{payload}` that expands to the whole payload as JSON. `{{` and `}}`
//! escape literal braces.

use serde_json::Value;

/// Render a template against a payload.
///
/// A missing placeholder does not fail the unit: the returned string is
/// the unrendered template followed by a visible error line, so the agent
/// sees exactly what was missing.
pub fn render_prompt(template: &str, payload: &Value) -> String {
    match try_render(template, payload) {
        Ok(rendered) => rendered,
        Err(missing) => {
            format!("{template}\n\n[ERROR: Missing template variable: '{missing}']")
        }
    }
}

fn try_render(template: &str, payload: &Value) -> Result<String, String> {
    let mut out = String::with_capacity(template.len());
    let mut chars = template.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            '{' if chars.peek() == Some(&'{') => {
                chars.next();
                out.push('{');
            }
            '}' if chars.peek() == Some(&'}') => {
                chars.next();
                out.push('}');
            }
            '{' => {
                let mut key = String::new();
                let mut closed = false;
                for k in chars.by_ref() {
                    if k == '}' {
                        closed = true;
                        break;
                    }
                    key.push(k);
                }
                if !closed {
                    // Unterminated placeholder; emit it verbatim.
                    out.push('{');
                    out.push_str(&key);
                    continue;
                }
                out.push_str(&lookup(&key, payload).ok_or(key)?);
            }
            c => out.push(c),
        }
    }

    Ok(out)
}

fn lookup(key: &str, payload: &Value) -> Option<String> {
    if key == "payload" {
        return Some(payload.to_string());
    }
    match payload.get(key)? {
        Value::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}

#[cfg(test)]
#[path = "render_tests.rs"]
mod tests;
