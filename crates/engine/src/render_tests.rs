// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use serde_json::json;
use yare::parameterized;

#[test]
fn substitutes_top_level_fields() {
    let payload = json!({"file_path": "/tmp/a.txt", "size": 42});
    let rendered = render_prompt("process {file_path} ({size} bytes)", &payload);
    assert_eq!(rendered, "process /tmp/a.txt (42 bytes)");
}

#[test]
fn payload_placeholder_expands_whole_payload() {
    let payload = json!({"i": 1});
    let rendered = render_prompt("data: {payload}", &payload);
    assert_eq!(rendered, r#"data: {"i":1}"#);
}

#[test]
fn missing_key_appends_error_line_and_keeps_template() {
    let payload = json!({"i": 1});
    let rendered = render_prompt("do {nope} now", &payload);
    assert_eq!(rendered, "do {nope} now\n\n[ERROR: Missing template variable: 'nope']");
}

#[parameterized(
    open = { "a {{literal}} b", "a {literal} b" },
    both = { "{{payload}}", "{payload}" },
)]
fn double_braces_escape(template: &str, expected: &str) {
    assert_eq!(render_prompt(template, &json!({})), expected);
}

#[test]
fn non_string_values_render_as_json() {
    let payload = json!({"flag": true, "nested": {"a": 1}});
    assert_eq!(render_prompt("{flag} {nested}", &payload), r#"true {"a":1}"#);
}

#[test]
fn unterminated_placeholder_is_left_verbatim() {
    let payload = json!({"i": 1});
    assert_eq!(render_prompt("tail {oops", &payload), "tail {oops");
}
