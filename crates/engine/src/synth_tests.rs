// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::render::render_prompt;
use serde_json::json;

#[test]
fn file_prompt_carries_the_file_path_contract() {
    let prompt = file_processing_prompt("rotate the image 90 degrees");
    assert!(prompt.contains("FILE TO PROCESS: {file_path}"));
    assert!(prompt.contains("rotate the image 90 degrees"));

    // The produced template renders cleanly against a file payload.
    let rendered = render_prompt(&prompt, &json!({"file_path": "/tmp/cat.jpg"}));
    assert!(rendered.contains("FILE TO PROCESS: /tmp/cat.jpg"));
    assert!(!rendered.contains("[ERROR"));
}

#[test]
fn generic_prompt_lists_payload_fields() {
    let mut fields = BTreeMap::new();
    fields.insert("name".to_string(), "from column 'name'".to_string());
    fields.insert("url".to_string(), "from column 'url'".to_string());

    let prompt = generic_prompt("summarize each record", Some("csv"), Some(&fields));
    assert!(prompt.contains("You are processing a csv as part of a batch operation."));
    assert!(prompt.contains("- name: {name}  (from column 'name')"));
    assert!(prompt.contains("- url: {url}  (from column 'url')"));

    let rendered = render_prompt(&prompt, &json!({"name": "a", "url": "https://x"}));
    assert!(rendered.contains("- name: a"));
    assert!(!rendered.contains("[ERROR"));
}

#[test]
fn generic_prompt_without_type_or_fields() {
    let prompt = generic_prompt("do things", None, None);
    assert!(prompt.contains("You are processing an item as part of a batch operation."));
    assert!(prompt.contains("do things"));
}
