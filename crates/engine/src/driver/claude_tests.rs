// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use serde_json::json;
use std::sync::{Arc, Mutex};
use tempfile::TempDir;

fn driver(file_access: FileAccess) -> ClaudeCliDriver {
    ClaudeCliDriver::new(DriverOptions::default(), file_access)
}

/// Write an executable script that stands in for the agent CLI.
fn fake_agent(dir: &TempDir, body: &str) -> String {
    use std::os::unix::fs::PermissionsExt;
    let path = dir.path().join("agent.sh");
    std::fs::write(&path, format!("#!/bin/sh\n{body}\n")).unwrap();
    let mut perms = std::fs::metadata(&path).unwrap().permissions();
    perms.set_mode(0o755);
    std::fs::set_permissions(&path, perms).unwrap();
    path.to_string_lossy().into_owned()
}

fn script_driver(dir: &TempDir, body: &str) -> ClaudeCliDriver {
    ClaudeCliDriver::new(
        DriverOptions { cli_path: Some(fake_agent(dir, body)), ..Default::default() },
        FileAccess::Inherit,
    )
}

#[test]
fn base_args_request_streaming_noninteractive_run() {
    let args = driver(FileAccess::Inherit).build_args("do the thing", &json!({}));
    assert_eq!(
        args,
        vec!["--print", "do the thing", "--output-format", "stream-json", "--verbose"]
    );
}

#[test]
fn model_and_max_turns_are_optional_flags() {
    let d = ClaudeCliDriver::new(
        DriverOptions {
            model: Some("claude-sonnet-4".into()),
            max_turns: Some(5),
            ..Default::default()
        },
        FileAccess::Inherit,
    );
    let args = d.build_args("p", &json!({}));
    let joined = args.join(" ");
    assert!(joined.contains("--model claude-sonnet-4"));
    assert!(joined.contains("--max-turns 5"));
}

#[test]
fn file_aware_mode_grants_existing_parent_dirs_once() {
    let dir = TempDir::new().unwrap();
    let file_a = dir.path().join("a.txt");
    let file_b = dir.path().join("b.txt");
    std::fs::write(&file_a, "a").unwrap();
    std::fs::write(&file_b, "b").unwrap();

    let payload = json!({
        "file_path": file_a.to_string_lossy(),
        "file_paths": [file_b.to_string_lossy(), "/does/not/exist.txt"],
    });
    let args = driver(FileAccess::GrantPayloadDirs).build_args("p", &payload);

    assert!(args.contains(&"--dangerously-skip-permissions".to_string()));
    let add_dirs: Vec<&String> = args
        .iter()
        .zip(args.iter().skip(1))
        .filter(|(flag, _)| *flag == "--add-dir")
        .map(|(_, dir)| dir)
        .collect();
    // Both files share one parent; the missing path contributes nothing.
    assert_eq!(add_dirs.len(), 1);
    assert_eq!(add_dirs[0], &dir.path().to_string_lossy().into_owned());
}

#[test]
fn plain_mode_never_grants_dirs() {
    let dir = TempDir::new().unwrap();
    let file = dir.path().join("a.txt");
    std::fs::write(&file, "a").unwrap();

    let args = driver(FileAccess::Inherit)
        .build_args("p", &json!({"file_path": file.to_string_lossy()}));
    assert!(!args.iter().any(|a| a == "--add-dir"));
}

#[test]
fn output_directory_falls_back_to_existing_parent() {
    let dir = TempDir::new().unwrap();
    let missing_child = dir.path().join("out");

    let args = driver(FileAccess::GrantPayloadDirs)
        .build_args("p", &json!({"output_directory": missing_child.to_string_lossy()}));
    assert!(args.contains(&dir.path().to_string_lossy().into_owned()));
}

#[test]
fn availability_check() {
    let d = ClaudeCliDriver::new(
        DriverOptions { cli_path: Some("/definitely/not/a/real/binary".into()), ..Default::default() },
        FileAccess::Inherit,
    );
    assert!(!d.is_available());

    let d = ClaudeCliDriver::new(
        DriverOptions { cli_path: Some("sh".into()), ..Default::default() },
        FileAccess::Inherit,
    );
    assert!(d.is_available());
}

#[tokio::test]
async fn successful_run_parses_stream_and_result() {
    let dir = TempDir::new().unwrap();
    let d = script_driver(
        &dir,
        r#"echo '{"type":"system","subtype":"init","session_id":"sess-123"}'
echo '{"type":"assistant","message":{"content":[{"type":"text","text":"hi"}]}}'
echo 'not json at all'
echo '{"type":"result","is_error":false,"result":"all done","num_turns":2,"total_cost_usd":0.01,"duration_ms":7,"duration_api_ms":4}'"#,
    );

    let events = Arc::new(Mutex::new(Vec::new()));
    let pids = Arc::new(Mutex::new(Vec::new()));
    let hooks = StreamHooks {
        on_event: Box::new({
            let events = Arc::clone(&events);
            move |kind: &str, _event: &serde_json::Value| {
                events.lock().unwrap().push(kind.to_string());
            }
        }),
        on_process_start: Box::new({
            let pids = Arc::clone(&pids);
            move |pid| {
                pids.lock().unwrap().push(pid);
            }
        }),
    };
    let result = d
        .execute("say hi to {payload}", &json!({"i": 1}), Duration::from_secs(30), &hooks)
        .await;

    assert!(result.success, "error: {:?}", result.error);
    assert_eq!(result.output.as_deref(), Some("all done"));
    assert_eq!(result.metadata.session_id.as_deref(), Some("sess-123"));
    assert_eq!(result.metadata.num_turns, Some(2));
    assert_eq!(result.metadata.total_cost_usd, Some(0.01));
    assert_eq!(result.metadata.return_code, Some(0));
    assert_eq!(result.conversation.len(), 1);
    assert_eq!(result.rendered_prompt.as_deref(), Some(r#"say hi to {"i":1}"#));

    assert_eq!(*events.lock().unwrap(), vec!["system", "assistant", "result"]);
    assert_eq!(pids.lock().unwrap().len(), 1);
}

#[tokio::test]
async fn error_result_event_maps_to_failure() {
    let dir = TempDir::new().unwrap();
    let d = script_driver(
        &dir,
        r#"echo '{"type":"result","is_error":true,"result":"model refused"}'"#,
    );

    let result = d.execute("p", &json!({}), Duration::from_secs(30), &StreamHooks::noop()).await;
    assert!(!result.success);
    assert_eq!(result.error.as_deref(), Some("model refused"));
    assert!(result.output.is_none());
}

#[tokio::test]
async fn missing_result_event_reports_exit_code_and_stderr() {
    let dir = TempDir::new().unwrap();
    let d = script_driver(&dir, "echo 'oops' >&2\nexit 3");

    let result = d.execute("p", &json!({}), Duration::from_secs(30), &StreamHooks::noop()).await;
    assert!(!result.success);
    let error = result.error.unwrap();
    assert!(error.contains("no terminal result event"), "{error}");
    assert!(error.contains("3"), "{error}");
    assert!(error.contains("oops"), "{error}");
    assert_eq!(result.metadata.return_code, Some(3));
}

#[tokio::test]
async fn timeout_kills_subprocess() {
    let dir = TempDir::new().unwrap();
    let d = script_driver(&dir, "sleep 30");

    let start = std::time::Instant::now();
    let result = d.execute("p", &json!({}), Duration::from_secs(1), &StreamHooks::noop()).await;
    assert!(start.elapsed() < Duration::from_secs(10));
    assert!(!result.success);
    assert!(result.error.unwrap().contains("timed out after 1s"));
}

#[tokio::test]
async fn spawn_failure_is_a_failed_result() {
    let d = ClaudeCliDriver::new(
        DriverOptions { cli_path: Some("/definitely/not/a/real/binary".into()), ..Default::default() },
        FileAccess::Inherit,
    );
    let result = d.execute("p", &json!({}), Duration::from_secs(5), &StreamHooks::noop()).await;
    assert!(!result.success);
    assert!(result.error.unwrap().contains("failed to spawn"));
}
