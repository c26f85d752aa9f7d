// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Driver for the `claude` command-line agent.
//!
//! Each execution spawns one `claude --print <prompt>` subprocess with a
//! line-delimited stream-json event feed on stdout. The subprocess gets
//! its own process group so killing the group reaps anything the agent
//! spawned underneath.

use super::{Driver, DriverOptions, StreamHooks};
use crate::process::signal_group_or_pid;
use crate::render::render_prompt;
use async_trait::async_trait;
use drover_core::{ResultMetadata, WorkerResult};
use nix::sys::signal::Signal;
use serde_json::Value;
use std::collections::BTreeSet;
use std::path::Path;
use std::process::Stdio;
use std::time::{Duration, Instant};
use tokio::io::{AsyncBufReadExt, AsyncReadExt, BufReader};

const DEFAULT_CLI_PATH: &str = "claude";

/// Directory-access policy for spawned agents.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileAccess {
    /// Agent sees whatever the inherited permissions allow.
    Inherit,
    /// Grant the directories named by the payload (`file_path`,
    /// `file_paths`, `output_directory`) via `--add-dir`.
    GrantPayloadDirs,
}

pub struct ClaudeCliDriver {
    cli_path: String,
    model: Option<String>,
    max_turns: Option<u32>,
    file_access: FileAccess,
}

impl ClaudeCliDriver {
    pub fn new(options: DriverOptions, file_access: FileAccess) -> Self {
        Self {
            cli_path: options.cli_path.unwrap_or_else(|| DEFAULT_CLI_PATH.to_string()),
            model: options.model,
            max_turns: options.max_turns,
            file_access,
        }
    }

    /// Command-line arguments for one invocation. The rendered prompt is
    /// the single positional argument.
    fn build_args(&self, rendered_prompt: &str, payload: &Value) -> Vec<String> {
        let mut args = vec![
            "--print".to_string(),
            rendered_prompt.to_string(),
            "--output-format".to_string(),
            "stream-json".to_string(),
            "--verbose".to_string(),
        ];

        if let Some(model) = &self.model {
            args.push("--model".to_string());
            args.push(model.clone());
        }
        if let Some(max_turns) = self.max_turns {
            args.push("--max-turns".to_string());
            args.push(max_turns.to_string());
        }

        if self.file_access == FileAccess::GrantPayloadDirs {
            let dirs = payload_dirs(payload);
            if !dirs.is_empty() {
                args.push("--dangerously-skip-permissions".to_string());
                for dir in dirs {
                    args.push("--add-dir".to_string());
                    args.push(dir);
                }
            }
        }

        args
    }
}

#[async_trait]
impl Driver for ClaudeCliDriver {
    async fn execute(
        &self,
        prompt_template: &str,
        payload: &Value,
        timeout: Duration,
        hooks: &StreamHooks,
    ) -> WorkerResult {
        let start = Instant::now();
        let rendered = render_prompt(prompt_template, payload);
        let args = self.build_args(&rendered, payload);

        let mut std_cmd = std::process::Command::new(&self.cli_path);
        std_cmd
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        if let Some(dir) = payload.get("working_directory").and_then(Value::as_str) {
            if !dir.is_empty() {
                std_cmd.current_dir(dir);
            }
        }
        #[cfg(unix)]
        {
            use std::os::unix::process::CommandExt;
            std_cmd.process_group(0);
        }

        let mut cmd = tokio::process::Command::from(std_cmd);
        cmd.kill_on_drop(true);

        let mut child = match cmd.spawn() {
            Ok(child) => child,
            Err(e) => {
                let mut result =
                    WorkerResult::failure(format!("failed to spawn agent: {e}"), elapsed(start));
                result.rendered_prompt = Some(rendered);
                return result;
            }
        };

        let pid = child.id().map(|p| p as i32);
        if let Some(pid) = pid {
            hooks.process_start(pid);
        }

        let stdout = child.stdout.take();
        let stderr_task = child.stderr.take().map(|mut stderr| {
            tokio::spawn(async move {
                let mut buf = String::new();
                let _ = stderr.read_to_string(&mut buf).await;
                buf
            })
        });

        let mut conversation: Vec<Value> = Vec::new();
        let mut session_id: Option<String> = None;
        let mut final_result: Option<Value> = None;

        let waited = tokio::time::timeout(timeout, async {
            if let Some(stdout) = stdout {
                let mut lines = BufReader::new(stdout).lines();
                while let Ok(Some(line)) = lines.next_line().await {
                    let line = line.trim();
                    if line.is_empty() {
                        continue;
                    }
                    // Unparseable lines and unknown event types are
                    // dropped without comment.
                    let Ok(event) = serde_json::from_str::<Value>(line) else {
                        continue;
                    };
                    let kind = event
                        .get("type")
                        .and_then(Value::as_str)
                        .unwrap_or_default()
                        .to_string();
                    match kind.as_str() {
                        "system" => {
                            if event.get("subtype").and_then(Value::as_str) == Some("init") {
                                if let Some(sid) = event.get("session_id").and_then(Value::as_str)
                                {
                                    session_id = Some(sid.to_string());
                                }
                                hooks.event("system", &event);
                            }
                        }
                        "user" | "assistant" | "tool_use" | "tool_result" => {
                            conversation.push(event.clone());
                            hooks.event(&kind, &event);
                        }
                        "result" => {
                            hooks.event("result", &event);
                            final_result = Some(event);
                        }
                        _ => {}
                    }
                }
            }
            child.wait().await
        })
        .await;

        let exit = match waited {
            Ok(wait_result) => wait_result,
            Err(_elapsed) => {
                // Timed out: kill the whole group, then reap.
                match pid {
                    Some(pid) => {
                        let _ = signal_group_or_pid(pid, Signal::SIGKILL);
                    }
                    None => {
                        let _ = child.start_kill();
                    }
                }
                let _ = child.wait().await;

                let mut result = WorkerResult::failure(
                    format!("execution timed out after {}s", timeout.as_secs()),
                    elapsed(start),
                );
                result.conversation = conversation;
                result.rendered_prompt = Some(rendered);
                result.metadata.session_id = session_id;
                return result;
            }
        };

        let stderr_output = match stderr_task {
            Some(task) => task.await.unwrap_or_default(),
            None => String::new(),
        };

        let execution_time = elapsed(start);
        let return_code = exit.as_ref().ok().and_then(|status| status.code());

        match final_result {
            // The terminal result event is authoritative; a non-zero exit
            // code alone does not override it.
            Some(final_event) => {
                let is_error =
                    final_event.get("is_error").and_then(Value::as_bool).unwrap_or(false);
                let text = final_event
                    .get("result")
                    .and_then(Value::as_str)
                    .unwrap_or_default()
                    .to_string();

                WorkerResult {
                    success: !is_error,
                    output: (!is_error).then(|| text.clone()),
                    error: is_error.then_some(text),
                    execution_time_seconds: Some(execution_time),
                    output_files: Vec::new(),
                    metadata: ResultMetadata {
                        session_id,
                        num_turns: final_event.get("num_turns").and_then(Value::as_u64),
                        total_cost_usd: final_event.get("total_cost_usd").and_then(Value::as_f64),
                        duration_ms: final_event.get("duration_ms").and_then(Value::as_u64),
                        duration_api_ms: final_event
                            .get("duration_api_ms")
                            .and_then(Value::as_u64),
                        return_code,
                    },
                    conversation,
                    rendered_prompt: Some(rendered),
                }
            }
            None => {
                let mut result = WorkerResult::failure(
                    format!(
                        "no terminal result event received. return code: {}. stderr: {}",
                        return_code.map_or_else(|| "unknown".to_string(), |c| c.to_string()),
                        stderr_output.trim(),
                    ),
                    execution_time,
                );
                result.conversation = conversation;
                result.rendered_prompt = Some(rendered);
                result.metadata.session_id = session_id;
                result.metadata.return_code = return_code;
                result
            }
        }
    }

    fn is_available(&self) -> bool {
        find_in_path(&self.cli_path)
    }

    fn name(&self) -> &'static str {
        match self.file_access {
            FileAccess::Inherit => "claude-cli",
            FileAccess::GrantPayloadDirs => "claude-cli-files",
        }
    }
}

fn elapsed(start: Instant) -> f64 {
    start.elapsed().as_secs_f64()
}

/// Existing directories the payload points at, deduplicated and in a
/// stable order.
fn payload_dirs(payload: &Value) -> Vec<String> {
    let mut dirs = BTreeSet::new();

    let mut add_parent_of = |path: &str| {
        let path = Path::new(path);
        if path.exists() {
            if let Some(parent) = path.parent() {
                dirs.insert(parent.to_string_lossy().into_owned());
            }
        }
    };

    if let Some(fp) = payload.get("file_path").and_then(Value::as_str) {
        add_parent_of(fp);
    }
    if let Some(fps) = payload.get("file_paths").and_then(Value::as_array) {
        for fp in fps.iter().filter_map(Value::as_str) {
            add_parent_of(fp);
        }
    }

    if let Some(out) = payload.get("output_directory").and_then(Value::as_str) {
        if !out.is_empty() {
            let out_path = Path::new(out);
            if out_path.exists() {
                dirs.insert(out_path.to_string_lossy().into_owned());
            } else if out_path.parent().is_some_and(Path::exists) {
                if let Some(parent) = out_path.parent() {
                    dirs.insert(parent.to_string_lossy().into_owned());
                }
            }
        }
    }

    dirs.into_iter().collect()
}

fn find_in_path(program: &str) -> bool {
    if program.contains('/') {
        return Path::new(program).exists();
    }
    let Some(paths) = std::env::var_os("PATH") else {
        return false;
    };
    std::env::split_paths(&paths).any(|dir| dir.join(program).is_file())
}

#[cfg(test)]
#[path = "claude_tests.rs"]
mod tests;
