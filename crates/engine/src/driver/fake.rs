// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Scripted driver for pool, executor, and orchestrator tests.

use super::{Driver, StreamHooks};
use async_trait::async_trait;
use drover_core::{ResultMetadata, WorkerResult};
use parking_lot::Mutex;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::time::Duration;

/// Behavior of the fake for a given payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum FakeMode {
    AlwaysSucceed,
    AlwaysFail,
    /// Fail the first `n` attempts per distinct payload, then succeed.
    FailFirst(u32),
    /// Fail payloads carrying `"fail": true`, succeed everything else.
    FailMarked,
    /// Fail only the synthesis unit (payload `type == "post_processing"`).
    FailPostProcessing,
}

pub(crate) struct FakeDriver {
    mode: FakeMode,
    delay: Duration,
    /// Attempt counts keyed by serialized payload.
    attempts: Mutex<HashMap<String, u32>>,
    /// Payloads in execution order.
    pub(crate) calls: Mutex<Vec<Value>>,
    /// Fake pid reported through `on_process_start`.
    pub(crate) report_pid: Option<i32>,
}

impl FakeDriver {
    pub(crate) fn new(mode: FakeMode) -> Self {
        Self {
            mode,
            delay: Duration::from_millis(10),
            attempts: Mutex::new(HashMap::new()),
            calls: Mutex::new(Vec::new()),
            report_pid: None,
        }
    }

    pub(crate) fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub(crate) fn with_pid(mut self, pid: i32) -> Self {
        self.report_pid = Some(pid);
        self
    }
}

#[async_trait]
impl Driver for FakeDriver {
    async fn execute(
        &self,
        prompt_template: &str,
        payload: &Value,
        _timeout: Duration,
        hooks: &StreamHooks,
    ) -> WorkerResult {
        self.calls.lock().push(payload.clone());

        if let Some(pid) = self.report_pid {
            hooks.process_start(pid);
        }

        let init = json!({"type": "system", "subtype": "init", "session_id": "fake-sess"});
        hooks.event("system", &init);

        let assistant = json!({
            "type": "assistant",
            "message": {"content": [{"type": "text", "text": "working on it"}]}
        });
        hooks.event("assistant", &assistant);

        tokio::time::sleep(self.delay).await;

        let attempt = {
            let mut attempts = self.attempts.lock();
            let n = attempts.entry(payload.to_string()).or_insert(0);
            *n += 1;
            *n
        };

        let succeed = match self.mode {
            FakeMode::AlwaysSucceed => true,
            FakeMode::AlwaysFail => false,
            FakeMode::FailFirst(n) => attempt > n,
            FakeMode::FailMarked => payload.get("fail") != Some(&Value::Bool(true)),
            FakeMode::FailPostProcessing => {
                payload.get("type").and_then(Value::as_str) != Some("post_processing")
            }
        };

        let rendered = crate::render::render_prompt(prompt_template, payload);
        if succeed {
            WorkerResult {
                success: true,
                output: Some("ok".to_string()),
                error: None,
                execution_time_seconds: Some(0.1),
                output_files: Vec::new(),
                metadata: ResultMetadata {
                    session_id: Some("fake-sess".to_string()),
                    num_turns: Some(1),
                    total_cost_usd: Some(0.001),
                    duration_ms: Some(10),
                    duration_api_ms: Some(5),
                    return_code: Some(0),
                },
                conversation: vec![assistant],
                rendered_prompt: Some(rendered),
            }
        } else {
            let mut result = WorkerResult::failure("scripted failure", 0.1);
            result.conversation = vec![assistant];
            result.rendered_prompt = Some(rendered);
            result.metadata.session_id = Some("fake-sess".to_string());
            result
        }
    }

    fn is_available(&self) -> bool {
        true
    }

    fn name(&self) -> &'static str {
        "fake"
    }
}
