//! Tool dispatch: validation, timeouts and ordered execution of the calls
//! proposed by one model turn.

use std::time::{Duration, Instant};

use concierge_core::error::{ErrorKind, ToolError};
use concierge_core::provider::ToolDefinition;
use concierge_core::tool::{ToolCall, ToolRegistry, ToolResult};
use concierge_core::validation::validate_arguments;
use futures::future::join_all;
use tracing::{debug, warn};

/// A resolved call together with how long it took.
#[derive(Debug, Clone)]
pub struct Dispatched {
    pub result: ToolResult,
    pub elapsed: Duration,
}

pub struct ToolDispatcher {
    registry: ToolRegistry,
    tool_timeout: Duration,
}

impl ToolDispatcher {
    pub fn new(registry: ToolRegistry) -> Self {
        Self {
            registry,
            tool_timeout: Duration::from_secs(30),
        }
    }

    /// Set the per-call execution timeout.
    pub fn with_tool_timeout(mut self, timeout: Duration) -> Self {
        self.tool_timeout = timeout;
        self
    }

    pub fn registry(&self) -> &ToolRegistry {
        &self.registry
    }

    pub fn definitions(&self) -> Vec<ToolDefinition> {
        self.registry.definitions()
    }

    /// Resolve every call, returning one result per call in proposal order.
    ///
    /// Runs of reads and searches execute concurrently. A persistent write
    /// waits for everything proposed before it and runs alone.
    pub async fn dispatch(&self, calls: &[ToolCall]) -> Vec<Dispatched> {
        let mut resolved = Vec::with_capacity(calls.len());
        let mut batch: Vec<&ToolCall> = Vec::new();

        for call in calls {
            if self.is_parallel_safe(call) {
                batch.push(call);
                continue;
            }
            if !batch.is_empty() {
                resolved.extend(join_all(batch.drain(..).map(|c| self.execute_one(c))).await);
            }
            resolved.push(self.execute_one(call).await);
        }
        if !batch.is_empty() {
            resolved.extend(join_all(batch.into_iter().map(|c| self.execute_one(c))).await);
        }

        resolved
    }

    // Unknown tools resolve immediately with a validation failure.
    fn is_parallel_safe(&self, call: &ToolCall) -> bool {
        self.registry
            .get(&call.name)
            .is_none_or(|tool| tool.side_effect().is_parallel_safe())
    }

    /// Validate and execute a single call. Never fails: every problem becomes
    /// a failed [`ToolResult`] the model can read.
    pub async fn execute_one(&self, call: &ToolCall) -> Dispatched {
        let started = Instant::now();
        let result = self.resolve(call).await;
        let elapsed = started.elapsed();

        match result.failure_kind() {
            None => debug!(tool = %call.name, call_id = %call.id, elapsed_ms = elapsed.as_millis() as u64, "Tool succeeded"),
            Some(kind) => warn!(tool = %call.name, call_id = %call.id, %kind, "Tool call failed"),
        }
        Dispatched { result, elapsed }
    }

    async fn resolve(&self, call: &ToolCall) -> ToolResult {
        let Some(tool) = self.registry.get(&call.name) else {
            return ToolResult::from_error(call, &ToolError::NotFound(call.name.clone()));
        };

        if let Err(reason) = validate_arguments(&call.arguments, &tool.parameters_schema()) {
            return ToolResult::failure(
                call,
                ErrorKind::Validation,
                format!("Invalid arguments for {}: {reason}", call.name),
            );
        }

        match tokio::time::timeout(self.tool_timeout, tool.execute(call.arguments.clone())).await {
            Ok(Ok(output)) => ToolResult::success(call, output),
            Ok(Err(e)) => ToolResult::from_error(call, &e),
            Err(_) => ToolResult::from_error(
                call,
                &ToolError::Timeout {
                    tool_name: call.name.clone(),
                    timeout_ms: self.tool_timeout.as_millis() as u64,
                },
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use concierge_core::tool::{SideEffect, Tool, ToolOutcome};
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Sleeps for `delay_ms` from the arguments, then echoes the label.
    struct SleepTool {
        name: &'static str,
        effect: SideEffect,
        running: Arc<AtomicUsize>,
        peak: Arc<AtomicUsize>,
    }

    impl SleepTool {
        fn new(name: &'static str, effect: SideEffect) -> Self {
            Self {
                name,
                effect,
                running: Arc::new(AtomicUsize::new(0)),
                peak: Arc::new(AtomicUsize::new(0)),
            }
        }
    }

    #[async_trait]
    impl Tool for SleepTool {
        fn name(&self) -> &str {
            self.name
        }
        fn description(&self) -> &str {
            "sleeps"
        }
        fn parameters_schema(&self) -> serde_json::Value {
            serde_json::json!({
                "type": "object",
                "properties": {
                    "label": { "type": "string" },
                    "delay_ms": { "type": "integer" },
                    "fail": { "type": "boolean" }
                },
                "required": ["label", "delay_ms"]
            })
        }
        fn side_effect(&self) -> SideEffect {
            self.effect
        }
        async fn execute(&self, arguments: serde_json::Value) -> Result<serde_json::Value, ToolError> {
            let now = self.running.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak.fetch_max(now, Ordering::SeqCst);
            let delay = arguments["delay_ms"].as_u64().unwrap_or(0);
            tokio::time::sleep(Duration::from_millis(delay)).await;
            self.running.fetch_sub(1, Ordering::SeqCst);

            if arguments["fail"].as_bool().unwrap_or(false) {
                return Err(ToolError::ExecutionFailed {
                    tool_name: self.name.into(),
                    reason: "upstream said no".into(),
                });
            }
            Ok(arguments["label"].clone())
        }
    }

    fn call(id: &str, name: &str, arguments: serde_json::Value) -> ToolCall {
        ToolCall {
            id: id.into(),
            name: name.into(),
            arguments,
            message_id: "m1".into(),
        }
    }

    fn payloads(dispatched: &[Dispatched]) -> Vec<serde_json::Value> {
        dispatched
            .iter()
            .map(|d| match &d.result.outcome {
                ToolOutcome::Success(v) => v.clone(),
                ToolOutcome::Failure(f) => serde_json::json!(f.kind.to_string()),
            })
            .collect()
    }

    #[tokio::test(start_paused = true)]
    async fn results_follow_proposal_order_not_completion_order() {
        let search = SleepTool::new("search", SideEffect::NetworkSearch);
        let peak = search.peak.clone();
        let dispatcher = ToolDispatcher::new(ToolRegistry::new().with_tool(Arc::new(search)));

        let calls = vec![
            call("1", "search", serde_json::json!({"label": "slow", "delay_ms": 300})),
            call("2", "search", serde_json::json!({"label": "fast", "delay_ms": 10})),
            call("3", "search", serde_json::json!({"label": "medium", "delay_ms": 100})),
        ];
        let started = tokio::time::Instant::now();
        let out = dispatcher.dispatch(&calls).await;

        assert_eq!(payloads(&out), vec!["slow", "fast", "medium"]);
        assert_eq!(out.iter().map(|d| d.result.call_id.as_str()).collect::<Vec<_>>(), vec!["1", "2", "3"]);
        assert_eq!(peak.load(Ordering::SeqCst), 3);
        assert!(started.elapsed() < Duration::from_millis(400));
    }

    #[tokio::test(start_paused = true)]
    async fn writes_run_alone_in_order() {
        let write = SleepTool::new("save", SideEffect::PersistentWrite);
        let peak = write.peak.clone();
        let read = SleepTool::new("lookup", SideEffect::IdempotentRead);
        let dispatcher = ToolDispatcher::new(
            ToolRegistry::new().with_tool(Arc::new(write)).with_tool(Arc::new(read)),
        );

        let calls = vec![
            call("1", "save", serde_json::json!({"label": "w1", "delay_ms": 50})),
            call("2", "save", serde_json::json!({"label": "w2", "delay_ms": 10})),
            call("3", "lookup", serde_json::json!({"label": "r1", "delay_ms": 5})),
        ];
        let out = dispatcher.dispatch(&calls).await;

        assert_eq!(payloads(&out), vec!["w1", "w2", "r1"]);
        assert_eq!(peak.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn failures_become_typed_results() {
        let dispatcher = ToolDispatcher::new(
            ToolRegistry::new().with_tool(Arc::new(SleepTool::new("search", SideEffect::NetworkSearch))),
        )
        .with_tool_timeout(Duration::from_millis(200));

        let calls = vec![
            call("1", "nope", serde_json::json!({})),
            call("2", "search", serde_json::json!({"label": 7, "delay_ms": 1})),
            call("3", "search", serde_json::json!({"label": "late", "delay_ms": 5_000})),
            call("4", "search", serde_json::json!({"label": "x", "delay_ms": 1, "fail": true})),
            call("5", "search", serde_json::json!({"label": "ok", "delay_ms": 1})),
        ];
        let out = dispatcher.dispatch(&calls).await;

        let kinds: Vec<_> = out.iter().map(|d| d.result.failure_kind()).collect();
        assert_eq!(
            kinds,
            vec![
                Some(ErrorKind::Validation),
                Some(ErrorKind::Validation),
                Some(ErrorKind::Timeout),
                Some(ErrorKind::ToolExecution),
                None,
            ]
        );

        let msg = out[1].result.to_message();
        assert!(msg.is_error);
        assert!(msg.content.contains("label"), "{}", msg.content);
    }

    #[tokio::test]
    async fn empty_proposal_resolves_to_nothing() {
        let dispatcher = ToolDispatcher::new(ToolRegistry::new());
        assert!(dispatcher.dispatch(&[]).await.is_empty());
    }
}
