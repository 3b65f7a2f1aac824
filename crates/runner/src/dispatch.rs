//! The tool dispatch gate.
//!
//! Every `ToolCallRequest` the model emits is routed through here. The
//! gate's contract: every path returns a `ToolExecutionOutcome` value, so
//! the loop can always append a closing ToolResult for any call the model
//! made.

use loopwright_core::message::ToolCallRequest;
use loopwright_core::tool::{RegistrySnapshot, ToolExecutionOutcome};
use std::time::Duration;
use tracing::{debug, warn};

/// Tool names treated as creation operations by the duplicate pre-check.
const CREATE_TOOL: &str = "create_tool";
const UPDATE_TOOL: &str = "update_tool";

pub struct DispatchGate {
    tool_timeout: Duration,
}

impl DispatchGate {
    pub fn new(tool_timeout: Duration) -> Self {
        Self { tool_timeout }
    }

    /// Validate and execute one tool call against the step's registry
    /// snapshot.
    ///
    /// Pre-checks, in order: duplicate tool creation, consecutive
    /// update-without-test, name resolution, argument schema. Execution is
    /// bounded by the configured timeout; a timeout is an `ExecutionError`
    /// outcome, not a hang.
    pub async fn execute(
        &self,
        request: &ToolCallRequest,
        snapshot: &RegistrySnapshot,
        last_executed: Option<&str>,
    ) -> ToolExecutionOutcome {
        // 1. Duplicate-creation check: never execute a create for a name
        //    that already exists in this step's snapshot.
        if request.name == CREATE_TOOL {
            if let Some(proposed) = request.arguments.get("name").and_then(|v| v.as_str()) {
                if snapshot.contains(proposed) {
                    warn!(proposed, "Rejected duplicate tool creation");
                    return ToolExecutionOutcome::DuplicateTool {
                        proposed: proposed.to_string(),
                        existing: snapshot.names(),
                    };
                }
            }
        }

        // 2. Test-first guard: two update_tool dispatches in a row means
        //    the model never exercised the first update.
        if request.name == UPDATE_TOOL && last_executed == Some(UPDATE_TOOL) {
            return ToolExecutionOutcome::InvalidArguments {
                detail: "update_tool was called twice in a row. Execute the updated tool \
                         to verify it works before updating it again."
                    .into(),
            };
        }

        // 3. The name must resolve in the snapshot or the request fails
        //    closed.
        let Some(tool) = snapshot.resolve(&request.name) else {
            return ToolExecutionOutcome::ExecutionError {
                detail: format!(
                    "unknown tool '{}'. Known tools: {}",
                    request.name,
                    snapshot.names().join(", ")
                ),
            };
        };

        // 4. Schema check before the body runs.
        if let Err(detail) = validate_arguments(&tool.parameters_schema(), &request.arguments) {
            return ToolExecutionOutcome::InvalidArguments { detail };
        }

        // 5. Execution, bounded by the timeout.
        debug!(tool = %request.name, call_id = %request.id, "Dispatching tool call");
        match tokio::time::timeout(self.tool_timeout, tool.execute(request.arguments.clone()))
            .await
        {
            Err(_) => ToolExecutionOutcome::ExecutionError {
                detail: format!(
                    "tool '{}' timed out after {}s",
                    request.name,
                    self.tool_timeout.as_secs()
                ),
            },
            Ok(Err(e)) => ToolExecutionOutcome::ExecutionError {
                detail: e.to_string(),
            },
            Ok(Ok(output)) => ToolExecutionOutcome::Success {
                output: output.content,
                halt: output.halt,
            },
        }
    }
}

/// Check required fields and declared types against a tool's JSON Schema.
fn validate_arguments(schema: &serde_json::Value, arguments: &serde_json::Value) -> Result<(), String> {
    let Some(args) = arguments.as_object() else {
        return Err("arguments must be a JSON object".into());
    };

    if let Some(required) = schema.get("required").and_then(|r| r.as_array()) {
        for field in required.iter().filter_map(|f| f.as_str()) {
            if !args.contains_key(field) {
                return Err(format!("missing required argument '{field}'"));
            }
        }
    }

    if let Some(properties) = schema.get("properties").and_then(|p| p.as_object()) {
        for (field, value) in args {
            let Some(declared) = properties.get(field) else {
                continue;
            };
            let Some(expected) = declared.get("type").and_then(|t| t.as_str()) else {
                continue;
            };
            let matches = match expected {
                "string" => value.is_string(),
                "integer" => value.is_i64() || value.is_u64(),
                "number" => value.is_number(),
                "boolean" => value.is_boolean(),
                "array" => value.is_array(),
                "object" => value.is_object(),
                _ => true,
            };
            if !matches {
                return Err(format!(
                    "argument '{field}' must be of type {expected}"
                ));
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use loopwright_core::error::ToolError;
    use loopwright_core::tool::{Tool, ToolOutput, ToolRegistry};
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingTool {
        name: &'static str,
        calls: Arc<AtomicUsize>,
    }

    #[async_trait::async_trait]
    impl Tool for CountingTool {
        fn name(&self) -> &str {
            self.name
        }
        fn description(&self) -> &str {
            "counts invocations"
        }
        fn parameters_schema(&self) -> serde_json::Value {
            serde_json::json!({
                "type": "object",
                "properties": {
                    "path": { "type": "string" },
                    "count": { "type": "integer" }
                },
                "required": ["path"]
            })
        }
        async fn execute(&self, _arguments: serde_json::Value) -> Result<ToolOutput, ToolError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(ToolOutput::text("counted"))
        }
    }

    struct SlowTool;

    #[async_trait::async_trait]
    impl Tool for SlowTool {
        fn name(&self) -> &str {
            "slow"
        }
        fn description(&self) -> &str {
            "sleeps"
        }
        fn parameters_schema(&self) -> serde_json::Value {
            serde_json::json!({"type": "object", "properties": {}})
        }
        async fn execute(&self, _arguments: serde_json::Value) -> Result<ToolOutput, ToolError> {
            tokio::time::sleep(Duration::from_secs(60)).await;
            Ok(ToolOutput::text("never"))
        }
    }

    struct FailingTool;

    #[async_trait::async_trait]
    impl Tool for FailingTool {
        fn name(&self) -> &str {
            "failing"
        }
        fn description(&self) -> &str {
            "always fails"
        }
        fn parameters_schema(&self) -> serde_json::Value {
            serde_json::json!({"type": "object", "properties": {}})
        }
        async fn execute(&self, _arguments: serde_json::Value) -> Result<ToolOutput, ToolError> {
            Err(ToolError::ExecutionFailed {
                tool_name: "failing".into(),
                reason: "boom".into(),
            })
        }
    }

    fn snapshot_with(calls: &Arc<AtomicUsize>) -> RegistrySnapshot {
        let mut registry = ToolRegistry::new();
        registry
            .register(Arc::new(CountingTool {
                name: "read_file",
                calls: calls.clone(),
            }))
            .unwrap();
        registry
            .register(Arc::new(CountingTool {
                name: "create_tool",
                calls: calls.clone(),
            }))
            .unwrap();
        registry.register(Arc::new(SlowTool)).unwrap();
        registry.register(Arc::new(FailingTool)).unwrap();
        registry.snapshot()
    }

    fn gate() -> DispatchGate {
        DispatchGate::new(Duration::from_secs(1))
    }

    #[tokio::test]
    async fn successful_dispatch() {
        let calls = Arc::new(AtomicUsize::new(0));
        let snapshot = snapshot_with(&calls);
        let request = ToolCallRequest::new("c1", "read_file", serde_json::json!({"path": "x"}));

        let outcome = gate().execute(&request, &snapshot, None).await;
        assert!(matches!(outcome, ToolExecutionOutcome::Success { .. }));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn duplicate_creation_never_invokes_the_body() {
        let calls = Arc::new(AtomicUsize::new(0));
        let snapshot = snapshot_with(&calls);
        let size_before = snapshot.len();

        // The scenario from the book: create_tool(name="read_file") with
        // read_file already registered.
        let request = ToolCallRequest::new(
            "c1",
            "create_tool",
            serde_json::json!({"name": "read_file", "description": "x", "parameters": {}}),
        );

        let outcome = gate().execute(&request, &snapshot, None).await;
        match &outcome {
            ToolExecutionOutcome::DuplicateTool { proposed, existing } => {
                assert_eq!(proposed, "read_file");
                assert!(existing.contains(&"read_file".to_string()));
                assert!(existing.contains(&"create_tool".to_string()));
            }
            other => panic!("expected DuplicateTool, got {other:?}"),
        }
        // Body never invoked, snapshot size unchanged.
        assert_eq!(calls.load(Ordering::SeqCst), 0);
        assert_eq!(snapshot.len(), size_before);
        // The result content lists the existing names.
        assert!(outcome.result_content().contains("read_file"));
    }

    #[tokio::test]
    async fn create_with_fresh_name_passes_the_precheck() {
        let calls = Arc::new(AtomicUsize::new(0));
        let snapshot = snapshot_with(&calls);
        let request = ToolCallRequest::new(
            "c1",
            "create_tool",
            serde_json::json!({"name": "brand_new", "path": "x"}),
        );

        let outcome = gate().execute(&request, &snapshot, None).await;
        assert!(outcome.is_success());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn consecutive_update_tool_rejected() {
        let calls = Arc::new(AtomicUsize::new(0));
        let snapshot = snapshot_with(&calls);
        let request = ToolCallRequest::new("c1", "update_tool", serde_json::json!({}));

        let outcome = gate()
            .execute(&request, &snapshot, Some("update_tool"))
            .await;
        match outcome {
            ToolExecutionOutcome::InvalidArguments { detail } => {
                assert!(detail.contains("twice in a row"));
            }
            other => panic!("expected InvalidArguments, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn unknown_tool_fails_closed() {
        let calls = Arc::new(AtomicUsize::new(0));
        let snapshot = snapshot_with(&calls);
        let request = ToolCallRequest::new("c1", "no_such_tool", serde_json::json!({}));

        let outcome = gate().execute(&request, &snapshot, None).await;
        match outcome {
            ToolExecutionOutcome::ExecutionError { detail } => {
                assert!(detail.contains("unknown tool 'no_such_tool'"));
                assert!(detail.contains("read_file"));
            }
            other => panic!("expected ExecutionError, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn missing_required_argument_rejected_before_execution() {
        let calls = Arc::new(AtomicUsize::new(0));
        let snapshot = snapshot_with(&calls);
        let request = ToolCallRequest::new("c1", "read_file", serde_json::json!({}));

        let outcome = gate().execute(&request, &snapshot, None).await;
        match outcome {
            ToolExecutionOutcome::InvalidArguments { detail } => {
                assert!(detail.contains("'path'"));
            }
            other => panic!("expected InvalidArguments, got {other:?}"),
        }
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn mistyped_argument_rejected() {
        let calls = Arc::new(AtomicUsize::new(0));
        let snapshot = snapshot_with(&calls);
        let request = ToolCallRequest::new(
            "c1",
            "read_file",
            serde_json::json!({"path": "x", "count": "three"}),
        );

        let outcome = gate().execute(&request, &snapshot, None).await;
        match outcome {
            ToolExecutionOutcome::InvalidArguments { detail } => {
                assert!(detail.contains("'count'"));
                assert!(detail.contains("integer"));
            }
            other => panic!("expected InvalidArguments, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn timeout_is_an_outcome_not_a_hang() {
        let calls = Arc::new(AtomicUsize::new(0));
        let snapshot = snapshot_with(&calls);
        let request = ToolCallRequest::new("c1", "slow", serde_json::json!({}));

        let outcome = gate().execute(&request, &snapshot, None).await;
        match outcome {
            ToolExecutionOutcome::ExecutionError { detail } => {
                assert!(detail.contains("timed out after 1s"));
            }
            other => panic!("expected ExecutionError, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn tool_failure_is_contained_as_data() {
        let calls = Arc::new(AtomicUsize::new(0));
        let snapshot = snapshot_with(&calls);
        let request = ToolCallRequest::new("c1", "failing", serde_json::json!({}));

        let outcome = gate().execute(&request, &snapshot, None).await;
        match outcome {
            ToolExecutionOutcome::ExecutionError { detail } => {
                assert!(detail.contains("boom"));
            }
            other => panic!("expected ExecutionError, got {other:?}"),
        }
    }

    #[test]
    fn validate_arguments_edge_cases() {
        let schema = serde_json::json!({
            "type": "object",
            "properties": {
                "flag": { "type": "boolean" },
                "items": { "type": "array" }
            },
            "required": []
        });

        assert!(validate_arguments(&schema, &serde_json::json!({})).is_ok());
        assert!(validate_arguments(&schema, &serde_json::json!({"flag": true})).is_ok());
        assert!(validate_arguments(&schema, &serde_json::json!({"flag": "yes"})).is_err());
        assert!(validate_arguments(&schema, &serde_json::json!({"items": [1]})).is_ok());
        // Non-object arguments fail closed.
        assert!(validate_arguments(&schema, &serde_json::json!("str")).is_err());
        // Undeclared arguments are tolerated.
        assert!(validate_arguments(&schema, &serde_json::json!({"extra": 1})).is_ok());
    }
}
