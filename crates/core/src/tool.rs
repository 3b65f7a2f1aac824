//! Tool trait, registry, and dispatch outcome types.
//!
//! Tools are what let the loop act in the world: read/write files, run
//! commands, mark the task complete. The registry is owned by the run; the
//! step loop takes a value snapshot at the start of every step, so registry
//! mutations made by tool-management calls become visible on the *next*
//! step, never mid-step.

use crate::error::ToolError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::{Arc, RwLock};

/// A tool definition sent to the model so it knows what it can call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolDefinition {
    /// The tool name
    pub name: String,

    /// Description of what the tool does
    pub description: String,

    /// JSON Schema describing the tool's parameters
    pub parameters: serde_json::Value,
}

/// What a tool body returns on success.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolOutput {
    /// The output content reported back to the model
    pub content: String,

    /// Whether this output signals task completion (ends the run)
    #[serde(default)]
    pub halt: bool,
}

impl ToolOutput {
    /// A plain result that keeps the loop going.
    pub fn text(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            halt: false,
        }
    }

    /// A result that signals the task is complete.
    pub fn halting(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            halt: true,
        }
    }
}

/// The core Tool trait.
///
/// Each tool (read_file, write_file, run_command, task_complete, ...)
/// implements this trait. Tools are registered in the ToolRegistry and
/// exposed to the model through registry snapshots.
#[async_trait]
pub trait Tool: Send + Sync {
    /// The unique name of this tool (e.g., "read_file").
    fn name(&self) -> &str;

    /// A description of what this tool does (sent to the model).
    fn description(&self) -> &str;

    /// JSON Schema describing this tool's parameters.
    fn parameters_schema(&self) -> serde_json::Value;

    /// Execute the tool with the given arguments.
    async fn execute(&self, arguments: serde_json::Value)
    -> std::result::Result<ToolOutput, ToolError>;

    /// Convert this tool into a ToolDefinition for sending to the model.
    fn definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: self.name().to_string(),
            description: self.description().to_string(),
            parameters: self.parameters_schema(),
        }
    }
}

/// The result of routing one `ToolCallRequest` through the dispatch gate.
///
/// Every variant is a value; the step loop can always append a ToolResult
/// message after any dispatch attempt, so no call the model makes is ever
/// left unacknowledged.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum ToolExecutionOutcome {
    /// The tool ran and returned output.
    Success { output: String, halt: bool },

    /// A `create_tool` request targeted a name that already exists in the
    /// registry snapshot. The body was never invoked.
    DuplicateTool {
        proposed: String,
        existing: Vec<String>,
    },

    /// Required arguments missing or mistyped per the tool's schema, or a
    /// gate policy rejected the call before execution.
    InvalidArguments { detail: String },

    /// The tool body raised a failure, timed out, or the requested name
    /// did not resolve in the snapshot.
    ExecutionError { detail: String },

    /// Produced by the step loop (never the gate) when the per-step tool
    /// budget truncated the step: the call is acknowledged, not executed.
    SkippedBudget { reason: String },
}

impl ToolExecutionOutcome {
    /// Short machine-checkable tag for events and step records.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Success { .. } => "success",
            Self::DuplicateTool { .. } => "duplicate_tool",
            Self::InvalidArguments { .. } => "invalid_arguments",
            Self::ExecutionError { .. } => "execution_error",
            Self::SkippedBudget { .. } => "skipped_budget",
        }
    }

    /// Whether a tool body actually ran and succeeded.
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success { .. })
    }

    /// Render the content for the ToolResult message that closes the call.
    pub fn result_content(&self) -> String {
        match self {
            Self::Success { output, .. } => output.clone(),
            Self::DuplicateTool { proposed, existing } => format!(
                "Error: a tool named '{proposed}' already exists. No new tool was created. \
                 Known tools: {}. Use the existing tool instead.",
                existing.join(", ")
            ),
            Self::InvalidArguments { detail } => format!("Error: invalid arguments — {detail}"),
            Self::ExecutionError { detail } => format!("Error: {detail}"),
            Self::SkippedBudget { reason } => format!("Not executed: {reason}"),
        }
    }
}

/// A registry of available tools. Names are unique.
pub struct ToolRegistry {
    tools: HashMap<String, Arc<dyn Tool>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self {
            tools: HashMap::new(),
        }
    }

    /// Register a tool. Fails closed if the name is already taken.
    pub fn register(&mut self, tool: Arc<dyn Tool>) -> std::result::Result<(), ToolError> {
        let name = tool.name().to_string();
        if self.tools.contains_key(&name) {
            return Err(ToolError::Duplicate(name));
        }
        self.tools.insert(name, tool);
        Ok(())
    }

    /// Replace an existing tool (used by `update_tool`). Fails if absent.
    pub fn replace(&mut self, tool: Arc<dyn Tool>) -> std::result::Result<(), ToolError> {
        let name = tool.name().to_string();
        if !self.tools.contains_key(&name) {
            return Err(ToolError::NotFound(name));
        }
        self.tools.insert(name, tool);
        Ok(())
    }

    /// Remove a tool by name. Returns whether it was present.
    pub fn remove(&mut self, name: &str) -> bool {
        self.tools.remove(name).is_some()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.tools.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    /// Take a value snapshot of the current tool set.
    ///
    /// The snapshot is what the dispatch gate validates and executes
    /// against for one step; mutations to the registry never leak into a
    /// snapshot already taken.
    pub fn snapshot(&self) -> RegistrySnapshot {
        RegistrySnapshot {
            tools: self.tools.clone(),
        }
    }
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// A shared handle to the run's registry. Tool-management tools hold this;
/// the step loop snapshots it once per step.
pub type SharedRegistry = Arc<RwLock<ToolRegistry>>;

/// Wrap a registry for sharing with management tools.
pub fn shared(registry: ToolRegistry) -> SharedRegistry {
    Arc::new(RwLock::new(registry))
}

/// The set of known tool names/schemas as of the start of a step.
#[derive(Clone)]
pub struct RegistrySnapshot {
    tools: HashMap<String, Arc<dyn Tool>>,
}

impl RegistrySnapshot {
    /// Resolve a tool by name.
    pub fn resolve(&self, name: &str) -> Option<Arc<dyn Tool>> {
        self.tools.get(name).cloned()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.tools.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    /// All tool names, sorted for stable output.
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.tools.keys().cloned().collect();
        names.sort();
        names
    }

    /// All tool definitions (for sending to the model), sorted by name.
    pub fn definitions(&self) -> Vec<ToolDefinition> {
        let mut defs: Vec<ToolDefinition> =
            self.tools.values().map(|t| t.definition()).collect();
        defs.sort_by(|a, b| a.name.cmp(&b.name));
        defs
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// A simple test tool for unit tests.
    struct EchoTool;

    #[async_trait]
    impl Tool for EchoTool {
        fn name(&self) -> &str {
            "echo"
        }
        fn description(&self) -> &str {
            "Echoes back the input"
        }
        fn parameters_schema(&self) -> serde_json::Value {
            serde_json::json!({
                "type": "object",
                "properties": {
                    "text": { "type": "string" }
                },
                "required": ["text"]
            })
        }
        async fn execute(
            &self,
            arguments: serde_json::Value,
        ) -> std::result::Result<ToolOutput, ToolError> {
            let text = arguments["text"].as_str().unwrap_or("").to_string();
            Ok(ToolOutput::text(text))
        }
    }

    #[test]
    fn registry_register_and_snapshot() {
        let mut registry = ToolRegistry::new();
        registry.register(Arc::new(EchoTool)).unwrap();

        let snapshot = registry.snapshot();
        assert!(snapshot.contains("echo"));
        assert!(snapshot.resolve("nonexistent").is_none());
    }

    #[test]
    fn registry_rejects_duplicate_names() {
        let mut registry = ToolRegistry::new();
        registry.register(Arc::new(EchoTool)).unwrap();
        let err = registry.register(Arc::new(EchoTool)).unwrap_err();
        assert!(matches!(err, ToolError::Duplicate(name) if name == "echo"));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn replace_requires_existing_tool() {
        let mut registry = ToolRegistry::new();
        let err = registry.replace(Arc::new(EchoTool)).unwrap_err();
        assert!(matches!(err, ToolError::NotFound(_)));

        registry.register(Arc::new(EchoTool)).unwrap();
        registry.replace(Arc::new(EchoTool)).unwrap();
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn snapshot_is_isolated_from_later_mutations() {
        let mut registry = ToolRegistry::new();
        registry.register(Arc::new(EchoTool)).unwrap();

        let snapshot = registry.snapshot();
        registry.remove("echo");

        // The snapshot still resolves the tool; the registry does not.
        assert!(snapshot.contains("echo"));
        assert!(!registry.contains("echo"));
    }

    #[test]
    fn definitions_are_sorted() {
        struct Named(&'static str);

        #[async_trait]
        impl Tool for Named {
            fn name(&self) -> &str {
                self.0
            }
            fn description(&self) -> &str {
                "test"
            }
            fn parameters_schema(&self) -> serde_json::Value {
                serde_json::json!({"type": "object", "properties": {}})
            }
            async fn execute(
                &self,
                _arguments: serde_json::Value,
            ) -> std::result::Result<ToolOutput, ToolError> {
                Ok(ToolOutput::text("ok"))
            }
        }

        let mut registry = ToolRegistry::new();
        registry.register(Arc::new(Named("zeta"))).unwrap();
        registry.register(Arc::new(Named("alpha"))).unwrap();

        let defs = registry.snapshot().definitions();
        assert_eq!(defs[0].name, "alpha");
        assert_eq!(defs[1].name, "zeta");
    }

    #[test]
    fn outcome_kinds_and_content() {
        let success = ToolExecutionOutcome::Success {
            output: "done".into(),
            halt: false,
        };
        assert_eq!(success.kind(), "success");
        assert!(success.is_success());
        assert_eq!(success.result_content(), "done");

        let dup = ToolExecutionOutcome::DuplicateTool {
            proposed: "read_file".into(),
            existing: vec!["create_tool".into(), "read_file".into()],
        };
        assert_eq!(dup.kind(), "duplicate_tool");
        assert!(!dup.is_success());
        let content = dup.result_content();
        assert!(content.contains("read_file"));
        assert!(content.contains("already exists"));

        let skipped = ToolExecutionOutcome::SkippedBudget {
            reason: "step tool budget exhausted".into(),
        };
        assert!(skipped.result_content().starts_with("Not executed"));
    }

    #[tokio::test]
    async fn echo_tool_executes() {
        let tool = EchoTool;
        let out = tool
            .execute(serde_json::json!({"text": "hello world"}))
            .await
            .unwrap();
        assert_eq!(out.content, "hello world");
        assert!(!out.halt);
    }
}
