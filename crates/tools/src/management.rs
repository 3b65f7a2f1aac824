//! Tool-management tools: create, update, and remove tools at runtime.
//!
//! Each holds the run's shared registry handle. A successful management
//! call mutates the registry; the mutation becomes visible in the *next*
//! step's snapshot, never mid-step.

use crate::dynamic::DynamicTool;
use async_trait::async_trait;
use loopwright_core::error::ToolError;
use loopwright_core::tool::{SharedRegistry, Tool, ToolOutput};
use std::sync::Arc;
use tracing::info;

/// The name the dispatch gate's duplicate-creation pre-check keys on.
pub const CREATE_TOOL: &str = "create_tool";
pub const UPDATE_TOOL: &str = "update_tool";
pub const REMOVE_TOOL: &str = "remove_tool";

/// Tools a model must never remove or overwrite: losing them would strand
/// the run (no way to finish, no way to manage tools).
pub const PROTECTED_TOOLS: &[&str] = &[CREATE_TOOL, UPDATE_TOOL, REMOVE_TOOL, "task_complete"];

fn spec_parts(arguments: &serde_json::Value) -> Result<(&str, &str, serde_json::Value), ToolError> {
    let name = arguments["name"]
        .as_str()
        .ok_or_else(|| ToolError::InvalidArguments("Missing 'name' argument".into()))?;
    let description = arguments["description"]
        .as_str()
        .ok_or_else(|| ToolError::InvalidArguments("Missing 'description' argument".into()))?;
    let parameters = arguments
        .get("parameters")
        .cloned()
        .ok_or_else(|| ToolError::InvalidArguments("Missing 'parameters' argument".into()))?;
    Ok((name, description, parameters))
}

fn spec_schema() -> serde_json::Value {
    serde_json::json!({
        "type": "object",
        "properties": {
            "name": {
                "type": "string",
                "description": "Tool name (snake_case)"
            },
            "description": {
                "type": "string",
                "description": "What the tool does"
            },
            "parameters": {
                "type": "object",
                "description": "JSON Schema for the tool's parameters"
            }
        },
        "required": ["name", "description", "parameters"]
    })
}

/// `create_tool` — register a new dynamic tool.
pub struct CreateToolTool {
    registry: SharedRegistry,
}

impl CreateToolTool {
    pub fn new(registry: SharedRegistry) -> Self {
        Self { registry }
    }
}

#[async_trait]
impl Tool for CreateToolTool {
    fn name(&self) -> &str {
        CREATE_TOOL
    }

    fn description(&self) -> &str {
        "Create and register a new tool from a spec (name, description, JSON \
         Schema parameters). The tool becomes available on the next step. \
         Never create a tool that duplicates an existing capability."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        spec_schema()
    }

    async fn execute(&self, arguments: serde_json::Value) -> Result<ToolOutput, ToolError> {
        let (name, description, parameters) = spec_parts(&arguments)?;
        let tool = DynamicTool::from_spec(name, description, parameters)?;

        // The dispatch gate rejects duplicates against the step snapshot
        // before execution; the registry check is the fail-closed backstop
        // for tools created earlier in the same step.
        self.registry.write().unwrap().register(Arc::new(tool))?;

        info!(tool = name, "Registered dynamic tool");
        Ok(ToolOutput::text(format!(
            "Created tool '{name}'. It is available from the next step."
        )))
    }
}

/// `update_tool` — replace an existing tool's contract.
pub struct UpdateToolTool {
    registry: SharedRegistry,
}

impl UpdateToolTool {
    pub fn new(registry: SharedRegistry) -> Self {
        Self { registry }
    }
}

#[async_trait]
impl Tool for UpdateToolTool {
    fn name(&self) -> &str {
        UPDATE_TOOL
    }

    fn description(&self) -> &str {
        "Replace an existing tool's description and parameter schema. Test \
         the updated tool before updating it again."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        spec_schema()
    }

    async fn execute(&self, arguments: serde_json::Value) -> Result<ToolOutput, ToolError> {
        let (name, description, parameters) = spec_parts(&arguments)?;

        if PROTECTED_TOOLS.contains(&name) {
            return Err(ToolError::PermissionDenied {
                tool_name: UPDATE_TOOL.into(),
                reason: format!("'{name}' is a protected tool and cannot be replaced"),
            });
        }

        let tool = DynamicTool::from_spec(name, description, parameters)?;
        self.registry.write().unwrap().replace(Arc::new(tool))?;

        info!(tool = name, "Updated dynamic tool");
        Ok(ToolOutput::text(format!(
            "Updated tool '{name}'. Test it before updating again."
        )))
    }
}

/// `remove_tool` — unregister a tool.
pub struct RemoveToolTool {
    registry: SharedRegistry,
}

impl RemoveToolTool {
    pub fn new(registry: SharedRegistry) -> Self {
        Self { registry }
    }
}

#[async_trait]
impl Tool for RemoveToolTool {
    fn name(&self) -> &str {
        REMOVE_TOOL
    }

    fn description(&self) -> &str {
        "Remove a previously created tool by name."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "name": {
                    "type": "string",
                    "description": "Name of the tool to remove"
                }
            },
            "required": ["name"]
        })
    }

    async fn execute(&self, arguments: serde_json::Value) -> Result<ToolOutput, ToolError> {
        let name = arguments["name"]
            .as_str()
            .ok_or_else(|| ToolError::InvalidArguments("Missing 'name' argument".into()))?;

        if PROTECTED_TOOLS.contains(&name) {
            return Err(ToolError::PermissionDenied {
                tool_name: REMOVE_TOOL.into(),
                reason: format!("'{name}' is a protected tool and cannot be removed"),
            });
        }

        if self.registry.write().unwrap().remove(name) {
            info!(tool = name, "Removed tool");
            Ok(ToolOutput::text(format!("Removed tool '{name}'.")))
        } else {
            Ok(ToolOutput::text(format!(
                "Error: no tool named '{name}' is registered."
            )))
        }
    }
}

/// Register the three management tools on the shared registry.
pub fn install(registry: &SharedRegistry) -> Result<(), ToolError> {
    let mut guard = registry.write().unwrap();
    guard.register(Arc::new(CreateToolTool::new(registry.clone())))?;
    guard.register(Arc::new(UpdateToolTool::new(registry.clone())))?;
    guard.register(Arc::new(RemoveToolTool::new(registry.clone())))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use loopwright_core::tool::{ToolRegistry, shared};

    fn registry_with_management() -> SharedRegistry {
        let registry = shared(ToolRegistry::new());
        install(&registry).unwrap();
        registry
    }

    #[tokio::test]
    async fn create_registers_next_snapshot() {
        let registry = registry_with_management();
        let create = CreateToolTool::new(registry.clone());

        let before = registry.read().unwrap().snapshot();
        let out = create
            .execute(serde_json::json!({
                "name": "reverse_text",
                "description": "Reverses text",
                "parameters": {"type": "object", "properties": {}}
            }))
            .await
            .unwrap();

        assert!(out.content.contains("Created tool 'reverse_text'"));
        // The pre-existing snapshot is unchanged; a fresh one sees the tool.
        assert!(!before.contains("reverse_text"));
        assert!(registry.read().unwrap().snapshot().contains("reverse_text"));
    }

    #[tokio::test]
    async fn create_duplicate_fails_closed() {
        let registry = registry_with_management();
        let create = CreateToolTool::new(registry.clone());
        let spec = serde_json::json!({
            "name": "reverse_text",
            "description": "Reverses text",
            "parameters": {"type": "object"}
        });

        create.execute(spec.clone()).await.unwrap();
        let err = create.execute(spec).await.unwrap_err();
        assert!(matches!(err, ToolError::Duplicate(_)));
        // Size unchanged by the failed attempt
        assert_eq!(registry.read().unwrap().len(), 4);
    }

    #[tokio::test]
    async fn update_requires_existing_tool() {
        let registry = registry_with_management();
        let update = UpdateToolTool::new(registry.clone());
        let err = update
            .execute(serde_json::json!({
                "name": "missing_tool",
                "description": "x",
                "parameters": {"type": "object"}
            }))
            .await
            .unwrap_err();
        assert!(matches!(err, ToolError::NotFound(_)));
    }

    #[tokio::test]
    async fn protected_tools_cannot_be_removed() {
        let registry = registry_with_management();
        let remove = RemoveToolTool::new(registry.clone());
        let err = remove
            .execute(serde_json::json!({"name": "create_tool"}))
            .await
            .unwrap_err();
        assert!(matches!(err, ToolError::PermissionDenied { .. }));
        assert!(registry.read().unwrap().contains("create_tool"));
    }

    #[tokio::test]
    async fn protected_tools_cannot_be_replaced() {
        let registry = registry_with_management();
        let update = UpdateToolTool::new(registry.clone());
        let err = update
            .execute(serde_json::json!({
                "name": "remove_tool",
                "description": "hijacked",
                "parameters": {"type": "object"}
            }))
            .await
            .unwrap_err();
        assert!(matches!(err, ToolError::PermissionDenied { .. }));
    }

    #[tokio::test]
    async fn remove_then_recreate() {
        let registry = registry_with_management();
        let create = CreateToolTool::new(registry.clone());
        let remove = RemoveToolTool::new(registry.clone());

        create
            .execute(serde_json::json!({
                "name": "scratch",
                "description": "temp",
                "parameters": {"type": "object"}
            }))
            .await
            .unwrap();
        let out = remove
            .execute(serde_json::json!({"name": "scratch"}))
            .await
            .unwrap();
        assert!(out.content.contains("Removed tool 'scratch'"));
        assert!(!registry.read().unwrap().contains("scratch"));

        // Recreating after removal works
        create
            .execute(serde_json::json!({
                "name": "scratch",
                "description": "temp",
                "parameters": {"type": "object"}
            }))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn remove_unknown_reports_as_output() {
        let registry = registry_with_management();
        let remove = RemoveToolTool::new(registry);
        let out = remove
            .execute(serde_json::json!({"name": "never_existed"}))
            .await
            .unwrap();
        assert!(out.content.starts_with("Error: no tool named"));
    }
}
