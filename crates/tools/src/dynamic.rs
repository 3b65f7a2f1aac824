//! Dynamic tools — the scaffold behind model-authored tools.
//!
//! To the loop a created tool is just a name plus a callable contract; the
//! scaffold acknowledges invocations with its arguments until a real body
//! replaces it.

use async_trait::async_trait;
use loopwright_core::error::ToolError;
use loopwright_core::tool::{Tool, ToolOutput};

/// A tool registered at runtime from a model-provided spec.
pub struct DynamicTool {
    name: String,
    description: String,
    parameters: serde_json::Value,
}

impl DynamicTool {
    /// Build a dynamic tool from a spec, validating the name.
    pub fn from_spec(
        name: &str,
        description: &str,
        parameters: serde_json::Value,
    ) -> Result<Self, ToolError> {
        if !valid_tool_name(name) {
            return Err(ToolError::InvalidArguments(format!(
                "'{name}' is not a valid tool name (use snake_case alphanumerics)"
            )));
        }
        if description.trim().is_empty() {
            return Err(ToolError::InvalidArguments(
                "tool description is required".into(),
            ));
        }
        if !parameters.is_object() {
            return Err(ToolError::InvalidArguments(
                "tool parameters must be a JSON Schema object".into(),
            ));
        }
        Ok(Self {
            name: name.to_string(),
            description: description.to_string(),
            parameters,
        })
    }
}

/// snake_case alphanumerics, starting with a letter.
pub fn valid_tool_name(name: &str) -> bool {
    !name.is_empty()
        && name.chars().next().is_some_and(|c| c.is_ascii_lowercase())
        && name
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_')
}

#[async_trait]
impl Tool for DynamicTool {
    fn name(&self) -> &str {
        &self.name
    }

    fn description(&self) -> &str {
        &self.description
    }

    fn parameters_schema(&self) -> serde_json::Value {
        self.parameters.clone()
    }

    async fn execute(&self, arguments: serde_json::Value) -> Result<ToolOutput, ToolError> {
        Ok(ToolOutput::text(format!(
            "Tool '{}' executed with args: {arguments}",
            self.name
        )))
    }
}
