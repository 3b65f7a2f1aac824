//! Current time tool.

use async_trait::async_trait;
use chrono::Utc;
use loopwright_core::error::ToolError;
use loopwright_core::tool::{Tool, ToolOutput};

pub struct CurrentTimeTool;

#[async_trait]
impl Tool for CurrentTimeTool {
    fn name(&self) -> &str {
        "get_current_time"
    }

    fn description(&self) -> &str {
        "Get the current date and time (UTC)."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {}
        })
    }

    async fn execute(&self, _arguments: serde_json::Value) -> Result<ToolOutput, ToolError> {
        let now = Utc::now();
        Ok(ToolOutput::text(format!(
            "Current time: {} UTC",
            now.format("%Y-%m-%d %H:%M:%S")
        )))
    }
}
