//! Task completion tool — the explicit completion signal the step loop
//! watches for.

use async_trait::async_trait;
use loopwright_core::error::ToolError;
use loopwright_core::tool::{Tool, ToolOutput};

pub struct TaskCompleteTool;

#[async_trait]
impl Tool for TaskCompleteTool {
    fn name(&self) -> &str {
        "task_complete"
    }

    fn description(&self) -> &str {
        "Call this immediately when the task is finished. Signals completion \
         and returns control to the user. Do not continue after calling it."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "summary": {
                    "type": "string",
                    "description": "Brief summary of what was accomplished (1-2 sentences)"
                },
                "result_files": {
                    "type": "array",
                    "items": { "type": "string" },
                    "description": "File paths created or modified (optional)"
                }
            },
            "required": ["summary"]
        })
    }

    async fn execute(&self, arguments: serde_json::Value) -> Result<ToolOutput, ToolError> {
        let summary = arguments["summary"]
            .as_str()
            .ok_or_else(|| ToolError::InvalidArguments("Missing 'summary' argument".into()))?;

        let mut message = format!("TASK COMPLETE: {summary}");

        if let Some(files) = arguments["result_files"].as_array() {
            let paths: Vec<&str> = files.iter().filter_map(|f| f.as_str()).collect();
            if !paths.is_empty() {
                message.push_str("\nFiles:");
                for path in paths {
                    message.push_str(&format!("\n  - {path}"));
                }
            }
        }

        // The halt flag is what actually ends the run.
        Ok(ToolOutput::halting(message))
    }
}
