//! Write file tool — overwrite or append, creating parent directories.

use crate::paths::Sandbox;
use async_trait::async_trait;
use loopwright_core::error::ToolError;
use loopwright_core::tool::{Tool, ToolOutput};

pub struct WriteFileTool {
    sandbox: Sandbox,
}

impl WriteFileTool {
    pub fn new(sandbox: Sandbox) -> Self {
        Self { sandbox }
    }
}

#[async_trait]
impl Tool for WriteFileTool {
    fn name(&self) -> &str {
        "write_file"
    }

    fn description(&self) -> &str {
        "Write or append text to a file. Creates the file and any parent \
         directories. Fix files in place rather than writing 'fixed_' copies."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "path": {
                    "type": "string",
                    "description": "The path to write"
                },
                "content": {
                    "type": "string",
                    "description": "The content to write"
                },
                "mode": {
                    "type": "string",
                    "enum": ["write", "append"],
                    "description": "write = overwrite (default), append = add to the end"
                }
            },
            "required": ["path", "content"]
        })
    }

    async fn execute(&self, arguments: serde_json::Value) -> Result<ToolOutput, ToolError> {
        let raw_path = arguments["path"]
            .as_str()
            .ok_or_else(|| ToolError::InvalidArguments("Missing 'path' argument".into()))?;
        let content = arguments["content"]
            .as_str()
            .ok_or_else(|| ToolError::InvalidArguments("Missing 'content' argument".into()))?;
        let mode = arguments["mode"].as_str().unwrap_or("write");

        let path = self.sandbox.check(self.name(), raw_path)?;

        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| ToolError::ExecutionFailed {
                    tool_name: self.name().into(),
                    reason: format!("creating parent directories: {e}"),
                })?;
        }

        match mode {
            "write" => {
                tokio::fs::write(&path, content).await.map_err(|e| {
                    ToolError::ExecutionFailed {
                        tool_name: self.name().into(),
                        reason: e.to_string(),
                    }
                })?;
                Ok(ToolOutput::text(format!(
                    "Wrote {} characters to '{raw_path}'",
                    content.len()
                )))
            }
            "append" => {
                let mut current = tokio::fs::read_to_string(&path).await.unwrap_or_default();
                if !current.is_empty() && !current.ends_with('\n') {
                    current.push('\n');
                }
                current.push_str(content);
                tokio::fs::write(&path, current).await.map_err(|e| {
                    ToolError::ExecutionFailed {
                        tool_name: self.name().into(),
                        reason: e.to_string(),
                    }
                })?;
                Ok(ToolOutput::text(format!(
                    "Appended {} characters to '{raw_path}'",
                    content.len()
                )))
            }
            other => Ok(ToolOutput::text(format!(
                "Error: unknown write mode '{other}' (use 'write' or 'append')"
            ))),
        }
    }
}
