//! Read file tool — file contents with optional line ranges, or a
//! directory listing when pointed at a directory.

use crate::paths::Sandbox;
use async_trait::async_trait;
use loopwright_core::error::ToolError;
use loopwright_core::tool::{Tool, ToolOutput};

/// Maximum file size the tool will read.
const MAX_FILE_BYTES: u64 = 1024 * 1024;

pub struct ReadFileTool {
    sandbox: Sandbox,
}

impl ReadFileTool {
    pub fn new(sandbox: Sandbox) -> Self {
        Self { sandbox }
    }
}

#[async_trait]
impl Tool for ReadFileTool {
    fn name(&self) -> &str {
        "read_file"
    }

    fn description(&self) -> &str {
        "Read the contents of a text file (max 1MB), optionally a line range. \
         Pointed at a directory, lists its entries instead."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "path": {
                    "type": "string",
                    "description": "The file or directory path to read"
                },
                "start_line": {
                    "type": "integer",
                    "description": "Optional: first line to include (1-indexed)"
                },
                "end_line": {
                    "type": "integer",
                    "description": "Optional: last line to include (inclusive)"
                }
            },
            "required": ["path"]
        })
    }

    async fn execute(&self, arguments: serde_json::Value) -> Result<ToolOutput, ToolError> {
        let raw_path = arguments["path"]
            .as_str()
            .ok_or_else(|| ToolError::InvalidArguments("Missing 'path' argument".into()))?;

        let path = self.sandbox.check(self.name(), raw_path)?;

        let meta = match tokio::fs::metadata(&path).await {
            Ok(m) => m,
            Err(e) => {
                return Ok(ToolOutput::text(format!(
                    "Error: cannot access '{raw_path}': {e}"
                )));
            }
        };

        if meta.is_dir() {
            let mut entries = Vec::new();
            let mut dir = tokio::fs::read_dir(&path)
                .await
                .map_err(|e| ToolError::ExecutionFailed {
                    tool_name: self.name().into(),
                    reason: e.to_string(),
                })?;
            while let Ok(Some(entry)) = dir.next_entry().await {
                let suffix = if entry.path().is_dir() { "/" } else { "" };
                entries.push(format!("{}{suffix}", entry.file_name().to_string_lossy()));
            }
            entries.sort();
            return Ok(ToolOutput::text(format!(
                "Directory listing of '{raw_path}':\n{}",
                entries.join("\n")
            )));
        }

        if meta.len() > MAX_FILE_BYTES {
            return Ok(ToolOutput::text(format!(
                "Error: file '{raw_path}' is too large ({} bytes, max {MAX_FILE_BYTES})",
                meta.len()
            )));
        }

        let content = match tokio::fs::read_to_string(&path).await {
            Ok(c) => c,
            Err(e) => {
                return Ok(ToolOutput::text(format!(
                    "Error: failed to read '{raw_path}': {e}"
                )));
            }
        };

        let start = arguments["start_line"].as_u64().unwrap_or(1).max(1) as usize;
        let end = arguments["end_line"].as_u64().map(|n| n as usize);

        let lines: Vec<&str> = content.split('\n').collect();
        let end = end.unwrap_or(lines.len()).min(lines.len());

        if start == 1 && end == lines.len() {
            Ok(ToolOutput::text(format!(
                "File content of '{raw_path}':\n{content}"
            )))
        } else {
            // A start past the end yields an empty slice, not a panic.
            let begin = (start - 1).min(end);
            let slice = lines[begin..end].join("\n");
            Ok(ToolOutput::text(format!(
                "File content of '{raw_path}' (lines {start}-{end}):\n{slice}"
            )))
        }
    }
}
