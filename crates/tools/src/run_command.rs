//! Command runner tool — allowlisted programs with a hard timeout.

use async_trait::async_trait;
use loopwright_core::error::ToolError;
use loopwright_core::tool::{Tool, ToolOutput};
use std::time::Duration;
use tracing::debug;

/// Hard ceiling on the per-command timeout the model may request.
const MAX_TIMEOUT_SECS: u64 = 300;
const DEFAULT_TIMEOUT_SECS: u64 = 30;

pub struct RunCommandTool {
    /// Programs the tool may execute (matched against the first token).
    allowed_programs: Vec<String>,
}

impl RunCommandTool {
    pub fn new(allowed_programs: Vec<String>) -> Self {
        Self { allowed_programs }
    }
}

#[async_trait]
impl Tool for RunCommandTool {
    fn name(&self) -> &str {
        "run_command"
    }

    fn description(&self) -> &str {
        "Execute an allowlisted shell command with timeout protection. \
         If a command times out, break it into smaller parts."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "command": {
                    "type": "string",
                    "description": "The shell command to execute"
                },
                "timeout": {
                    "type": "integer",
                    "description": "Timeout in seconds (default: 30, max: 300)"
                },
                "cwd": {
                    "type": "string",
                    "description": "Working directory for the command"
                }
            },
            "required": ["command"]
        })
    }

    async fn execute(&self, arguments: serde_json::Value) -> Result<ToolOutput, ToolError> {
        let command = arguments["command"]
            .as_str()
            .ok_or_else(|| ToolError::InvalidArguments("Missing 'command' argument".into()))?;

        let program = command.split_whitespace().next().unwrap_or("");
        if !self.allowed_programs.iter().any(|p| p == program) {
            return Err(ToolError::PermissionDenied {
                tool_name: self.name().into(),
                reason: format!(
                    "program '{program}' is not allowlisted (allowed: {})",
                    self.allowed_programs.join(", ")
                ),
            });
        }

        let timeout_secs = arguments["timeout"]
            .as_u64()
            .unwrap_or(DEFAULT_TIMEOUT_SECS)
            .min(MAX_TIMEOUT_SECS);

        let mut cmd = tokio::process::Command::new("sh");
        cmd.arg("-c").arg(command);
        if let Some(cwd) = arguments["cwd"].as_str() {
            cmd.current_dir(cwd);
        }
        cmd.kill_on_drop(true);

        debug!(command, timeout_secs, "Running command");

        let result = tokio::time::timeout(Duration::from_secs(timeout_secs), cmd.output()).await;

        match result {
            Err(_) => Ok(ToolOutput::text(format!(
                "Error: command timed out after {timeout_secs}s: {command}"
            ))),
            Ok(Err(e)) => Err(ToolError::ExecutionFailed {
                tool_name: self.name().into(),
                reason: e.to_string(),
            }),
            Ok(Ok(output)) => {
                let stdout = String::from_utf8_lossy(&output.stdout);
                let stderr = String::from_utf8_lossy(&output.stderr);
                let mut report = format!("Exit code: {}\n", output.status.code().unwrap_or(-1));
                if !stdout.is_empty() {
                    report.push_str(&format!("stdout:\n{stdout}"));
                }
                if !stderr.is_empty() {
                    report.push_str(&format!("stderr:\n{stderr}"));
                }
                Ok(ToolOutput::text(report))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tool() -> RunCommandTool {
        RunCommandTool::new(vec!["echo".into(), "pwd".into(), "sleep".into()])
    }

    #[tokio::test]
    async fn runs_allowlisted_command() {
        let out = tool()
            .execute(serde_json::json!({"command": "echo hello"}))
            .await
            .unwrap();
        assert!(out.content.contains("Exit code: 0"));
        assert!(out.content.contains("hello"));
    }

    #[tokio::test]
    async fn blocks_unlisted_program() {
        let result = tool()
            .execute(serde_json::json!({"command": "rm -rf /"}))
            .await;
        assert!(matches!(result, Err(ToolError::PermissionDenied { .. })));
    }

    #[tokio::test]
    async fn timeout_is_an_output_not_a_hang() {
        let out = tool()
            .execute(serde_json::json!({"command": "sleep 5", "timeout": 1}))
            .await
            .unwrap();
        assert!(out.content.contains("timed out after 1s"));
    }

    #[tokio::test]
    async fn missing_command_rejected() {
        let result = tool().execute(serde_json::json!({})).await;
        assert!(matches!(result, Err(ToolError::InvalidArguments(_))));
    }
}
