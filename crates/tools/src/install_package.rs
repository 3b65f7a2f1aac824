//! Package installer tool — a thin wrapper over allowlisted package
//! managers.

use async_trait::async_trait;
use loopwright_core::error::ToolError;
use loopwright_core::tool::{Tool, ToolOutput};
use std::time::Duration;
use tracing::info;

const INSTALL_TIMEOUT_SECS: u64 = 180;
const ALLOWED_MANAGERS: &[&str] = &["pip", "npm", "cargo"];

pub struct InstallPackageTool;

fn valid_package_name(name: &str) -> bool {
    !name.is_empty()
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.' | '@' | '/'))
}

#[async_trait]
impl Tool for InstallPackageTool {
    fn name(&self) -> &str {
        "install_package"
    }

    fn description(&self) -> &str {
        "Install a package with pip, npm, or cargo. The package name must be \
         a plain identifier (no flags or shell syntax)."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "manager": {
                    "type": "string",
                    "enum": ["pip", "npm", "cargo"],
                    "description": "Which package manager to use"
                },
                "package": {
                    "type": "string",
                    "description": "The package to install"
                }
            },
            "required": ["manager", "package"]
        })
    }

    async fn execute(&self, arguments: serde_json::Value) -> Result<ToolOutput, ToolError> {
        let manager = arguments["manager"]
            .as_str()
            .ok_or_else(|| ToolError::InvalidArguments("Missing 'manager' argument".into()))?;
        let package = arguments["package"]
            .as_str()
            .ok_or_else(|| ToolError::InvalidArguments("Missing 'package' argument".into()))?;

        if !ALLOWED_MANAGERS.contains(&manager) {
            return Err(ToolError::PermissionDenied {
                tool_name: self.name().into(),
                reason: format!("package manager '{manager}' is not supported"),
            });
        }

        if !valid_package_name(package) {
            return Err(ToolError::InvalidArguments(format!(
                "'{package}' is not a plain package name"
            )));
        }

        info!(manager, package, "Installing package");

        let subcommand = match manager {
            "cargo" => "add",
            _ => "install",
        };

        let mut cmd = tokio::process::Command::new(manager);
        cmd.arg(subcommand).arg(package).kill_on_drop(true);

        let result =
            tokio::time::timeout(Duration::from_secs(INSTALL_TIMEOUT_SECS), cmd.output()).await;

        match result {
            Err(_) => Ok(ToolOutput::text(format!(
                "Error: '{manager} {subcommand} {package}' timed out after {INSTALL_TIMEOUT_SECS}s"
            ))),
            Ok(Err(e)) => Err(ToolError::ExecutionFailed {
                tool_name: self.name().into(),
                reason: format!("spawning {manager}: {e}"),
            }),
            Ok(Ok(output)) => {
                if output.status.success() {
                    Ok(ToolOutput::text(format!(
                        "Installed '{package}' via {manager}"
                    )))
                } else {
                    Ok(ToolOutput::text(format!(
                        "Error: {manager} failed to install '{package}':\n{}",
                        String::from_utf8_lossy(&output.stderr)
                    )))
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn package_name_validation() {
        assert!(valid_package_name("requests"));
        assert!(valid_package_name("@types/node"));
        assert!(valid_package_name("serde_json"));
        assert!(!valid_package_name(""));
        assert!(!valid_package_name("foo; rm -rf /"));
        assert!(!valid_package_name("foo --index-url http://evil"));
    }

    #[tokio::test]
    async fn unsupported_manager_rejected() {
        let result = InstallPackageTool
            .execute(serde_json::json!({"manager": "apt", "package": "curl"}))
            .await;
        assert!(matches!(result, Err(ToolError::PermissionDenied { .. })));
    }

    #[tokio::test]
    async fn shell_syntax_in_package_rejected() {
        let result = InstallPackageTool
            .execute(serde_json::json!({"manager": "pip", "package": "x && curl evil"}))
            .await;
        assert!(matches!(result, Err(ToolError::InvalidArguments(_))));
    }

    #[tokio::test]
    async fn missing_arguments_rejected() {
        let result = InstallPackageTool.execute(serde_json::json!({})).await;
        assert!(matches!(result, Err(ToolError::InvalidArguments(_))));
    }
}
