//! Workspace path sandboxing for file tools.

use loopwright_core::error::ToolError;
use std::path::{Component, Path, PathBuf};

/// Path policy applied by the file tools before touching the filesystem.
#[derive(Debug, Clone, Default)]
pub struct Sandbox {
    /// Root directory the tools may touch. None = no root restriction.
    pub allowed_root: Option<PathBuf>,

    /// Forbidden path prefixes (checked after `~` expansion).
    pub forbidden_prefixes: Vec<String>,
}

impl Sandbox {
    /// A sandbox with no restrictions.
    pub fn unrestricted() -> Self {
        Self::default()
    }

    /// A sandbox restricted to the given root directory.
    pub fn rooted(root: impl Into<PathBuf>) -> Self {
        Self {
            allowed_root: Some(root.into()),
            forbidden_prefixes: Vec::new(),
        }
    }

    /// Add forbidden path prefixes.
    pub fn with_forbidden(mut self, prefixes: Vec<String>) -> Self {
        self.forbidden_prefixes = prefixes;
        self
    }

    /// Validate a path against the policy and resolve it to the path the
    /// tool should use. Fails closed on traversal out of the root and on
    /// forbidden prefixes.
    pub fn check(&self, tool_name: &str, raw: &str) -> Result<PathBuf, ToolError> {
        let expanded = expand_home(raw);

        for prefix in &self.forbidden_prefixes {
            let prefix_expanded = expand_home(prefix);
            if expanded.starts_with(&prefix_expanded) {
                return Err(ToolError::PermissionDenied {
                    tool_name: tool_name.into(),
                    reason: format!("path '{raw}' is under forbidden prefix '{prefix}'"),
                });
            }
        }

        if let Some(root) = &self.allowed_root {
            let candidate = if expanded.is_absolute() {
                expanded.clone()
            } else {
                root.join(&expanded)
            };

            // Reject traversal components instead of requiring the target
            // to exist for canonicalization.
            if candidate
                .components()
                .any(|c| matches!(c, Component::ParentDir))
            {
                return Err(ToolError::PermissionDenied {
                    tool_name: tool_name.into(),
                    reason: format!("path '{raw}' contains parent-directory traversal"),
                });
            }

            if !candidate.starts_with(root) {
                return Err(ToolError::PermissionDenied {
                    tool_name: tool_name.into(),
                    reason: format!(
                        "path '{raw}' is outside the workspace root '{}'",
                        root.display()
                    ),
                });
            }

            return Ok(candidate);
        }

        Ok(expanded)
    }
}

fn expand_home(raw: &str) -> PathBuf {
    if let Some(rest) = raw.strip_prefix("~/") {
        if let Ok(home) = std::env::var("HOME") {
            return Path::new(&home).join(rest);
        }
    }
    PathBuf::from(raw)
}
