//! Built-in tool implementations for LoopWright.
//!
//! Tools give the loop the ability to act in the world: read/write files,
//! run commands, install packages, mark the task complete — plus the
//! management tools that let the model grow its own tool set at runtime.
//!
//! Security defaults:
//! - run_command: only common safe programs
//! - read/write: sensitive path prefixes (/etc, ~/.ssh, ...) are blocked

pub mod current_time;
pub mod dynamic;
pub mod install_package;
pub mod management;
pub mod paths;
pub mod read_file;
pub mod run_command;
pub mod task_complete;
pub mod write_file;

use loopwright_core::error::ToolError;
use loopwright_core::tool::{SharedRegistry, ToolRegistry, shared};
use std::sync::Arc;

pub use dynamic::DynamicTool;
pub use management::{CREATE_TOOL, PROTECTED_TOOLS, REMOVE_TOOL, UPDATE_TOOL};
pub use paths::Sandbox;

/// Create the default shared registry with all built-in tools, the
/// completion signal, and the management tools.
pub fn default_registry(
    sandbox: Sandbox,
    allowed_commands: Vec<String>,
) -> Result<SharedRegistry, ToolError> {
    let mut registry = ToolRegistry::new();
    registry.register(Arc::new(read_file::ReadFileTool::new(sandbox.clone())))?;
    registry.register(Arc::new(write_file::WriteFileTool::new(sandbox)))?;
    registry.register(Arc::new(current_time::CurrentTimeTool))?;
    registry.register(Arc::new(run_command::RunCommandTool::new(allowed_commands)))?;
    registry.register(Arc::new(install_package::InstallPackageTool))?;
    registry.register(Arc::new(task_complete::TaskCompleteTool))?;

    let registry = shared(registry);
    management::install(&registry)?;
    Ok(registry)
}
