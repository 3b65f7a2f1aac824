//! `loopwright tools` — list the registered tools.

use loopwright_config::AppConfig;
use loopwright_tools::Sandbox;
use std::path::PathBuf;

pub async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let config = AppConfig::load().unwrap_or_default();

    let sandbox = Sandbox {
        allowed_root: config.workspace.root.clone().map(PathBuf::from),
        forbidden_prefixes: config.workspace.forbidden_paths.clone(),
    };
    let registry =
        loopwright_tools::default_registry(sandbox, config.workspace.allowed_commands.clone())
            .map_err(|e| format!("Failed to build tool registry: {e}"))?;

    let snapshot = registry.read().unwrap().snapshot();

    println!();
    println!("  Registered tools ({}):", snapshot.len());
    println!();
    for definition in snapshot.definitions() {
        println!("  {:<18} {}", definition.name, definition.description);
    }
    println!();

    Ok(())
}
