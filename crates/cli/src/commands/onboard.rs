//! `loopwright onboard` — initialize the config file.

use loopwright_config::AppConfig;

pub async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let config_dir = AppConfig::config_dir();
    let config_path = config_dir.join("config.toml");

    if config_path.exists() {
        println!();
        println!("  Config already exists: {}", config_path.display());
        println!();
        return Ok(());
    }

    std::fs::create_dir_all(&config_dir)?;
    std::fs::create_dir_all(AppConfig::workspace_dir())?;
    std::fs::write(&config_path, AppConfig::default_toml())?;

    println!();
    println!("  Wrote default config: {}", config_path.display());
    println!("  Workspace directory: {}", AppConfig::workspace_dir().display());
    println!();
    println!("  Next: set an API key, e.g.");
    println!("    export OPENROUTER_API_KEY=sk-or-v1-...");
    println!();

    Ok(())
}
