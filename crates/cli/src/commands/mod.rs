//! CLI command implementations.

pub mod chat;
pub mod onboard;
pub mod run;
pub mod tools_cmd;

use loopwright_config::AppConfig;
use loopwright_core::event::{EventBus, RunEvent};
use loopwright_core::tool::SharedRegistry;
use loopwright_providers::OpenAiCompatClient;
use loopwright_runner::{RunBudget, StepLoop};
use loopwright_tools::Sandbox;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;

/// Everything a run session needs, assembled from the config.
pub struct Session {
    pub step_loop: StepLoop,
    pub registry: SharedRegistry,
    pub events: Arc<EventBus>,
}

/// Load config, check the API key, and assemble a session.
pub fn build_session(max_steps_override: Option<u32>) -> Result<Session, Box<dyn std::error::Error>> {
    let config = AppConfig::load().map_err(|e| format!("Failed to load config: {e}"))?;

    let Some(api_key) = config.api_key.clone() else {
        eprintln!();
        eprintln!("  ERROR: No API key configured!");
        eprintln!();
        eprintln!("  Set one of these environment variables:");
        eprintln!("    OPENROUTER_API_KEY=sk-or-v1-...   (recommended)");
        eprintln!("    OPENAI_API_KEY=sk-...             (for OpenAI direct)");
        eprintln!("    LOOPWRIGHT_API_KEY=sk-...         (generic)");
        eprintln!();
        eprintln!("  Or add it to your config file:");
        eprintln!("    {}", AppConfig::config_dir().join("config.toml").display());
        eprintln!();
        return Err("No API key found. See above for setup instructions.".into());
    };

    let provider = Arc::new(OpenAiCompatClient::new(
        "openai-compat",
        &config.api_url,
        api_key,
    ));

    let sandbox = Sandbox {
        allowed_root: config.workspace.root.clone().map(PathBuf::from),
        forbidden_prefixes: config.workspace.forbidden_paths.clone(),
    };
    let registry = loopwright_tools::default_registry(
        sandbox,
        config.workspace.allowed_commands.clone(),
    )
    .map_err(|e| format!("Failed to build tool registry: {e}"))?;

    let events = Arc::new(EventBus::default());

    let step_loop = StepLoop::new(
        provider,
        &config.model,
        registry.clone(),
        events.clone(),
    )
    .with_temperature(config.temperature)
    .with_max_tokens(config.max_tokens)
    .with_budget(RunBudget::new(
        max_steps_override.unwrap_or(config.run.max_steps),
        config.run.max_tools_per_step,
    ))
    .with_thresholds(
        config.anomaly.warning_threshold,
        config.anomaly.fatal_grace,
    )
    .with_timeouts(
        Duration::from_secs(config.run.model_timeout_secs),
        Duration::from_secs(config.run.tool_timeout_secs),
    )
    .with_retries(
        config.run.model_retries,
        Duration::from_millis(config.run.retry_backoff_ms),
    );

    Ok(Session {
        step_loop,
        registry,
        events,
    })
}

/// Wire Ctrl+C to the run's cancellation channel.
pub fn ctrl_c_cancellation() -> watch::Receiver<bool> {
    let (tx, rx) = watch::channel(false);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            let _ = tx.send(true);
        }
    });
    rx
}

/// Print lifecycle events as they arrive.
pub fn spawn_event_printer(events: &EventBus) -> tokio::task::JoinHandle<()> {
    let mut rx = events.subscribe();
    tokio::spawn(async move {
        while let Ok(event) = rx.recv().await {
            match event.as_ref() {
                RunEvent::StepStarted { step } => {
                    println!("  [step {step}]");
                }
                RunEvent::ToolDispatched { tool, .. } => {
                    println!("    -> {tool}");
                }
                RunEvent::ToolCompleted {
                    tool,
                    outcome,
                    duration_ms,
                    ..
                } => {
                    println!("    <- {tool}: {outcome} ({duration_ms}ms)");
                }
                RunEvent::AnomalyWarned {
                    class, consecutive, ..
                } => {
                    println!("    !! anomalous output ({class}, x{consecutive}) — recovery message sent");
                }
                RunEvent::CircuitOpened { step } => {
                    println!("    !! circuit open at step {step} — critical intervention sent");
                }
                RunEvent::RunCompleted {
                    reason,
                    steps,
                    tools_executed,
                } => {
                    println!("  [{reason}] {steps} step(s), {tools_executed} tool call(s)");
                }
            }
        }
    })
}
