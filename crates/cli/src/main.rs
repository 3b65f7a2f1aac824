//! LoopWright CLI — the main entry point.
//!
//! Commands:
//! - `run`     — Execute one task autonomously to a terminal outcome
//! - `chat`    — Interactive mode (one bounded run per user turn)
//! - `tools`   — List the available tools
//! - `onboard` — Initialize the config file

use clap::{Parser, Subcommand};

mod commands;

#[derive(Parser)]
#[command(
    name = "loopwright",
    about = "LoopWright — bounded autonomous task-loop runtime",
    version,
    author
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a single task to completion (or budget/anomaly termination)
    Run {
        /// The task to execute
        task: String,

        /// Override the step budget for this run
        #[arg(long)]
        max_steps: Option<u32>,
    },

    /// Interactive mode — each message starts a bounded run
    Chat,

    /// List the registered tools
    Tools,

    /// Initialize configuration
    Onboard,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Initialize tracing
    let filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(filter)),
        )
        .with_target(false)
        .init();

    match cli.command {
        Commands::Run { task, max_steps } => commands::run::run(task, max_steps).await?,
        Commands::Chat => commands::chat::run().await?,
        Commands::Tools => commands::tools_cmd::run().await?,
        Commands::Onboard => commands::onboard::run().await?,
    }

    Ok(())
}
