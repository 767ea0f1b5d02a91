//! ragprompt CLI
//!
//! Builds retrieval-augmented prompts from a vector index and, optionally,
//! asks a chat model to answer them.

mod commands;

use anyhow::Context;
use clap::{Parser, Subcommand};
use commands::{AskCommand, PromptCommand};
use ragprompt_core::{config::AppConfig, logging};
use std::path::PathBuf;
use tracing::Instrument;

/// ragprompt - retrieval-augmented prompts for conversational assistants
#[derive(Parser, Debug)]
#[command(name = "ragprompt")]
#[command(about = "Retrieval-augmented prompt assembly", long_about = None)]
#[command(version)]
struct Cli {
    /// Path to workspace directory (default: current directory)
    #[arg(short, long, global = true, env = "RAGPROMPT_WORKSPACE")]
    workspace: Option<PathBuf>,

    /// Path to config file
    #[arg(short, long, global = true, env = "RAGPROMPT_CONFIG")]
    config: Option<PathBuf>,

    /// Log level (error, warn, info, debug, trace)
    #[arg(long, global = true, env = "RUST_LOG")]
    log_level: Option<String>,

    /// Enable verbose output (sets log level to debug)
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Disable colored output
    #[arg(long, global = true, env = "NO_COLOR")]
    no_color: bool,

    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    json_logs: bool,

    /// Chat provider (ollama, openai)
    #[arg(short, long, global = true, env = "RAGPROMPT_PROVIDER")]
    provider: Option<String>,

    /// Chat model identifier
    #[arg(short, long, global = true, env = "RAGPROMPT_MODEL")]
    model: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Build the augmented prompt for a message and print it
    Prompt(PromptCommand),

    /// Ask a question answered from retrieved content
    Ask(AskCommand),
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Parse command-line arguments first (needed for logging config)
    let cli = Cli::parse();

    let mut config = AppConfig::load().context("Failed to load configuration")?;

    // A different workspace or config path means a different file to merge
    if cli.workspace.is_some() || cli.config.is_some() {
        config = config
            .with_overrides(cli.workspace, cli.config, None, None, None, false, false, false)
            .reload_file()
            .context("Failed to load configuration file")?;
    }

    // CLI flags win over environment and config file
    let config = config.with_overrides(
        None,
        None,
        cli.provider,
        cli.model,
        cli.log_level,
        cli.verbose,
        cli.no_color,
        cli.json_logs,
    );

    logging::init_logging(config.log_level.as_deref(), config.no_color, config.json_logs)?;

    tracing::info!("ragprompt starting");
    tracing::debug!("Workspace: {:?}", config.workspace);
    tracing::debug!("Provider: {}", config.provider);
    tracing::debug!("Model: {}", config.model);

    config.validate()?;

    let command_name = match &cli.command {
        Commands::Prompt(_) => "prompt",
        Commands::Ask(_) => "ask",
    };
    let span = tracing::info_span!("command", name = command_name);

    let result = async {
        match cli.command {
            Commands::Prompt(cmd) => cmd.execute(&config).await,
            Commands::Ask(cmd) => cmd.execute(&config).await,
        }
    }
    .instrument(span)
    .await;

    match &result {
        Ok(_) => tracing::info!("Command completed successfully"),
        Err(e) => tracing::error!("Command failed: {}", e),
    }

    Ok(result?)
}
