//! Shared input handling: message text, conversation history, pipeline run.

use ragprompt_core::{config::AppConfig, AppError, AppResult, ConversationTurn};
use ragprompt_knowledge::{build_pipeline, PipelineOutput};
use std::path::{Path, PathBuf};
use tokio_util::sync::CancellationToken;

/// Message from the positional argument or, failing that, a file.
pub fn resolve_message(message: Option<&str>, file: Option<&PathBuf>) -> AppResult<String> {
    if let Some(message) = message {
        return Ok(message.to_string());
    }

    match file {
        Some(path) => std::fs::read_to_string(path).map_err(|e| {
            AppError::Config(format!("Failed to read message file {:?}: {}", path, e))
        }),
        None => Err(AppError::Config(
            "No message provided (pass it as an argument or with --file)".to_string(),
        )),
    }
}

/// Conversation history from a JSON array of `{role, text, timestamp?}`.
pub fn load_history(path: Option<&Path>) -> AppResult<Vec<ConversationTurn>> {
    let Some(path) = path else {
        return Ok(Vec::new());
    };

    let contents = std::fs::read_to_string(path).map_err(|e| {
        AppError::Config(format!("Failed to read history file {:?}: {}", path, e))
    })?;

    let turns: Vec<ConversationTurn> = serde_json::from_str(&contents).map_err(|e| {
        AppError::Config(format!("Invalid history file {:?}: {}", path, e))
    })?;

    tracing::debug!("Loaded {} history turns from {:?}", turns.len(), path);
    Ok(turns)
}

/// Build the pipeline from configuration and run it once.
///
/// Ctrl-C cancels the in-flight run.
pub async fn run_pipeline(
    config: &AppConfig,
    message: &str,
    history: &[ConversationTurn],
) -> AppResult<PipelineOutput> {
    let pipeline = build_pipeline(config).await?;

    let cancel = CancellationToken::new();
    let on_interrupt = cancel.clone();
    let watcher = tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Interrupted, cancelling");
            on_interrupt.cancel();
        }
    });

    let result = pipeline.run(Some(message), history, &cancel).await;
    watcher.abort();
    result
}
