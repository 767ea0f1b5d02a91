//! Prompt command handler.
//!
//! Runs the query pipeline and prints the assembled prompt without calling a
//! language model.

use super::input::{load_history, resolve_message, run_pipeline};
use clap::Args;
use ragprompt_core::{config::AppConfig, AppResult};
use ragprompt_knowledge::PipelineOutput;
use std::path::PathBuf;

/// Build the retrieval-augmented prompt for a message
#[derive(Args, Debug)]
pub struct PromptCommand {
    /// The user message
    pub message: Option<String>,

    /// Read the message from a file
    #[arg(short, long)]
    pub file: Option<PathBuf>,

    /// Conversation history (JSON array of {role, text, timestamp?})
    #[arg(long)]
    pub history: Option<PathBuf>,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

impl PromptCommand {
    pub async fn execute(&self, config: &AppConfig) -> AppResult<()> {
        tracing::info!("Executing prompt command");

        let message = resolve_message(self.message.as_deref(), self.file.as_ref())?;
        let history = load_history(self.history.as_deref())?;

        let output = run_pipeline(config, &message, &history).await?;

        if self.json {
            println!("{}", serde_json::to_string_pretty(&prompt_json(&output))?);
        } else {
            println!("{}", output.prompt.llm_text);
        }

        Ok(())
    }
}

/// JSON view of a pipeline run.
pub fn prompt_json(output: &PipelineOutput) -> serde_json::Value {
    serde_json::json!({
        "originalText": output.prompt.original_text,
        "standaloneQuery": output.query.standalone_text,
        "metadata": output.query.metadata,
        "rejected": output.query.rejected,
        "embeddingStatus": output.embedding_status,
        "chunkCount": output.chunk_count,
        "contextBlock": output.prompt.context_block,
        "llmText": output.prompt.llm_text,
    })
}
