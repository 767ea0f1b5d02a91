//! Ask command handler.
//!
//! Runs the query pipeline, then sends the augmented prompt to the chat model
//! together with the configured system prompt.

use super::input::{load_history, resolve_message, run_pipeline};
use super::prompt::prompt_json;
use clap::Args;
use futures::StreamExt;
use ragprompt_core::{config::AppConfig, AppResult};
use ragprompt_knowledge::PipelineOutput;
use ragprompt_llm::{create_client, LlmClient, LlmRequest, LlmUsage};
use std::io::Write;
use std::path::PathBuf;

/// Answer given instead of calling the model when a query is rejected.
pub const REJECTION_ANSWER: &str = "I'm sorry, I do not know how to answer that question. Please try to rephrase your query. You can also refer to the further reading to see if it helps.";

/// Ask a question answered from retrieved content
#[derive(Args, Debug)]
pub struct AskCommand {
    /// The question to ask
    pub message: Option<String>,

    /// Read the question from a file
    #[arg(short, long)]
    pub file: Option<PathBuf>,

    /// Conversation history (JSON array of {role, text, timestamp?})
    #[arg(long)]
    pub history: Option<PathBuf>,

    /// Disable streaming
    #[arg(long)]
    pub no_stream: bool,

    /// Maximum tokens in response
    #[arg(long)]
    pub max_tokens: Option<u32>,

    /// Temperature for response generation (0.0-2.0)
    #[arg(long)]
    pub temperature: Option<f32>,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

impl AskCommand {
    /// Execute the ask command.
    pub async fn execute(&self, config: &AppConfig) -> AppResult<()> {
        tracing::info!("Executing ask command");
        tracing::debug!("Ask command options: {:?}", self);

        let message = resolve_message(self.message.as_deref(), self.file.as_ref())?;
        let history = load_history(self.history.as_deref())?;

        let output = run_pipeline(config, &message, &history).await?;

        if output.query.rejected {
            tracing::info!("Query rejected by preprocessor, not calling the model");
            return self.print_answer(REJECTION_ANSWER, &output, config, None);
        }

        let api_key = config.resolve_api_key(&config.provider);
        let client = create_client(
            &config.provider,
            config.endpoint_for(&config.provider),
            api_key.as_deref(),
            config.timeout_for(&config.provider),
        )?;

        let request = LlmRequest::new(output.prompt.llm_text.clone(), &config.model)
            .with_system(config.system_prompt.clone())
            .with_temperature(self.temperature.unwrap_or(config.llm.temperature))
            .with_max_tokens(self.max_tokens.unwrap_or(config.llm.max_tokens));

        if self.no_stream || self.json {
            self.handle_non_streaming(client.as_ref(), &request, &output, config)
                .await
        } else {
            self.handle_streaming(client.as_ref(), &request.with_streaming())
                .await
        }
    }

    async fn handle_non_streaming(
        &self,
        client: &dyn LlmClient,
        request: &LlmRequest,
        output: &PipelineOutput,
        config: &AppConfig,
    ) -> AppResult<()> {
        tracing::info!("Sending non-streaming request to {}", client.provider_name());

        let response = client.complete(request).await?;
        self.print_answer(&response.content, output, config, Some(&response.usage))
    }

    async fn handle_streaming(&self, client: &dyn LlmClient, request: &LlmRequest) -> AppResult<()> {
        tracing::info!("Starting streaming request to {}", client.provider_name());

        let mut stream = client.stream(request).await?;
        let mut final_usage = None;
        let mut stdout = std::io::stdout();

        while let Some(result) = stream.next().await {
            let chunk = result?;

            if !chunk.content.is_empty() {
                print!("{}", chunk.content);
                stdout.flush().ok();
            }

            if chunk.done {
                final_usage = chunk.usage;
                break;
            }
        }
        println!();

        if let Some(usage) = final_usage {
            log_usage(&usage);
        }
        Ok(())
    }

    fn print_answer(
        &self,
        answer: &str,
        output: &PipelineOutput,
        config: &AppConfig,
        usage: Option<&LlmUsage>,
    ) -> AppResult<()> {
        if self.json {
            let json = serde_json::json!({
                "answer": answer,
                "model": config.model,
                "provider": config.provider,
                "usage": usage.map(|u| serde_json::json!({
                    "promptTokens": u.prompt_tokens,
                    "completionTokens": u.completion_tokens,
                    "totalTokens": u.total_tokens
                })),
                "prompt": prompt_json(output),
            });
            println!("{}", serde_json::to_string_pretty(&json)?);
        } else {
            println!("{}", answer);
            if let Some(usage) = usage {
                log_usage(usage);
            }
        }
        Ok(())
    }
}

fn log_usage(usage: &LlmUsage) {
    tracing::debug!(
        "Token usage - Prompt: {}, Completion: {}, Total: {}",
        usage.prompt_tokens,
        usage.completion_tokens,
        usage.total_tokens
    );
}
