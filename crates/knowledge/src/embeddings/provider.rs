//! Embedding provider trait and factory.

use super::providers::{OllamaProvider, OpenAiProvider, TrigramProvider};
use ragprompt_core::{AppError, AppResult};
use std::sync::Arc;

/// Remote (or local) embedding service.
///
/// Implementations make a single attempt per call; retries belong to the
/// caller's `RetryPolicy`.
#[async_trait::async_trait]
pub trait EmbeddingProvider: Send + Sync + std::fmt::Debug {
    /// Get provider name (e.g., "ollama", "openai", "trigram")
    fn provider_name(&self) -> &str;

    /// Get model identifier
    fn model_name(&self) -> &str;

    /// Get embedding dimensions
    fn dimensions(&self) -> usize;

    /// Generate one embedding per input text, in input order.
    async fn embed_batch(&self, texts: &[String]) -> AppResult<Vec<Vec<f32>>>;

    /// Generate embedding for a single text (convenience method).
    async fn embed(&self, text: &str) -> AppResult<Vec<f32>> {
        let mut results = self.embed_batch(&[text.to_string()]).await?;
        results
            .pop()
            .ok_or_else(|| AppError::Embedding("No embedding returned".to_string()))
    }
}

/// Connection details for `create_provider`.
#[derive(Debug, Clone, Default)]
pub struct ProviderOptions<'a> {
    pub model: Option<&'a str>,
    pub endpoint: Option<&'a str>,
    pub api_key: Option<&'a str>,
    pub dimensions: usize,
}

/// Create an embedding provider by name.
pub fn create_provider(
    provider: &str,
    options: ProviderOptions<'_>,
) -> AppResult<Arc<dyn EmbeddingProvider>> {
    match provider.to_lowercase().as_str() {
        "ollama" => {
            let provider = OllamaProvider::new(
                options.endpoint,
                options.model.unwrap_or(super::providers::ollama::DEFAULT_MODEL),
                options.dimensions,
            )?;
            Ok(Arc::new(provider))
        }

        "openai" | "azure" => {
            let api_key = options.api_key.ok_or_else(|| {
                AppError::Config(
                    "OpenAI embedding provider requires an API key (set OPENAI_API_KEY)"
                        .to_string(),
                )
            })?;
            let provider = OpenAiProvider::new(
                options.endpoint,
                api_key,
                options.model.unwrap_or(super::providers::openai::DEFAULT_MODEL),
                options.dimensions,
            )?;
            Ok(Arc::new(provider))
        }

        "trigram" => Ok(Arc::new(TrigramProvider::new(options.dimensions))),

        _ => Err(AppError::Config(format!(
            "Unknown embedding provider: '{}'. Supported providers: ollama, openai, trigram",
            provider
        ))),
    }
}
