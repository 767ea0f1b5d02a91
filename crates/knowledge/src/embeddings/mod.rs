//! Query embedding.
//!
//! `Embedder` wraps an `EmbeddingProvider` with a retry policy and turns every
//! result into an `EmbedOutcome`. It never returns an error: a failed service
//! degrades retrieval to an empty context, and the outcome says why.

pub mod provider;
pub mod providers;

pub use provider::{create_provider, EmbeddingProvider, ProviderOptions};

use ragprompt_core::{AppError, RetryPolicy};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Result of embedding one query.
#[derive(Debug, Clone, PartialEq)]
pub enum EmbedOutcome {
    /// Non-empty vector from the provider
    Vector(Vec<f32>),

    /// Nothing to embed
    Empty,

    /// Provider failed after the retry budget
    Failed(String),

    Cancelled,
}

impl EmbedOutcome {
    pub fn status(&self) -> EmbeddingStatus {
        match self {
            Self::Vector(_) => EmbeddingStatus::Ok,
            Self::Empty => EmbeddingStatus::Empty,
            Self::Failed(_) => EmbeddingStatus::Failed,
            Self::Cancelled => EmbeddingStatus::Cancelled,
        }
    }

    /// The vector, or an empty one for every other outcome.
    pub fn into_vector(self) -> Vec<f32> {
        match self {
            Self::Vector(vector) => vector,
            _ => Vec::new(),
        }
    }
}

/// Serializable summary of an `EmbedOutcome`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EmbeddingStatus {
    Ok,
    Empty,
    Failed,
    Cancelled,
}

impl EmbeddingStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Ok => "ok",
            Self::Empty => "empty",
            Self::Failed => "failed",
            Self::Cancelled => "cancelled",
        }
    }
}

/// Embeds query text with bounded retries.
#[derive(Debug, Clone)]
pub struct Embedder {
    provider: Arc<dyn EmbeddingProvider>,
    policy: RetryPolicy,
}

impl Embedder {
    pub fn new(provider: Arc<dyn EmbeddingProvider>, policy: RetryPolicy) -> Self {
        Self { provider, policy }
    }

    pub fn provider(&self) -> &dyn EmbeddingProvider {
        self.provider.as_ref()
    }

    /// Embed `text`, retrying transient failures per the policy.
    ///
    /// Whitespace-only text yields `Empty` without contacting the provider.
    #[tracing::instrument(skip(self, text, cancel), fields(text_len = text.len(), provider = self.provider.provider_name(), model = self.provider.model_name()))]
    pub async fn embed(&self, text: &str, cancel: &CancellationToken) -> EmbedOutcome {
        if text.trim().is_empty() {
            tracing::debug!("Nothing to embed");
            return EmbedOutcome::Empty;
        }

        let run = self.policy.run(
            "embedding",
            |_| self.provider.embed(text),
            |err: &AppError| !err.is_cancellation(),
        );

        tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                tracing::debug!("Embedding cancelled");
                EmbedOutcome::Cancelled
            }
            result = run => match result {
                Ok(vector) if vector.is_empty() => {
                    tracing::error!("Embedding provider returned an empty vector");
                    EmbedOutcome::Failed("provider returned an empty vector".to_string())
                }
                Ok(vector) => {
                    tracing::debug!("Generated {} dimensional embedding", vector.len());
                    EmbedOutcome::Vector(vector)
                }
                Err(e) => {
                    tracing::error!("Embedding failed, continuing without context: {}", e);
                    EmbedOutcome::Failed(e.to_string())
                }
            },
        }
    }
}
