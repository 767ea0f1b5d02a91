//! Retrieval-augmented prompt pipeline.
//!
//! Turns a raw user message and recent conversation history into a prompt
//! grounded in content from a pre-populated vector index:
//!
//! 1. [`preprocess`]: optional standalone-question rewrite, tagging and rejection
//! 2. [`embeddings`]: query embedding with bounded retries
//! 3. [`retrieval`]: nearest-neighbor search with score threshold and top-k
//! 4. prompt assembly (`ragprompt_prompt::assemble`)
//!
//! [`pipeline::RagPipeline`] chains the stages; [`build_pipeline`] wires one
//! from an [`AppConfig`].

pub mod embeddings;
pub mod pipeline;
pub mod preprocess;
pub mod retrieval;

#[cfg(test)]
mod tests;

// Re-export commonly used types
pub use embeddings::{EmbedOutcome, Embedder, EmbeddingProvider, EmbeddingStatus};
pub use pipeline::{PipelineOutput, RagPipeline};
pub use preprocess::{QueryMetadata, QueryPreprocessor, UserQuery};
pub use retrieval::{ContentRetriever, InMemoryStore, LanceDbStore, VectorStore};

use ragprompt_core::{AppConfig, AppResult};
use ragprompt_llm::{create_client, LlmJsonTranslator};
use std::sync::Arc;

/// Build a pipeline over the LanceDB index named in the configuration.
///
/// The index must already exist; a missing one is a retrieval error.
pub async fn build_pipeline(config: &AppConfig) -> AppResult<RagPipeline> {
    let store = LanceDbStore::open(
        &config.index_path(),
        &config.retrieval.index_name,
        config.retrieval.embedding_dim,
    )
    .await?;

    build_pipeline_with_store(config, Arc::new(store))
}

/// Build a pipeline over an already opened vector store.
pub fn build_pipeline_with_store(
    config: &AppConfig,
    store: Arc<dyn VectorStore>,
) -> AppResult<RagPipeline> {
    let embedding_provider = config.llm.active_embedding_provider.as_str();
    let api_key = config.resolve_api_key(embedding_provider);

    let provider = embeddings::create_provider(
        embedding_provider,
        embeddings::ProviderOptions {
            model: config
                .get_provider_config(embedding_provider)
                .and_then(|p| p.embedding_model()),
            endpoint: config.endpoint_for(embedding_provider),
            api_key: api_key.as_deref(),
            dimensions: config.retrieval.embedding_dim,
        },
    )?;

    tracing::debug!(
        "Embedding with {} ({}), index '{}'",
        provider.provider_name(),
        provider.model_name(),
        store.index_name()
    );

    let embedder = Embedder::new(provider, config.embedding.retry_policy());
    let retriever = ContentRetriever::new(store);

    let mut pipeline = RagPipeline::new(embedder, retriever)
        .with_limits(config.retrieval.k, config.retrieval.min_score)
        .with_timeout(config.pipeline.timeout());

    if config.preprocess.enabled {
        let chat_key = config.resolve_api_key(&config.provider);
        let client = create_client(
            &config.provider,
            config.endpoint_for(&config.provider),
            chat_key.as_deref(),
            config.timeout_for(&config.provider),
        )?;
        let translator = LlmJsonTranslator::new(
            client,
            config.model.clone(),
            preprocess::response_schema(),
            config.preprocess.retry_policy(),
        );

        tracing::debug!("Query preprocessing enabled ({})", config.model);
        pipeline = pipeline.with_preprocessor(QueryPreprocessor::new(
            Arc::new(translator),
            config.preprocess.domain_name.clone(),
            config.preprocess.history_turns,
        ));
    }

    Ok(pipeline)
}
