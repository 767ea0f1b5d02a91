//! Query-to-prompt pipeline.
//!
//! preprocess → embed → retrieve → assemble, strictly in sequence, bounded by
//! one deadline. When the deadline passes, a child cancellation token fires so
//! every in-flight remote call is abandoned, and the run fails with
//! `AppError::Timeout`.

use crate::embeddings::{EmbedOutcome, Embedder, EmbeddingStatus};
use crate::preprocess::{QueryPreprocessor, UserQuery};
use crate::retrieval::ContentRetriever;
use ragprompt_core::config::{PipelineSettings, RetrievalSettings};
use ragprompt_core::{AppError, AppResult, ConversationTurn};
use ragprompt_prompt::{assemble, AugmentedPrompt};
use serde::Serialize;
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;

/// Everything one pipeline run produced.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PipelineOutput {
    pub query: UserQuery,
    pub prompt: AugmentedPrompt,
    pub embedding_status: EmbeddingStatus,
    /// Number of chunks that made it into the context block
    pub chunk_count: usize,
}

pub struct RagPipeline {
    preprocessor: Option<QueryPreprocessor>,
    embedder: Embedder,
    retriever: ContentRetriever,
    k: usize,
    min_score: f32,
    timeout: Duration,
}

impl RagPipeline {
    /// Pipeline without preprocessing, using default retrieval limits.
    pub fn new(embedder: Embedder, retriever: ContentRetriever) -> Self {
        let defaults = RetrievalSettings::default();
        Self {
            preprocessor: None,
            embedder,
            retriever,
            k: defaults.k,
            min_score: defaults.min_score,
            timeout: PipelineSettings::default().timeout(),
        }
    }

    pub fn with_preprocessor(mut self, preprocessor: QueryPreprocessor) -> Self {
        self.preprocessor = Some(preprocessor);
        self
    }

    pub fn with_limits(mut self, k: usize, min_score: f32) -> Self {
        self.k = k;
        self.min_score = min_score;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Run the full pipeline for one message.
    ///
    /// `raw` is `None` for events that carry no user text; the result is then
    /// a pass-through query with an empty prompt and no retrieval.
    ///
    /// # Errors
    /// - `AppError::Translation` if preprocessing fails
    /// - `AppError::Retrieval` if the vector store fails
    /// - `AppError::Timeout` if the deadline passes
    /// - `AppError::Cancelled` if `cancel` fires
    #[tracing::instrument(skip_all, fields(index = self.retriever.index_name(), k = self.k, min_score = self.min_score))]
    pub async fn run(
        &self,
        raw: Option<&str>,
        history: &[ConversationTurn],
        cancel: &CancellationToken,
    ) -> AppResult<PipelineOutput> {
        let start = Instant::now();
        let stage_cancel = cancel.child_token();

        let output = match tokio::time::timeout(
            self.timeout,
            self.run_stages(raw, history, &stage_cancel),
        )
        .await
        {
            Ok(result) => result?,
            Err(_) => {
                stage_cancel.cancel();
                let ms = self.timeout.as_millis() as u64;
                tracing::error!("Pipeline timed out after {} ms", ms);
                return Err(AppError::Timeout(ms));
            }
        };

        tracing::info!(
            "Prompt ready: {} chunks, embedding {}, rejected={} ({:?})",
            output.chunk_count,
            output.embedding_status.as_str(),
            output.query.rejected,
            start.elapsed()
        );

        Ok(output)
    }

    async fn run_stages(
        &self,
        raw: Option<&str>,
        history: &[ConversationTurn],
        cancel: &CancellationToken,
    ) -> AppResult<PipelineOutput> {
        let query = match &self.preprocessor {
            Some(preprocessor) => preprocessor.preprocess(raw, history, cancel).await?,
            None => UserQuery::pass_through(raw.unwrap_or_default()),
        };

        if raw.is_none() {
            return Ok(PipelineOutput {
                prompt: assemble(&query.raw_text, &[], Vec::new())?,
                query,
                embedding_status: EmbeddingStatus::Empty,
                chunk_count: 0,
            });
        }

        let outcome = self.embedder.embed(&query.search_text()?, cancel).await;
        let embedding_status = outcome.status();
        let vector = match outcome {
            EmbedOutcome::Cancelled => return Err(AppError::Cancelled),
            EmbedOutcome::Failed(reason) => {
                tracing::warn!("Continuing with empty context: {}", reason);
                Vec::new()
            }
            other => other.into_vector(),
        };

        let chunks = self
            .retriever
            .retrieve(&vector, self.k, self.min_score, cancel)
            .await?;

        let prompt = assemble(&query.raw_text, &chunks, vector)?;

        Ok(PipelineOutput {
            query,
            prompt,
            embedding_status,
            chunk_count: chunks.len(),
        })
    }
}
