//! Nearest-neighbor content retrieval.
//!
//! `ContentRetriever` queries a `VectorStore` and enforces the result-set
//! contract no matter how the store behaves: every chunk scores at least
//! `min_score`, scores never increase down the list, and at most `k` chunks
//! come back.

pub mod lance;
pub mod memory;
pub mod store;

pub use lance::LanceDbStore;
pub use memory::InMemoryStore;
pub use store::{cosine_similarity, VectorStore};

use ragprompt_core::{AppError, AppResult, ContentChunk};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

#[derive(Clone)]
pub struct ContentRetriever {
    store: Arc<dyn VectorStore>,
}

impl ContentRetriever {
    pub fn new(store: Arc<dyn VectorStore>) -> Self {
        Self { store }
    }

    pub fn index_name(&self) -> &str {
        self.store.index_name()
    }

    /// Top `k` chunks scoring at least `min_score`, best first.
    ///
    /// An empty `vector` (no embedding available) or `k == 0` returns no
    /// chunks without touching the store. Store failures are not retried.
    #[tracing::instrument(skip(self, vector, cancel), fields(index = self.store.index_name(), dims = vector.len()))]
    pub async fn retrieve(
        &self,
        vector: &[f32],
        k: usize,
        min_score: f32,
        cancel: &CancellationToken,
    ) -> AppResult<Vec<ContentChunk>> {
        if vector.is_empty() || k == 0 {
            tracing::debug!("Skipping retrieval (empty query vector or k = 0)");
            return Ok(Vec::new());
        }

        let candidates = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(AppError::Cancelled),
            result = self.store.nearest(vector, k) => result?,
        };

        let found = candidates.len();
        let chunks = rank(candidates, k, min_score);

        tracing::debug!(
            "Retrieved {} of {} candidates at min score {}",
            chunks.len(),
            found,
            min_score
        );

        Ok(chunks)
    }
}

/// Drop chunks below `min_score`, stable-sort by descending score, keep `k`.
fn rank(mut chunks: Vec<ContentChunk>, k: usize, min_score: f32) -> Vec<ContentChunk> {
    chunks.retain(|chunk| chunk.score >= min_score);
    chunks.sort_by(|a, b| b.score.total_cmp(&a.score));
    chunks.truncate(k);
    chunks
}
