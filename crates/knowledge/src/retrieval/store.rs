//! Vector store abstraction.

use ragprompt_core::{AppResult, ContentChunk};

/// Pre-populated nearest-neighbor index scoped to one named index.
///
/// Implementations must be safe to share across concurrent requests.
#[async_trait::async_trait]
pub trait VectorStore: Send + Sync {
    /// Name of the index being searched.
    fn index_name(&self) -> &str;

    /// Up to `limit` chunks nearest to `vector`, each carrying its
    /// similarity score.
    async fn nearest(&self, vector: &[f32], limit: usize) -> AppResult<Vec<ContentChunk>>;
}

/// Cosine similarity of two vectors, 0.0 when lengths differ or either is zero.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() {
        return 0.0;
    }

    let dot_product: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();

    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }

    dot_product / (norm_a * norm_b)
}

/// Similarity score in [0, 1].
pub fn similarity_score(a: &[f32], b: &[f32]) -> f32 {
    cosine_similarity(a, b).clamp(0.0, 1.0)
}
