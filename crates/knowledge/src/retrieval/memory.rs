//! Brute-force in-memory vector store.

use super::store::{similarity_score, VectorStore};
use ragprompt_core::{AppError, AppResult, ContentChunk};
use std::sync::RwLock;

/// Scores every stored chunk against the query. Insertion order breaks ties.
#[derive(Debug, Default)]
pub struct InMemoryStore {
    index_name: String,
    chunks: RwLock<Vec<ContentChunk>>,
}

impl InMemoryStore {
    pub fn new(index_name: impl Into<String>) -> Self {
        Self {
            index_name: index_name.into(),
            chunks: RwLock::new(Vec::new()),
        }
    }

    pub fn with_chunks(index_name: impl Into<String>, chunks: Vec<ContentChunk>) -> Self {
        Self {
            index_name: index_name.into(),
            chunks: RwLock::new(chunks),
        }
    }

    pub fn insert(&self, chunk: ContentChunk) -> AppResult<()> {
        self.chunks
            .write()
            .map_err(|_| self.poisoned())?
            .push(chunk);
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.chunks.read().map(|c| c.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn poisoned(&self) -> AppError {
        AppError::Retrieval(format!("in-memory index '{}' is poisoned", self.index_name))
    }
}

#[async_trait::async_trait]
impl VectorStore for InMemoryStore {
    fn index_name(&self) -> &str {
        &self.index_name
    }

    async fn nearest(&self, vector: &[f32], limit: usize) -> AppResult<Vec<ContentChunk>> {
        let mut scored: Vec<ContentChunk> = self
            .chunks
            .read()
            .map_err(|_| self.poisoned())?
            .iter()
            .filter(|chunk| chunk.embedding.len() == vector.len())
            .map(|chunk| {
                let score = similarity_score(vector, &chunk.embedding);
                chunk.clone().with_score(score)
            })
            .collect();

        scored.sort_by(|a, b| b.score.total_cmp(&a.score));
        scored.truncate(limit);
        Ok(scored)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store() -> InMemoryStore {
        InMemoryStore::with_chunks(
            "test_index",
            vec![
                ContentChunk::new("east", "doc-1", vec![1.0, 0.0]),
                ContentChunk::new("north", "doc-2", vec![0.0, 1.0]),
                ContentChunk::new("north-east", "doc-3", vec![1.0, 1.0]),
                ContentChunk::new("also east", "doc-4", vec![2.0, 0.0]),
            ],
        )
    }

    #[tokio::test]
    async fn test_nearest_orders_by_similarity() {
        let results = store().nearest(&[1.0, 0.0], 10).await.unwrap();

        let texts: Vec<&str> = results.iter().map(|c| c.text.as_str()).collect();
        assert_eq!(texts, vec!["east", "also east", "north-east", "north"]);
        assert!((results[0].score - 1.0).abs() < 1e-6);
        assert_eq!(results[3].score, 0.0);
    }

    #[tokio::test]
    async fn test_nearest_respects_limit() {
        let results = store().nearest(&[0.0, 1.0], 2).await.unwrap();
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].text, "north");
    }

    #[tokio::test]
    async fn test_dimension_mismatch_is_skipped() {
        let store = store();
        store
            .insert(ContentChunk::new("3d", "doc-5", vec![1.0, 0.0, 0.0]))
            .unwrap();
        assert_eq!(store.len(), 5);

        let results = store.nearest(&[1.0, 0.0], 10).await.unwrap();
        assert_eq!(results.len(), 4);
        assert_eq!(store.index_name(), "test_index");
    }

    #[tokio::test]
    async fn test_poisoned_lock_is_a_retrieval_error() {
        let store = std::sync::Arc::new(store());
        let writer = store.clone();
        let _ = std::thread::spawn(move || {
            let _guard = writer.chunks.write().unwrap();
            panic!("writer died holding the lock");
        })
        .join();

        let err = store.nearest(&[1.0, 0.0], 10).await.unwrap_err();
        assert!(matches!(err, AppError::Retrieval(ref msg) if msg.contains("poisoned")));

        let err = store
            .insert(ContentChunk::new("late", "doc-9", vec![0.0, 1.0]))
            .unwrap_err();
        assert!(matches!(err, AppError::Retrieval(_)));
    }
}
