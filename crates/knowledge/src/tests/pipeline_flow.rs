//! End-to-end pipeline tests with substitutable fakes.

use crate::embeddings::providers::{OllamaProvider, TrigramProvider};
use crate::embeddings::{Embedder, EmbeddingProvider, EmbeddingStatus};
use crate::pipeline::RagPipeline;
use crate::preprocess::{response_schema, QueryPreprocessor};
use crate::retrieval::{ContentRetriever, InMemoryStore, VectorStore};
use ragprompt_core::{AppConfig, AppError, AppResult, ContentChunk, ConversationTurn, RetryPolicy};
use ragprompt_llm::{StructuredTranslator, TranslationSchema};
use serde_json::{json, Value};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio_util::sync::CancellationToken;

#[cfg(test)]
mod tests {
    use super::*;

    /// Fixed vector for every input; records what it was asked to embed.
    #[derive(Debug, Default)]
    struct RecordingProvider {
        texts: Mutex<Vec<String>>,
        delay: Option<Duration>,
    }

    #[async_trait::async_trait]
    impl EmbeddingProvider for RecordingProvider {
        fn provider_name(&self) -> &str {
            "recording"
        }

        fn model_name(&self) -> &str {
            "recording-v1"
        }

        fn dimensions(&self) -> usize {
            3
        }

        async fn embed_batch(&self, texts: &[String]) -> AppResult<Vec<Vec<f32>>> {
            if let Some(delay) = self.delay {
                tokio::time::sleep(delay).await;
            }
            self.texts.lock().unwrap().extend(texts.iter().cloned());
            Ok(texts.iter().map(|_| vec![0.6, 0.8, 0.0]).collect())
        }
    }

    /// Store returning canned, unordered matches.
    struct CannedStore {
        matches: Vec<ContentChunk>,
        queries: AtomicUsize,
    }

    impl CannedStore {
        fn new(matches: &[(&str, f32)]) -> Arc<Self> {
            Arc::new(Self {
                matches: matches
                    .iter()
                    .map(|(text, score)| ContentChunk::new(*text, "docs", vec![]).with_score(*score))
                    .collect(),
                queries: AtomicUsize::new(0),
            })
        }

        fn queries(&self) -> usize {
            self.queries.load(Ordering::SeqCst)
        }
    }

    #[async_trait::async_trait]
    impl VectorStore for CannedStore {
        fn index_name(&self) -> &str {
            "vector_index"
        }

        async fn nearest(&self, _vector: &[f32], _limit: usize) -> AppResult<Vec<ContentChunk>> {
            self.queries.fetch_add(1, Ordering::SeqCst);
            Ok(self.matches.clone())
        }
    }

    /// Translator replaying one canned response.
    struct CannedTranslator {
        schema: TranslationSchema,
        reply: Option<Value>,
    }

    impl CannedTranslator {
        fn new(reply: Option<Value>) -> Arc<Self> {
            Arc::new(Self {
                schema: response_schema(),
                reply,
            })
        }
    }

    #[async_trait::async_trait]
    impl StructuredTranslator for CannedTranslator {
        fn schema(&self) -> &TranslationSchema {
            &self.schema
        }

        async fn translate(&self, _prompt: &str, _cancel: &CancellationToken) -> AppResult<Value> {
            self.reply
                .clone()
                .ok_or_else(|| AppError::Translation("no schema-conforming reply".to_string()))
        }
    }

    fn closed_port() -> u16 {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        listener.local_addr().unwrap().port()
    }

    fn scored_store() -> Arc<CannedStore> {
        CannedStore::new(&[
            ("Atlas Vector Search indexes embeddings.", 0.92),
            ("Unrelated changelog entry.", 0.41),
            ("Use $vectorSearch in an aggregation pipeline.", 0.95),
            ("numCandidates trades recall for speed.", 0.91),
        ])
    }

    fn pipeline(provider: Arc<dyn EmbeddingProvider>, store: Arc<dyn VectorStore>) -> RagPipeline {
        RagPipeline::new(
            Embedder::new(provider, RetryPolicy::none()),
            ContentRetriever::new(store),
        )
        .with_limits(5, 0.9)
    }

    #[tokio::test]
    async fn test_vector_search_end_to_end() {
        let provider = Arc::new(RecordingProvider::default());
        let store = scored_store();
        let translator = CannedTranslator::new(Some(json!({
            "query": "vector search",
            "rejectQuery": false
        })));

        let pipeline = pipeline(provider.clone(), store.clone())
            .with_preprocessor(QueryPreprocessor::new(translator, "MongoDB", 4));

        let output = pipeline
            .run(Some("vector search"), &[], &CancellationToken::new())
            .await
            .unwrap();

        // Two tokens: no widening, no rewrite
        assert_eq!(output.query.standalone_text, "vector search");
        assert_eq!(*provider.texts.lock().unwrap(), vec!["vector search".to_string()]);
        assert_eq!(output.embedding_status, EmbeddingStatus::Ok);
        assert_eq!(output.chunk_count, 3);

        let prompt = &output.prompt;
        assert_eq!(prompt.original_text, "vector search");
        assert_eq!(prompt.embedding, vec![0.6, 0.8, 0.0]);
        assert_eq!(
            prompt.context_block,
            "Use $vectorSearch in an aggregation pipeline.\n~~~~~~\nAtlas Vector Search indexes embeddings.\n~~~~~~\nnumCandidates trades recall for speed."
        );
        assert!(prompt.llm_text.contains(&format!(
            "<Information>\n{}\n<End information>",
            prompt.context_block
        )));
        assert!(prompt
            .llm_text
            .ends_with("<Question>\nvector search\n<End Question>"));
        assert!(!prompt.llm_text.contains("Unrelated changelog entry."));
    }

    #[tokio::test]
    async fn test_embedding_service_unreachable() {
        let url = format!("http://127.0.0.1:{}", closed_port());
        let provider = Arc::new(OllamaProvider::new(Some(&url), "nomic-embed-text", 3).unwrap());
        let store = scored_store();

        let pipeline = RagPipeline::new(
            Embedder::new(provider, RetryPolicy::immediate(2)),
            ContentRetriever::new(store.clone()),
        );

        let output = pipeline
            .run(Some("vector search"), &[], &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(output.embedding_status, EmbeddingStatus::Failed);
        assert_eq!(store.queries(), 0);
        assert_eq!(output.chunk_count, 0);
        assert_eq!(output.prompt.context_block, "");
        assert!(output.prompt.embedding.is_empty());
        assert!(output.prompt.llm_text.contains("<Information>\n\n<End information>"));
        assert!(output
            .prompt
            .llm_text
            .contains("<Question>\nvector search\n<End Question>"));
    }

    #[tokio::test]
    async fn test_tags_reach_the_embedder_as_front_matter() {
        let provider = Arc::new(RecordingProvider::default());
        let translator = CannedTranslator::new(Some(json!({
            "query": "How do I connect to Atlas from Python?",
            "programmingLanguages": ["python"],
            "products": ["Atlas"],
            "rejectQuery": false
        })));

        let pipeline = pipeline(provider.clone(), scored_store())
            .with_preprocessor(QueryPreprocessor::new(translator, "MongoDB", 4));

        let history = vec![
            ConversationTurn::user("I write Python"),
            ConversationTurn::assistant("Noted."),
        ];
        let output = pipeline
            .run(Some("how do I connect?"), &history, &CancellationToken::new())
            .await
            .unwrap();

        let embedded = provider.texts.lock().unwrap().clone();
        assert_eq!(
            embedded,
            vec!["---\nprogrammingLanguages:\n- python\nproducts:\n- Atlas\n---\n\nHow do I connect to Atlas from Python?".to_string()]
        );
        // The model still sees the user's own words
        assert_eq!(output.prompt.original_text, "how do I connect?");
        assert!(output
            .prompt
            .llm_text
            .contains("<Question>\nhow do I connect?\n<End Question>"));
    }

    #[tokio::test]
    async fn test_rejected_query_still_produces_prompt() {
        let translator = CannedTranslator::new(Some(json!({
            "query": "Tell me a joke",
            "rejectQuery": true
        })));
        let pipeline = pipeline(Arc::new(RecordingProvider::default()), scored_store())
            .with_preprocessor(QueryPreprocessor::new(translator, "MongoDB", 4));

        let output = pipeline
            .run(Some("tell me a joke"), &[], &CancellationToken::new())
            .await
            .unwrap();

        assert!(output.query.rejected);
        assert_eq!(output.prompt.original_text, "tell me a joke");
    }

    #[tokio::test]
    async fn test_missing_message_passes_through() {
        let provider = Arc::new(RecordingProvider::default());
        let store = scored_store();
        let translator = CannedTranslator::new(None);

        let pipeline = pipeline(provider.clone(), store.clone())
            .with_preprocessor(QueryPreprocessor::new(translator, "MongoDB", 4));

        let output = pipeline
            .run(None, &[], &CancellationToken::new())
            .await
            .unwrap();

        assert!(!output.query.rejected);
        assert_eq!(output.embedding_status, EmbeddingStatus::Empty);
        assert!(provider.texts.lock().unwrap().is_empty());
        assert_eq!(store.queries(), 0);
    }

    #[tokio::test]
    async fn test_translation_failure_fails_the_run() {
        let store = scored_store();
        let pipeline = pipeline(Arc::new(RecordingProvider::default()), store.clone())
            .with_preprocessor(QueryPreprocessor::new(CannedTranslator::new(None), "MongoDB", 4));

        let err = pipeline
            .run(Some("anything"), &[], &CancellationToken::new())
            .await
            .unwrap_err();

        assert!(matches!(err, AppError::Translation(_)));
        assert_eq!(store.queries(), 0);
    }

    #[tokio::test]
    async fn test_deadline_cancels_slow_stage() {
        let provider = Arc::new(RecordingProvider {
            delay: Some(Duration::from_secs(10)),
            ..Default::default()
        });
        let store = scored_store();
        let pipeline =
            pipeline(provider.clone(), store.clone()).with_timeout(Duration::from_millis(50));

        let err = pipeline
            .run(Some("vector search"), &[], &CancellationToken::new())
            .await
            .unwrap_err();

        assert!(matches!(err, AppError::Timeout(50)));
        assert!(provider.texts.lock().unwrap().is_empty());
        assert_eq!(store.queries(), 0);
    }

    #[tokio::test]
    async fn test_caller_cancellation() {
        let pipeline = pipeline(Arc::new(RecordingProvider::default()), scored_store());
        let cancel = CancellationToken::new();
        cancel.cancel();

        let err = pipeline
            .run(Some("vector search"), &[], &cancel)
            .await
            .unwrap_err();
        assert!(err.is_cancellation());
    }

    #[tokio::test]
    async fn test_pipeline_from_config_with_trigram_embeddings() {
        let mut config = AppConfig::default();
        config.llm.active_embedding_provider = "trigram".to_string();
        config.retrieval.embedding_dim = 256;
        config.retrieval.k = 2;
        config.retrieval.min_score = 0.5;

        let trigram = TrigramProvider::new(256);
        let docs = [
            "Atlas Search builds full text indexes on Lucene",
            "Change streams let applications react to data changes",
            "Sharding distributes collections across clusters",
        ];
        let store = InMemoryStore::new("vector_index");
        for (i, doc) in docs.iter().enumerate() {
            let embedding = trigram.embed(doc).await.unwrap();
            store
                .insert(ContentChunk::new(*doc, format!("doc-{}", i), embedding))
                .unwrap();
        }

        let pipeline = crate::build_pipeline_with_store(&config, Arc::new(store)).unwrap();
        let output = pipeline
            .run(
                Some("Change streams let applications react to data changes"),
                &[],
                &CancellationToken::new(),
            )
            .await
            .unwrap();

        assert!(output.chunk_count >= 1 && output.chunk_count <= 2);
        assert!(output
            .prompt
            .context_block
            .starts_with("Change streams let applications react to data changes"));
    }
}
