//! LanceDB-backed vector store.
//!
//! Each index is one LanceDB table with the columns `source_id`, `text` and a
//! fixed-size `embedding` list. Searches use cosine distance and report cosine
//! similarity as the chunk score.

use super::store::{similarity_score, VectorStore};
use arrow_array::{
    Array, FixedSizeListArray, Float32Array, RecordBatch, RecordBatchIterator, StringArray,
};
use arrow_schema::{DataType, Field, Schema};
use futures::TryStreamExt;
use lancedb::query::{ExecutableQuery, QueryBase};
use lancedb::{Connection, DistanceType, Table};
use ragprompt_core::{AppError, AppResult, ContentChunk};
use std::path::Path;
use std::sync::Arc;

/// Vector store over a LanceDB table.
pub struct LanceDbStore {
    table: Table,
    index_name: String,
    embedding_dim: usize,
}

impl LanceDbStore {
    /// Open the existing table `index_name` in the database at `db_path`.
    ///
    /// Nothing is written to disk. A missing database directory or table is a
    /// retrieval error.
    pub async fn open(db_path: &Path, index_name: &str, embedding_dim: usize) -> AppResult<Self> {
        if !db_path.is_dir() {
            return Err(AppError::Retrieval(format!(
                "index '{}' not found: no database at {:?}",
                index_name, db_path
            )));
        }

        let conn = Self::connect(db_path).await?;
        if !Self::has_table(&conn, index_name).await? {
            return Err(AppError::Retrieval(format!(
                "index '{}' not found in {:?}",
                index_name, db_path
            )));
        }

        let table = conn
            .open_table(index_name)
            .execute()
            .await
            .map_err(|e| AppError::Retrieval(format!("Failed to open index: {}", e)))?;

        tracing::debug!("Opened LanceDB index '{}' at {:?}", index_name, db_path);

        Ok(Self {
            table,
            index_name: index_name.to_string(),
            embedding_dim,
        })
    }

    /// Open the table `index_name`, creating the database directory and an
    /// empty table when they do not exist yet.
    pub async fn create(db_path: &Path, index_name: &str, embedding_dim: usize) -> AppResult<Self> {
        std::fs::create_dir_all(db_path)?;

        let conn = Self::connect(db_path).await?;
        if Self::has_table(&conn, index_name).await? {
            return Self::open(db_path, index_name, embedding_dim).await;
        }

        tracing::info!("Creating empty vector index '{}'", index_name);
        let schema = Self::schema(embedding_dim);
        let empty_batch = RecordBatch::new_empty(schema.clone());

        let table = conn
            .create_table(
                index_name,
                RecordBatchIterator::new(vec![Ok(empty_batch)], schema),
            )
            .execute()
            .await
            .map_err(|e| AppError::Retrieval(format!("Failed to create index: {}", e)))?;

        Ok(Self {
            table,
            index_name: index_name.to_string(),
            embedding_dim,
        })
    }

    async fn connect(db_path: &Path) -> AppResult<Connection> {
        let uri = db_path.to_string_lossy().to_string();
        lancedb::connect(&uri)
            .execute()
            .await
            .map_err(|e| AppError::Retrieval(format!("Failed to connect to LanceDB: {}", e)))
    }

    async fn has_table(conn: &Connection, index_name: &str) -> AppResult<bool> {
        let table_names = conn
            .table_names()
            .execute()
            .await
            .map_err(|e| AppError::Retrieval(format!("Failed to list tables: {}", e)))?;
        Ok(table_names.iter().any(|name| name == index_name))
    }

    fn schema(embedding_dim: usize) -> Arc<Schema> {
        Arc::new(Schema::new(vec![
            Field::new("source_id", DataType::Utf8, false),
            Field::new("text", DataType::Utf8, false),
            Field::new(
                "embedding",
                DataType::FixedSizeList(
                    Arc::new(Field::new("item", DataType::Float32, true)),
                    embedding_dim as i32,
                ),
                false,
            ),
        ]))
    }

    /// Append pre-embedded chunks to the index.
    pub async fn add_chunks(&self, chunks: &[ContentChunk]) -> AppResult<()> {
        if chunks.is_empty() {
            return Ok(());
        }

        if let Some(bad) = chunks.iter().find(|c| c.embedding.len() != self.embedding_dim) {
            return Err(AppError::Retrieval(format!(
                "Embedding dimension mismatch for '{}': expected {}, got {}",
                bad.source_id,
                self.embedding_dim,
                bad.embedding.len()
            )));
        }

        let batch = self.chunks_to_batch(chunks)?;
        self.table
            .add(RecordBatchIterator::new(vec![Ok(batch.clone())], batch.schema()))
            .execute()
            .await
            .map_err(|e| AppError::Retrieval(format!("Failed to add chunks: {}", e)))?;

        tracing::debug!("Added {} chunks to '{}'", chunks.len(), self.index_name);
        Ok(())
    }

    /// Number of stored chunks.
    pub async fn count(&self) -> AppResult<usize> {
        self.table
            .count_rows(None)
            .await
            .map_err(|e| AppError::Retrieval(format!("Failed to count rows: {}", e)))
    }

    fn chunks_to_batch(&self, chunks: &[ContentChunk]) -> AppResult<RecordBatch> {
        let source_ids = StringArray::from_iter_values(chunks.iter().map(|c| c.source_id.as_str()));
        let texts = StringArray::from_iter_values(chunks.iter().map(|c| c.text.as_str()));

        let values = Float32Array::from_iter_values(
            chunks.iter().flat_map(|c| c.embedding.iter().copied()),
        );
        let embeddings = FixedSizeListArray::try_new(
            Arc::new(Field::new("item", DataType::Float32, true)),
            self.embedding_dim as i32,
            Arc::new(values),
            None,
        )
        .map_err(|e| AppError::Retrieval(format!("Failed to build embedding column: {}", e)))?;

        RecordBatch::try_new(
            Self::schema(self.embedding_dim),
            vec![Arc::new(source_ids), Arc::new(texts), Arc::new(embeddings)],
        )
        .map_err(|e| AppError::Retrieval(format!("Failed to create RecordBatch: {}", e)))
    }

    fn batch_to_chunks(batch: &RecordBatch, query: &[f32]) -> AppResult<Vec<ContentChunk>> {
        let source_ids = string_column(batch, "source_id")?;
        let texts = string_column(batch, "text")?;
        let embeddings = batch
            .column_by_name("embedding")
            .and_then(|col| col.as_any().downcast_ref::<FixedSizeListArray>())
            .ok_or_else(|| AppError::Retrieval("Invalid embedding column".to_string()))?;

        let mut chunks = Vec::with_capacity(batch.num_rows());
        for row in 0..batch.num_rows() {
            let values = embeddings.value(row);
            let embedding: Vec<f32> = values
                .as_any()
                .downcast_ref::<Float32Array>()
                .ok_or_else(|| AppError::Retrieval("Invalid embedding values".to_string()))?
                .values()
                .to_vec();

            let score = similarity_score(query, &embedding);
            chunks.push(
                ContentChunk::new(texts.value(row), source_ids.value(row), embedding)
                    .with_score(score),
            );
        }
        Ok(chunks)
    }
}

fn string_column<'a>(batch: &'a RecordBatch, name: &str) -> AppResult<&'a StringArray> {
    batch
        .column_by_name(name)
        .and_then(|col| col.as_any().downcast_ref::<StringArray>())
        .ok_or_else(|| AppError::Retrieval(format!("Invalid {} column", name)))
}

#[async_trait::async_trait]
impl VectorStore for LanceDbStore {
    fn index_name(&self) -> &str {
        &self.index_name
    }

    async fn nearest(&self, vector: &[f32], limit: usize) -> AppResult<Vec<ContentChunk>> {
        if vector.len() != self.embedding_dim {
            return Err(AppError::Retrieval(format!(
                "Query embedding dimension mismatch: expected {}, got {}",
                self.embedding_dim,
                vector.len()
            )));
        }

        let batches = self
            .table
            .query()
            .nearest_to(vector.to_vec())
            .map_err(|e| AppError::Retrieval(format!("Failed to create query: {}", e)))?
            .distance_type(DistanceType::Cosine)
            .limit(limit)
            .execute()
            .await
            .map_err(|e| AppError::Retrieval(format!("Failed to execute search: {}", e)))?
            .try_collect::<Vec<_>>()
            .await
            .map_err(|e| AppError::Retrieval(format!("Failed to collect results: {}", e)))?;

        let mut chunks = Vec::new();
        for batch in &batches {
            chunks.extend(Self::batch_to_chunks(batch, vector)?);
        }

        tracing::debug!(
            "LanceDB returned {} chunks from '{}' (limit {})",
            chunks.len(),
            self.index_name,
            limit
        );
        Ok(chunks)
    }
}
