// PostgreSQL + pgvector backed vector store

pub mod queries;
pub mod schema;

pub use schema::AnnIndexKind;

use super::traits::{validate_chunk_batch, validate_dimension, SimilarityIndexStatus, VectorStore};
use crate::ai::rag::{EmbeddingVector, RAGError, RAGResult, RetrievedChunk};
use crate::config::DatabaseConfig;
use async_trait::async_trait;
use sqlx::PgPool;

/// Persists and retrieves embeddings from Postgres + pgvector
pub struct PgVectorStore {
    pool: PgPool,
    dimension: usize,
    ann_index: AnnIndexKind,
}

impl PgVectorStore {
    /// Wrap an existing pool. The schema is not touched; call `ensure_schema`.
    pub fn new(pool: PgPool, dimension: usize, ann_index: AnnIndexKind) -> Self {
        Self {
            pool,
            dimension,
            ann_index,
        }
    }

    /// Connect to the database and make sure the schema exists.
    ///
    /// Failures here are setup errors and should abort startup.
    pub async fn connect(config: &DatabaseConfig, dimension: usize) -> RAGResult<Self> {
        let pool = crate::database::connect_with_retry(config)
            .await
            .map_err(RAGError::database("connect database"))?;

        let store = Self::new(pool, dimension, config.ann_index);
        match store.ensure_schema().await {
            Ok(status) => {
                tracing::info!("Vector store ready (dimension {}): {}", dimension, status);
                Ok(store)
            }
            Err(e) => {
                store.close().await;
                Err(e)
            }
        }
    }

    /// Retry the approximate index creation, e.g. once enough rows exist to train it
    pub async fn ensure_similarity_index(&self) -> RAGResult<SimilarityIndexStatus> {
        schema::ensure_similarity_index(&self.pool, self.ann_index).await
    }

    /// Release the underlying database resources
    pub async fn close(&self) {
        self.pool.close().await;
    }
}

#[async_trait]
impl VectorStore for PgVectorStore {
    fn dimension(&self) -> usize {
        self.dimension
    }

    async fn ensure_schema(&self) -> RAGResult<SimilarityIndexStatus> {
        schema::ensure_base_schema(&self.pool, self.dimension).await?;
        self.ensure_similarity_index().await
    }

    async fn upsert_document_chunks(
        &self,
        conversation_id: &str,
        document_id: &str,
        contents: &[String],
        vectors: &[EmbeddingVector],
    ) -> RAGResult<usize> {
        validate_chunk_batch(self.dimension, contents, vectors)?;

        // Dropping the transaction without commit rolls it back, including on cancellation
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(RAGError::database("begin transaction"))?;

        queries::lock_document(&mut tx, conversation_id, document_id).await?;
        let removed = queries::delete_document_chunks(&mut tx, conversation_id, document_id).await?;

        for (idx, (content, vector)) in contents.iter().zip(vectors.iter()).enumerate() {
            queries::insert_chunk(
                &mut tx,
                conversation_id,
                document_id,
                idx as i32,
                content,
                vector,
            )
            .await?;
        }

        tx.commit()
            .await
            .map_err(RAGError::database("commit transaction"))?;

        tracing::debug!(
            "Replaced {} chunks with {} for document {} in conversation {}",
            removed,
            contents.len(),
            document_id,
            conversation_id
        );
        Ok(contents.len())
    }

    async fn query_similar(
        &self,
        conversation_id: &str,
        query: &[f32],
        limit: usize,
    ) -> RAGResult<Vec<RetrievedChunk>> {
        validate_dimension(self.dimension, query)?;
        if limit == 0 {
            return Ok(Vec::new());
        }

        queries::similarity_search(&self.pool, conversation_id, query, limit).await
    }

    async fn delete_conversation(&self, conversation_id: &str) -> RAGResult<u64> {
        let removed = queries::delete_conversation_chunks(&self.pool, conversation_id).await?;
        tracing::debug!(
            "Deleted {} chunks for conversation {}",
            removed,
            conversation_id
        );
        Ok(removed)
    }
}
