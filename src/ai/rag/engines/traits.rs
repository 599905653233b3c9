// Vector store trait and the validation shared by every store

use crate::ai::rag::{EmbeddingVector, RAGResult, RetrievedChunk, ValidationError};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Outcome of the best-effort approximate similarity index creation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum SimilarityIndexStatus {
    /// The approximate index exists and serves similarity queries
    Ready,
    /// The engine refused to build the index yet; queries fall back to a full scan
    Deferred { reason: String },
    /// The store always performs an exact scan (no approximate index configured or supported)
    ExactScan,
}

impl std::fmt::Display for SimilarityIndexStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SimilarityIndexStatus::Ready => write!(f, "approximate index ready"),
            SimilarityIndexStatus::Deferred { reason } => {
                write!(f, "approximate index deferred ({}), using full scan", reason)
            }
            SimilarityIndexStatus::ExactScan => write!(f, "exact scan"),
        }
    }
}

/// Persistent store of document chunks and their embeddings, scoped by conversation
#[async_trait]
pub trait VectorStore: Send + Sync {
    /// Configured embedding dimension `D`
    fn dimension(&self) -> usize;

    /// Idempotently create the chunk storage and try to create the approximate index
    async fn ensure_schema(&self) -> RAGResult<SimilarityIndexStatus>;

    /// Atomically replace every chunk of `(conversation_id, document_id)` with the given pairs.
    ///
    /// Returns the number of chunks written. Empty input clears the document.
    async fn upsert_document_chunks(
        &self,
        conversation_id: &str,
        document_id: &str,
        contents: &[String],
        vectors: &[EmbeddingVector],
    ) -> RAGResult<usize>;

    /// Up to `limit` chunks of the conversation, most similar first
    async fn query_similar(
        &self,
        conversation_id: &str,
        query: &[f32],
        limit: usize,
    ) -> RAGResult<Vec<RetrievedChunk>>;

    /// Remove every chunk of the conversation. Returns the number of chunks removed.
    async fn delete_conversation(&self, conversation_id: &str) -> RAGResult<u64>;
}

/// Reject a vector whose length differs from the store dimension
pub fn validate_dimension(expected: usize, vector: &[f32]) -> Result<(), ValidationError> {
    if vector.len() != expected {
        return Err(ValidationError::DimensionMismatch {
            expected,
            actual: vector.len(),
        });
    }
    Ok(())
}

/// Validate a whole upsert batch before any storage is touched
pub fn validate_chunk_batch(
    expected: usize,
    contents: &[String],
    vectors: &[EmbeddingVector],
) -> Result<(), ValidationError> {
    if contents.len() != vectors.len() {
        return Err(ValidationError::LengthMismatch {
            contents: contents.len(),
            vectors: vectors.len(),
        });
    }

    vectors
        .iter()
        .try_for_each(|vector| validate_dimension(expected, vector))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_chunk_batch_length_mismatch() {
        let contents = vec!["a".to_string(), "b".to_string()];
        let vectors = vec![vec![0.0; 3]];

        assert_eq!(
            validate_chunk_batch(3, &contents, &vectors),
            Err(ValidationError::LengthMismatch {
                contents: 2,
                vectors: 1
            })
        );
    }

    #[test]
    fn test_validate_chunk_batch_reports_first_bad_dimension() {
        let contents = vec!["a".to_string(), "b".to_string()];
        let vectors = vec![vec![0.0; 3], vec![0.0; 4]];

        assert_eq!(
            validate_chunk_batch(3, &contents, &vectors),
            Err(ValidationError::DimensionMismatch {
                expected: 3,
                actual: 4
            })
        );
    }

    #[test]
    fn test_validate_chunk_batch_accepts_empty() {
        assert!(validate_chunk_batch(3, &[], &[]).is_ok());
    }
}
