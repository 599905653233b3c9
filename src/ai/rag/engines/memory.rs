// In-process vector store with exact cosine search

use super::traits::{validate_chunk_batch, validate_dimension, SimilarityIndexStatus, VectorStore};
use crate::ai::rag::{cosine_similarity, EmbeddingVector, RAGResult, RetrievedChunk};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use std::collections::HashMap;
use uuid::Uuid;

#[derive(Debug, Clone)]
struct StoredChunk {
    id: Uuid,
    chunk_index: i32,
    content: String,
    embedding: EmbeddingVector,
    #[allow(dead_code)]
    created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
struct StoredDocument {
    document_id: String,
    chunks: Vec<StoredChunk>,
}

/// Vector store kept entirely in memory.
///
/// A document's chunk list is swapped as a whole under the write lock, so a
/// reader observes either the previous or the new chunk set.
pub struct MemoryVectorStore {
    dimension: usize,
    // conversation id -> documents in insertion order
    conversations: RwLock<HashMap<String, Vec<StoredDocument>>>,
}

impl MemoryVectorStore {
    pub fn new(dimension: usize) -> Self {
        Self {
            dimension,
            conversations: RwLock::new(HashMap::new()),
        }
    }

    /// Number of chunks currently stored for one document
    pub fn document_chunk_count(&self, conversation_id: &str, document_id: &str) -> usize {
        self.conversations
            .read()
            .get(conversation_id)
            .and_then(|docs| docs.iter().find(|doc| doc.document_id == document_id))
            .map_or(0, |doc| doc.chunks.len())
    }
}

#[async_trait]
impl VectorStore for MemoryVectorStore {
    fn dimension(&self) -> usize {
        self.dimension
    }

    async fn ensure_schema(&self) -> RAGResult<SimilarityIndexStatus> {
        Ok(SimilarityIndexStatus::ExactScan)
    }

    async fn upsert_document_chunks(
        &self,
        conversation_id: &str,
        document_id: &str,
        contents: &[String],
        vectors: &[EmbeddingVector],
    ) -> RAGResult<usize> {
        validate_chunk_batch(self.dimension, contents, vectors)?;

        let now = Utc::now();
        let chunks: Vec<StoredChunk> = contents
            .iter()
            .zip(vectors.iter())
            .enumerate()
            .map(|(idx, (content, vector))| StoredChunk {
                id: Uuid::new_v4(),
                chunk_index: idx as i32,
                content: content.clone(),
                embedding: vector.clone(),
                created_at: now,
            })
            .collect();
        let written = chunks.len();

        let mut conversations = self.conversations.write();
        let documents = conversations.entry(conversation_id.to_string()).or_default();
        match documents
            .iter()
            .position(|doc| doc.document_id == document_id)
        {
            Some(pos) if chunks.is_empty() => {
                documents.remove(pos);
            }
            Some(pos) => documents[pos].chunks = chunks,
            None if chunks.is_empty() => {}
            None => documents.push(StoredDocument {
                document_id: document_id.to_string(),
                chunks,
            }),
        }
        if documents.is_empty() {
            conversations.remove(conversation_id);
        }

        tracing::debug!(
            "Replaced chunks for document {} in conversation {}: {} chunks",
            document_id,
            conversation_id,
            written
        );
        Ok(written)
    }

    async fn query_similar(
        &self,
        conversation_id: &str,
        query: &[f32],
        limit: usize,
    ) -> RAGResult<Vec<RetrievedChunk>> {
        validate_dimension(self.dimension, query)?;

        let conversations = self.conversations.read();
        let Some(documents) = conversations.get(conversation_id) else {
            return Ok(Vec::new());
        };

        let mut results: Vec<RetrievedChunk> = documents
            .iter()
            .flat_map(|doc| {
                doc.chunks.iter().map(move |chunk| RetrievedChunk {
                    id: chunk.id,
                    conversation_id: conversation_id.to_string(),
                    document_id: doc.document_id.clone(),
                    chunk_index: chunk.chunk_index,
                    content: chunk.content.clone(),
                    score: cosine_similarity(&chunk.embedding, query),
                })
            })
            .collect();

        // Stable sort keeps storage order for equal scores
        results.sort_by(|a, b| b.score.total_cmp(&a.score));
        results.truncate(limit);
        Ok(results)
    }

    async fn delete_conversation(&self, conversation_id: &str) -> RAGResult<u64> {
        let removed = self
            .conversations
            .write()
            .remove(conversation_id)
            .map_or(0, |docs| docs.iter().map(|doc| doc.chunks.len() as u64).sum());
        Ok(removed)
    }
}
