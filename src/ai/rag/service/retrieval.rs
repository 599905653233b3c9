use crate::ai::core::providers::EmbeddingProvider;
use crate::ai::rag::{engines::VectorStore, RAGError, RAGResult, RetrievedChunk};
use std::sync::Arc;

/// Top-K similarity retrieval for a free-text query
#[derive(Clone)]
pub struct Retriever {
    store: Arc<dyn VectorStore>,
    embedder: Arc<dyn EmbeddingProvider>,
    top_k: usize,
}

impl Retriever {
    pub fn new(
        store: Arc<dyn VectorStore>,
        embedder: Arc<dyn EmbeddingProvider>,
        top_k: usize,
    ) -> Self {
        Self {
            store,
            embedder,
            top_k,
        }
    }

    /// Embed `query` and return the most similar chunks of the conversation
    pub async fn retrieve(
        &self,
        conversation_id: &str,
        query: &str,
    ) -> RAGResult<Vec<RetrievedChunk>> {
        let vectors = self.embedder.embed(&[query.to_string()]).await?;
        let count = vectors.len();
        let Some(vector) = vectors.into_iter().next().filter(|_| count == 1) else {
            return Err(RAGError::Provider {
                context: "embed retrieval query",
                message: format!("expected 1 vector, got {}", count),
            });
        };

        let chunks = self
            .store
            .query_similar(conversation_id, &vector, self.top_k)
            .await?;

        tracing::debug!(
            "Retrieved {} chunks for conversation {} (top_k {})",
            chunks.len(),
            conversation_id,
            self.top_k
        );
        Ok(chunks)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ai::rag::service::testing::{KeywordEmbedder, DIMENSION};
    use crate::ai::rag::MemoryVectorStore;

    fn texts(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[tokio::test]
    async fn test_retrieve_returns_best_matches_first() {
        let store = Arc::new(MemoryVectorStore::new(DIMENSION));
        store
            .upsert_document_chunks(
                "conv",
                "doc",
                &texts(&["about beta", "about alpha", "alpha beta"]),
                &[vec![0.0, 1.0, 0.0], vec![1.0, 0.0, 0.0], vec![1.0, 1.0, 0.0]],
            )
            .await
            .unwrap();

        let retriever = Retriever::new(store, Arc::new(KeywordEmbedder::default()), 2);
        let chunks = retriever.retrieve("conv", "tell me about alpha").await.unwrap();

        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[0].content, "about alpha");
        assert_eq!(chunks[1].content, "alpha beta");
    }

    #[tokio::test]
    async fn test_retrieve_propagates_embedding_failure() {
        let store = Arc::new(MemoryVectorStore::new(DIMENSION));
        let retriever = Retriever::new(store, Arc::new(KeywordEmbedder::failing_on("down")), 4);

        let err = retriever.retrieve("conv", "is the server down").await.unwrap_err();
        assert!(matches!(err, RAGError::Provider { .. }));
    }

    #[tokio::test]
    async fn test_retrieve_empty_conversation() {
        let store = Arc::new(MemoryVectorStore::new(DIMENSION));
        let retriever = Retriever::new(store, Arc::new(KeywordEmbedder::default()), 4);

        assert!(retriever.retrieve("conv", "alpha").await.unwrap().is_empty());
    }
}
