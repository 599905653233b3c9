// Document refresh: chunk, embed, then atomically replace the indexed chunks

use crate::ai::core::providers::EmbeddingProvider;
use crate::ai::rag::{
    engines::VectorStore, PipelineStage, RAGError, RAGResult, ValidationError,
};

type ChunkFn<'a> = Box<dyn FnOnce() -> RAGResult<Vec<String>> + Send + 'a>;

/// Result of a successful refresh
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RefreshOutcome {
    /// Chunks now indexed for the document
    pub chunk_count: usize,
    /// The document produced no content and its previous chunks were removed
    pub cleared: bool,
}

/// Rebuilds the index entries of one document.
///
/// Any stage failure aborts the refresh before the store is touched, and the
/// store's replace is all-or-nothing, so the previous chunk set survives failures.
pub struct DocumentRefresher<'a> {
    store: &'a dyn VectorStore,
    chunk_fn: Option<ChunkFn<'a>>,
    embedder: Option<&'a dyn EmbeddingProvider>,
}

impl<'a> DocumentRefresher<'a> {
    pub fn new(store: &'a dyn VectorStore) -> Self {
        Self {
            store,
            chunk_fn: None,
            embedder: None,
        }
    }

    /// Source of the document's ordered chunk contents
    pub fn chunk_with<F>(mut self, chunk_fn: F) -> Self
    where
        F: FnOnce() -> RAGResult<Vec<String>> + Send + 'a,
    {
        self.chunk_fn = Some(Box::new(chunk_fn));
        self
    }

    pub fn embed_with(mut self, embedder: &'a dyn EmbeddingProvider) -> Self {
        self.embedder = Some(embedder);
        self
    }

    pub async fn refresh(
        self,
        conversation_id: &str,
        document_id: &str,
    ) -> RAGResult<RefreshOutcome> {
        let (Some(chunk_fn), Some(embedder)) = (self.chunk_fn, self.embedder) else {
            return Err(ValidationError::MissingCallback.into());
        };

        let contents =
            chunk_fn().map_err(|e| RAGError::at_stage(PipelineStage::Chunking, e))?;

        // Zero contents still goes through the upsert to clear stale chunks
        let vectors = if contents.is_empty() {
            Vec::new()
        } else {
            embedder
                .embed(&contents)
                .await
                .map_err(|e| RAGError::at_stage(PipelineStage::Embedding, e))?
        };

        let chunk_count = self
            .store
            .upsert_document_chunks(conversation_id, document_id, &contents, &vectors)
            .await
            .map_err(|e| RAGError::at_stage(PipelineStage::Indexing, e))?;

        tracing::info!(
            "Refreshed document {} in conversation {}: {} chunks via {}",
            document_id,
            conversation_id,
            chunk_count,
            embedder.provider_name()
        );

        Ok(RefreshOutcome {
            chunk_count,
            cleared: contents.is_empty(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ai::rag::service::testing::{KeywordEmbedder, DIMENSION};
    use crate::ai::rag::MemoryVectorStore;
    use std::sync::atomic::Ordering;
    use std::sync::Arc;

    fn chunks(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    async fn seeded_store() -> MemoryVectorStore {
        let store = MemoryVectorStore::new(DIMENSION);
        let embedder = KeywordEmbedder::default();
        DocumentRefresher::new(&store)
            .chunk_with(|| Ok(chunks(&["alpha one", "beta two"])))
            .embed_with(&embedder)
            .refresh("conv", "doc")
            .await
            .unwrap();
        store
    }

    #[tokio::test]
    async fn test_refresh_indexes_chunks() {
        let store = seeded_store().await;
        assert_eq!(store.document_chunk_count("conv", "doc"), 2);

        let results = store.query_similar("conv", &[1.0, 0.0, 0.0], 1).await.unwrap();
        assert_eq!(results[0].content, "alpha one");
    }

    #[tokio::test]
    async fn test_zero_chunks_clears_document() {
        let store = seeded_store().await;
        let embedder = KeywordEmbedder::default();

        let outcome = DocumentRefresher::new(&store)
            .chunk_with(|| Ok(Vec::new()))
            .embed_with(&embedder)
            .refresh("conv", "doc")
            .await
            .unwrap();

        assert_eq!(
            outcome,
            RefreshOutcome {
                chunk_count: 0,
                cleared: true
            }
        );
        assert_eq!(store.document_chunk_count("conv", "doc"), 0);
        assert_eq!(embedder.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_missing_callbacks_rejected() {
        let store = MemoryVectorStore::new(DIMENSION);
        let embedder = KeywordEmbedder::default();

        let err = DocumentRefresher::new(&store)
            .embed_with(&embedder)
            .refresh("conv", "doc")
            .await
            .unwrap_err();
        assert_eq!(err.validation(), Some(&ValidationError::MissingCallback));

        let err = DocumentRefresher::new(&store)
            .chunk_with(|| Ok(chunks(&["alpha"])))
            .refresh("conv", "doc")
            .await
            .unwrap_err();
        assert_eq!(err.validation(), Some(&ValidationError::MissingCallback));
        assert_eq!(embedder.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_embedding_failure_keeps_previous_chunks() {
        let store = seeded_store().await;
        let embedder = KeywordEmbedder::failing_on("broken");

        let err = DocumentRefresher::new(&store)
            .chunk_with(|| Ok(chunks(&["alpha new", "broken chunk"])))
            .embed_with(&embedder)
            .refresh("conv", "doc")
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            RAGError::Pipeline {
                stage: PipelineStage::Embedding,
                ..
            }
        ));
        assert!(!err.is_validation());

        let results = store.query_similar("conv", &[1.0, 0.0, 0.0], 10).await.unwrap();
        assert_eq!(results.len(), 2);
        assert!(results.iter().all(|chunk| chunk.content != "alpha new"));
    }

    #[tokio::test]
    async fn test_chunking_failure_reported_with_stage() {
        let store = seeded_store().await;
        let embedder = KeywordEmbedder::default();

        let err = DocumentRefresher::new(&store)
            .chunk_with(|| Err(RAGError::NotFound("document text".to_string())))
            .embed_with(&embedder)
            .refresh("conv", "doc")
            .await
            .unwrap_err();

        assert_eq!(err.to_string(), "chunk document: not found: document text");
        assert_eq!(store.document_chunk_count("conv", "doc"), 2);
    }

    #[tokio::test]
    async fn test_concurrent_refreshes_never_interleave() {
        let store = Arc::new(MemoryVectorStore::new(DIMENSION));
        let embedder = Arc::new(KeywordEmbedder::default());

        let mut handles = Vec::new();
        for version in 0..6 {
            let store = store.clone();
            let embedder = embedder.clone();
            handles.push(tokio::spawn(async move {
                let contents: Vec<String> = (0..4)
                    .map(|i| format!("version {} alpha chunk {}", version, i))
                    .collect();
                DocumentRefresher::new(store.as_ref())
                    .chunk_with(move || Ok(contents))
                    .embed_with(embedder.as_ref())
                    .refresh("conv", "doc")
                    .await
                    .unwrap();
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }

        let results = store.query_similar("conv", &[1.0, 0.0, 0.0], 100).await.unwrap();
        assert_eq!(results.len(), 4);
        let version = results[0].content.split(" alpha").next().unwrap().to_string();
        assert!(results.iter().all(|chunk| chunk.content.starts_with(&version)));
    }
}
