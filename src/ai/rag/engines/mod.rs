// Vector store implementations

pub mod memory;
pub mod pgvector;
pub mod traits;

pub use memory::MemoryVectorStore;
pub use pgvector::{AnnIndexKind, PgVectorStore};
pub use traits::{SimilarityIndexStatus, VectorStore};

use crate::ai::rag::RAGResult;
use crate::config::{Config, VectorBackend};
use std::sync::Arc;

/// Factory for the configured vector store
pub struct VectorStoreFactory;

impl VectorStoreFactory {
    /// Build the store selected by the configuration, creating its schema
    pub async fn create(config: &Config) -> RAGResult<Arc<dyn VectorStore>> {
        let dimension = config.embedding.dimension;
        match config.vector_backend {
            VectorBackend::Postgres => {
                let store = PgVectorStore::connect(&config.database, dimension).await?;
                Ok(Arc::new(store))
            }
            VectorBackend::Memory => {
                tracing::info!(
                    "Using in-memory vector store (dimension {}), nothing is persisted",
                    dimension
                );
                Ok(Arc::new(MemoryVectorStore::new(dimension)))
            }
        }
    }
}
