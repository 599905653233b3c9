// RAG (Retrieval-Augmented Generation) module
// Error taxonomy, chunk types, vector stores, refresh pipeline and prompt assembly

pub mod engines;
pub mod processors;
pub mod prompt;
pub mod service;
pub mod types;

pub use engines::{
    AnnIndexKind, MemoryVectorStore, PgVectorStore, SimilarityIndexStatus, VectorStore,
    VectorStoreFactory,
};
pub use processors::chunk::TextChunker;
pub use prompt::{PromptAssembler, PromptBudget};
pub use service::{
    ChatReply, ChatService, ContextSource, DocumentRefresher, RefreshOutcome, Retriever,
};
pub use types::*;

/// Pipeline stages of a document refresh
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineStage {
    Chunking,
    Embedding,
    Indexing,
}

impl std::fmt::Display for PipelineStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PipelineStage::Chunking => write!(f, "chunk document"),
            PipelineStage::Embedding => write!(f, "embed document"),
            PipelineStage::Indexing => write!(f, "index document"),
        }
    }
}

/// Input problems detected before any I/O is attempted
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("contents and vectors length mismatch: {contents} contents, {vectors} vectors")]
    LengthMismatch { contents: usize, vectors: usize },

    #[error("vector dimension mismatch: expected {expected} got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("chunk function and embed function must be provided")]
    MissingCallback,

    #[error("content must not be empty")]
    EmptyContent,

    #[error("unsupported file type: {0}")]
    UnsupportedFileType(String),

    #[error("invalid conversation id: {0:?}")]
    InvalidConversationId(String),
}

/// Unified error type for all RAG operations
#[derive(Debug, thiserror::Error)]
pub enum RAGError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("{context}: {source}")]
    Database {
        context: &'static str,
        #[source]
        source: sqlx::Error,
    },

    #[error("{context}: {source}")]
    Http {
        context: &'static str,
        #[source]
        source: reqwest::Error,
    },

    #[error("{context}: {message}")]
    Provider {
        context: &'static str,
        message: String,
    },

    #[error("{context}: {source}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },

    #[error("{context}: {source}")]
    Serialization {
        context: &'static str,
        #[source]
        source: serde_json::Error,
    },

    #[error("not found: {0}")]
    NotFound(String),

    #[error("{stage}: {source}")]
    Pipeline {
        stage: PipelineStage,
        #[source]
        source: Box<RAGError>,
    },
}

impl RAGError {
    /// Wrap a failure with the refresh stage it happened in
    pub fn at_stage(stage: PipelineStage, source: RAGError) -> Self {
        RAGError::Pipeline {
            stage,
            source: Box::new(source),
        }
    }

    pub fn database(context: &'static str) -> impl FnOnce(sqlx::Error) -> RAGError {
        move |source| RAGError::Database { context, source }
    }

    pub fn http(context: &'static str) -> impl FnOnce(reqwest::Error) -> RAGError {
        move |source| RAGError::Http { context, source }
    }

    pub fn io(context: impl Into<String>) -> impl FnOnce(std::io::Error) -> RAGError {
        let context = context.into();
        move |source| RAGError::Io { context, source }
    }

    pub fn serialization(context: &'static str) -> impl FnOnce(serde_json::Error) -> RAGError {
        move |source| RAGError::Serialization { context, source }
    }

    /// The validation error behind this error, looking through pipeline stages
    pub fn validation(&self) -> Option<&ValidationError> {
        match self {
            RAGError::Validation(error) => Some(error),
            RAGError::Pipeline { source, .. } => source.validation(),
            _ => None,
        }
    }

    /// Whether the request was rejected before touching storage or the network
    pub fn is_validation(&self) -> bool {
        self.validation().is_some()
    }
}

/// Result type for RAG operations
pub type RAGResult<T> = Result<T, RAGError>;
