//! AI provider integrations and the retrieval-augmented generation subsystem
//!
//! `core` holds the provider traits, `providers` the Ollama implementations, and
//! `rag` the vector stores, refresh pipeline, retrieval and prompt assembly.

pub mod core;
pub mod providers;
pub mod rag;

// Re-export commonly used items for convenience
pub use core::{build_http_client, ChatMessage, ChatProvider, EmbeddingProvider, Role};
pub use providers::*;
