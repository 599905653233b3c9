//! External AI provider implementations
//!
//! Ollama is the embedding and chat backend used by the retrieval subsystem.

pub mod ollama;

pub use ollama::*;
