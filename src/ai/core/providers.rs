use crate::ai::rag::{EmbeddingVector, RAGResult};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Role of a chat message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Role::System => write!(f, "system"),
            Role::User => write!(f, "user"),
            Role::Assistant => write!(f, "assistant"),
        }
    }
}

/// A single turn sent to a chat model
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
        }
    }
}

/// Turns texts into fixed-dimension vectors
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// One vector per text, same order as the input.
    ///
    /// Either every text is embedded or the whole call fails; a partial list is never returned.
    async fn embed(&self, texts: &[String]) -> RAGResult<Vec<EmbeddingVector>>;

    /// Dimension enforced on every returned vector, if any
    fn dimension(&self) -> Option<usize>;

    /// Returns the name of the provider for logging and debugging
    fn provider_name(&self) -> &'static str;
}

/// Produces a single reply for an ordered message list
#[async_trait]
pub trait ChatProvider: Send + Sync {
    async fn generate(&self, messages: &[ChatMessage]) -> RAGResult<String>;

    /// Returns the name of the provider for logging and debugging
    fn provider_name(&self) -> &'static str;
}
