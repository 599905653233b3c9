// Chat over uploaded documents with retrieval from a pgvector index

pub mod ai;
pub mod config;
pub mod conversation;
pub mod database;
pub mod logging;

pub use ai::rag::{ChatService, RAGError, RAGResult};
pub use config::{Config, ConfigError};
pub use conversation::ConversationStore;
