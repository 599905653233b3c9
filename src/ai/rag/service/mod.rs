// Refresh pipeline, retrieval and the chat service that wires them together

pub mod chat;
pub mod processor;
pub mod retrieval;

pub use chat::{ChatReply, ChatService, ContextSource};
pub use processor::{DocumentRefresher, RefreshOutcome};
pub use retrieval::Retriever;
