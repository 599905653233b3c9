// Conversation metadata and per-conversation serialization

pub mod locks;
pub mod store;

pub use locks::ConversationLocks;
pub use store::{validate_conversation_id, ConversationStore, Document, Message};
