//! Conversation memory
//!
//! Short rolling window of per-conversation history, held in process memory

pub mod store;

pub use store::{ConversationGuard, ConversationStore};
