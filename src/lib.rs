//! Chatbot Relay
//!
//! A small HTTP backend for an embeddable chat widget that:
//! - Forwards user messages to a generative-language backend (Gemini)
//! - Keeps a rolling window of per-conversation history in memory
//! - Renders that history into a single prompt per request
//! - Serves the prebuilt widget bundle
//!
//! REQUEST CYCLE:
//! LOCK → READ HISTORY → RENDER PROMPT → GENERATE → APPEND → TRUNCATE

pub mod api;
pub mod backend;
pub mod config;
pub mod conversational;
pub mod error;
pub mod memory;
pub mod models;

pub use error::Result;

// Re-export common types
pub use models::*;
pub use backend::{GenerationBackend, GeminiBackend, MockBackend};
pub use conversational::{ChatReply, PromptAssembler};
pub use memory::ConversationStore;
