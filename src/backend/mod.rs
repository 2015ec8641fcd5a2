//! Generation backend trait and implementations
//!
//! A backend turns a fully rendered prompt into plain reply text.

use crate::Result;
use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};

pub mod gemini;
pub use gemini::GeminiBackend;

/// Trait for text generation
#[async_trait]
pub trait GenerationBackend: Send + Sync {
    /// Generate a reply for `prompt`. An empty string is a valid reply.
    async fn generate(&self, prompt: &str) -> Result<String>;

    /// Short label used in logs
    fn name(&self) -> &str;
}

const CANNED_REPLIES: [&str; 5] = [
    "Hello! I'm here to help you. How can I assist you today?",
    "That's a great question! Let me help you with that.",
    "I understand your concern. Here's what I can suggest...",
    "Thanks for reaching out! I'm happy to help you with this.",
    "That's an interesting point. Let me provide some guidance on that.",
];

/// Canned-reply backend for running without an API key
/// Keeps the widget usable in demos and local development
#[derive(Default)]
pub struct MockBackend {
    next: AtomicUsize,
}

impl MockBackend {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl GenerationBackend for MockBackend {
    async fn generate(&self, _prompt: &str) -> Result<String> {
        let index = self.next.fetch_add(1, Ordering::Relaxed) % CANNED_REPLIES.len();
        Ok(CANNED_REPLIES[index].to_string())
    }

    fn name(&self) -> &str {
        "mock"
    }
}
