//! Prompt assembly and the chat request cycle
//!
//! Reads a conversation's history, renders it into a single prompt for the
//! generation backend and records the exchange once the backend replies.

use crate::backend::GenerationBackend;
use crate::memory::ConversationStore;
use crate::models::{ChatOptions, Turn, MAX_RETAINED_TURNS};
use crate::Result;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info};

/// Reply for one chat request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatReply {
    pub response: String,
    pub conversation_id: String,
}

pub struct PromptAssembler {
    store: Arc<ConversationStore>,
    backend: Arc<dyn GenerationBackend>,
    max_turns: usize,
}

impl PromptAssembler {
    pub fn new(store: Arc<ConversationStore>, backend: Arc<dyn GenerationBackend>) -> Self {
        Self {
            store,
            backend,
            max_turns: MAX_RETAINED_TURNS,
        }
    }

    pub fn store(&self) -> &Arc<ConversationStore> {
        &self.store
    }

    /// Render the prompt text: instruction, blank line, one `role: content`
    /// line per turn, then a trailing `Assistant:` cue.
    pub fn render(system_prompt: &str, turns: &[Turn]) -> String {
        let mut prompt = String::with_capacity(
            system_prompt.len() + turns.iter().map(|t| t.content.len() + 12).sum::<usize>() + 12,
        );

        prompt.push_str(system_prompt);
        prompt.push_str("\n\n");

        for turn in turns {
            prompt.push_str(turn.role.as_str());
            prompt.push_str(": ");
            prompt.push_str(&turn.content);
            prompt.push('\n');
        }

        prompt.push_str("Assistant:");
        prompt
    }

    /// Run one request cycle for `conversation_id`.
    ///
    /// The conversation is locked from the history read until the truncated
    /// history is written back. A backend failure leaves the store untouched.
    pub async fn respond(
        &self,
        conversation_id: &str,
        message: &str,
        options: &ChatOptions,
    ) -> Result<ChatReply> {
        let guard = self.store.lock(conversation_id).await;
        let result = self.run_cycle(conversation_id, message, options).await;
        self.store.release(conversation_id, guard).await;
        result
    }

    async fn run_cycle(
        &self,
        conversation_id: &str,
        message: &str,
        options: &ChatOptions,
    ) -> Result<ChatReply> {
        let mut working = self.store.get(conversation_id).await;
        let history_len = working.len();

        let user_turn = Turn::user(message);
        working.push(user_turn.clone());

        let prompt = Self::render(options.resolved_system_prompt(), &working);
        debug!(history_len, prompt_chars = prompt.len(), "Rendered prompt");

        let reply = self.backend.generate(&prompt).await?;

        self.store
            .record_exchange(
                conversation_id,
                user_turn,
                Turn::assistant(reply.clone()),
                self.max_turns,
            )
            .await;

        info!(
            backend = self.backend.name(),
            history_len,
            reply_chars = reply.len(),
            "Chat turn recorded"
        );

        Ok(ChatReply {
            response: reply,
            conversation_id: conversation_id.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ChatError;
    use crate::models::Role;
    use async_trait::async_trait;
    use std::sync::Mutex;
    use std::time::Duration;

    /// Replies with a fixed text and remembers every prompt it saw
    struct RecordingBackend {
        reply: String,
        delay: Option<Duration>,
        prompts: Mutex<Vec<String>>,
    }

    impl RecordingBackend {
        fn new(reply: &str) -> Self {
            Self {
                reply: reply.to_string(),
                delay: None,
                prompts: Mutex::new(Vec::new()),
            }
        }

        fn slow(reply: &str, delay: Duration) -> Self {
            Self {
                delay: Some(delay),
                ..Self::new(reply)
            }
        }

        fn prompts(&self) -> Vec<String> {
            self.prompts.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl GenerationBackend for RecordingBackend {
        async fn generate(&self, prompt: &str) -> Result<String> {
            self.prompts.lock().unwrap().push(prompt.to_string());
            if let Some(delay) = self.delay {
                tokio::time::sleep(delay).await;
            }
            Ok(self.reply.clone())
        }

        fn name(&self) -> &str {
            "recording"
        }
    }

    struct FailingBackend;

    #[async_trait]
    impl GenerationBackend for FailingBackend {
        async fn generate(&self, _prompt: &str) -> Result<String> {
            Err(ChatError::Backend("quota exceeded".to_string()))
        }

        fn name(&self) -> &str {
            "failing"
        }
    }

    fn assembler(backend: Arc<dyn GenerationBackend>) -> PromptAssembler {
        PromptAssembler::new(Arc::new(ConversationStore::new()), backend)
    }

    #[test]
    fn test_render_default_prompt() {
        let prompt = PromptAssembler::render(
            ChatOptions::default().resolved_system_prompt(),
            &[Turn::user("hi")],
        );
        assert_eq!(prompt, "You are a helpful assistant.\n\nuser: hi\nAssistant:");
    }

    #[test]
    fn test_render_multi_turn() {
        let turns = vec![
            Turn::user("hello"),
            Turn::assistant("hi there"),
            Turn::user("how are you?"),
        ];
        let prompt = PromptAssembler::render("Be terse.", &turns);
        assert_eq!(
            prompt,
            "Be terse.\n\nuser: hello\nassistant: hi there\nuser: how are you?\nAssistant:"
        );
    }

    #[tokio::test]
    async fn test_custom_system_prompt_on_first_message() {
        let backend = Arc::new(RecordingBackend::new("4"));
        let assembler = assembler(backend.clone());
        let options: ChatOptions =
            serde_json::from_value(serde_json::json!({ "systemPrompt": "Be terse." })).unwrap();

        assembler.respond("math", "2+2?", &options).await.unwrap();

        let prompts = backend.prompts();
        assert_eq!(prompts.len(), 1);
        assert!(prompts[0].starts_with("Be terse.\n\nuser: 2+2?\nAssistant:"));
    }

    #[tokio::test]
    async fn test_respond_records_exchange() {
        let backend = Arc::new(RecordingBackend::new("hi there"));
        let assembler = assembler(backend.clone());

        let reply = assembler
            .respond("c1", "hello", &ChatOptions::default())
            .await
            .unwrap();

        assert_eq!(
            reply,
            ChatReply {
                response: "hi there".to_string(),
                conversation_id: "c1".to_string(),
            }
        );
        assert_eq!(
            assembler.store().get("c1").await,
            vec![Turn::user("hello"), Turn::assistant("hi there")]
        );
    }

    #[tokio::test]
    async fn test_history_feeds_next_prompt() {
        let backend = Arc::new(RecordingBackend::new("ok"));
        let assembler = assembler(backend.clone());
        let options = ChatOptions::default();

        assembler.respond("c", "first", &options).await.unwrap();
        assembler.respond("c", "second", &options).await.unwrap();

        let prompts = backend.prompts();
        assert_eq!(
            prompts[1],
            "You are a helpful assistant.\n\nuser: first\nassistant: ok\nuser: second\nAssistant:"
        );
    }

    #[tokio::test]
    async fn test_empty_reply_is_stored() {
        let assembler = assembler(Arc::new(RecordingBackend::new("")));

        let reply = assembler
            .respond("c", "say nothing", &ChatOptions::default())
            .await
            .unwrap();

        assert_eq!(reply.response, "");
        let turns = assembler.store().get("c").await;
        assert_eq!(turns.len(), 2);
        assert_eq!(turns[1], Turn::assistant(""));
    }

    #[tokio::test]
    async fn test_history_is_bounded() {
        let assembler = assembler(Arc::new(RecordingBackend::new("ok")));
        let options = ChatOptions::default();

        for i in 0..15 {
            assembler
                .respond("long", &format!("message {}", i), &options)
                .await
                .unwrap();
        }

        let turns = assembler.store().get("long").await;
        assert_eq!(turns.len(), MAX_RETAINED_TURNS);
        assert_eq!(turns[0], Turn::user("message 5"));
        assert_eq!(turns[19], Turn::assistant("ok"));
    }

    #[tokio::test]
    async fn test_backend_failure_leaves_store_unchanged() {
        let store = Arc::new(ConversationStore::new());
        store.append("c", Turn::user("earlier")).await;
        store.append("c", Turn::assistant("reply")).await;

        let assembler = PromptAssembler::new(store.clone(), Arc::new(FailingBackend));
        let err = assembler
            .respond("c", "hello", &ChatOptions::default())
            .await
            .unwrap_err();

        assert!(matches!(err, ChatError::Backend(_)));
        assert_eq!(
            store.get("c").await,
            vec![Turn::user("earlier"), Turn::assistant("reply")]
        );

        let fresh = assembler
            .respond("new", "hello", &ChatOptions::default())
            .await;
        assert!(fresh.is_err());
        assert!(store.get("new").await.is_empty());
    }

    #[tokio::test]
    async fn test_failed_requests_leave_no_lock_entries() {
        let store = Arc::new(ConversationStore::new());
        let assembler = PromptAssembler::new(store.clone(), Arc::new(FailingBackend));

        for i in 0..100 {
            let result = assembler
                .respond(&format!("visitor-{}", i), "hello", &ChatOptions::default())
                .await;
            assert!(result.is_err());
        }

        assert_eq!(store.conversation_count().await, 0);
        assert_eq!(store.lock_entry_count().await, 0);
    }

    #[tokio::test]
    async fn test_successful_request_releases_lock_entry() {
        let assembler = assembler(Arc::new(RecordingBackend::new("ok")));

        assembler
            .respond("c", "hello", &ChatOptions::default())
            .await
            .unwrap();

        assert_eq!(assembler.store().lock_entry_count().await, 0);
        assert_eq!(assembler.store().get("c").await.len(), 2);
    }

    #[tokio::test]
    async fn test_concurrent_requests_same_conversation_are_serialized() {
        let backend = Arc::new(RecordingBackend::slow("ack", Duration::from_millis(20)));
        let assembler = Arc::new(assembler(backend.clone()));
        let options = ChatOptions::default();

        let (a, b) = tokio::join!(
            assembler.respond("shared", "one", &options),
            assembler.respond("shared", "two", &options),
        );
        assert!(a.is_ok() && b.is_ok());

        let turns = assembler.store().get("shared").await;
        assert_eq!(turns.len(), 4);
        let roles: Vec<Role> = turns.iter().map(|t| t.role).collect();
        assert_eq!(
            roles,
            vec![Role::User, Role::Assistant, Role::User, Role::Assistant]
        );

        // The second cycle must have seen the first exchange.
        let prompts = backend.prompts();
        assert!(prompts[1].contains("assistant: ack"));
    }
}
