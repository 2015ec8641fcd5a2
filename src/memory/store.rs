//! In-process conversation storage
//!
//! Keeps an ordered, bounded sequence of turns per conversation id and hands
//! out per-conversation locks so a full request cycle can run exclusively.

use crate::models::Turn;
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard, RwLock};

/// Held for the duration of one read-call-write cycle on a conversation
pub type ConversationGuard = OwnedMutexGuard<()>;

/// Process-wide conversation store, owned by the server and shared via `Arc`
pub struct ConversationStore {
    conversations: RwLock<HashMap<String, VecDeque<Turn>>>,
    locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl ConversationStore {
    pub fn new() -> Self {
        Self {
            conversations: RwLock::new(HashMap::new()),
            locks: Mutex::new(HashMap::new()),
        }
    }

    /// Current turns for `conversation_id`, oldest first. Unknown ids are
    /// new conversations and yield an empty history.
    pub async fn get(&self, conversation_id: &str) -> Vec<Turn> {
        let conversations = self.conversations.read().await;
        conversations
            .get(conversation_id)
            .map(|turns| turns.iter().cloned().collect())
            .unwrap_or_default()
    }

    /// Append a turn, creating the conversation if absent
    pub async fn append(&self, conversation_id: &str, turn: Turn) {
        let mut conversations = self.conversations.write().await;
        conversations
            .entry(conversation_id.to_string())
            .or_default()
            .push_back(turn);
    }

    /// Keep only the last `max_len` turns. No-op for unknown ids.
    pub async fn truncate(&self, conversation_id: &str, max_len: usize) {
        let mut conversations = self.conversations.write().await;
        if let Some(turns) = conversations.get_mut(conversation_id) {
            while turns.len() > max_len {
                turns.pop_front();
            }
        }
    }

    /// Acquire the exclusive guard for one conversation.
    ///
    /// Guards for different ids never contend with each other.
    pub async fn lock(&self, conversation_id: &str) -> ConversationGuard {
        let key_lock = {
            let mut locks = self.locks.lock().await;
            locks
                .entry(conversation_id.to_string())
                .or_insert_with(|| Arc::new(Mutex::new(())))
                .clone()
        };

        key_lock.lock_owned().await
    }

    /// Give back a guard from [`lock`](Self::lock) and drop the id's lock
    /// entry when no other request holds or awaits it.
    pub async fn release(&self, conversation_id: &str, guard: ConversationGuard) {
        drop(guard);

        let mut locks = self.locks.lock().await;
        let idle = locks
            .get(conversation_id)
            .is_some_and(|key_lock| Arc::strong_count(key_lock) == 1);
        if idle {
            locks.remove(conversation_id);
        }
    }

    /// Append a user turn and its reply, then trim to `max_len`, all under
    /// one write guard so readers never see a half-recorded exchange.
    pub async fn record_exchange(
        &self,
        conversation_id: &str,
        user: Turn,
        assistant: Turn,
        max_len: usize,
    ) {
        let mut conversations = self.conversations.write().await;
        let turns = conversations.entry(conversation_id.to_string()).or_default();
        turns.push_back(user);
        turns.push_back(assistant);
        while turns.len() > max_len {
            turns.pop_front();
        }
    }

    /// Number of ids with a live lock entry
    pub async fn lock_entry_count(&self) -> usize {
        self.locks.lock().await.len()
    }

    /// Number of conversations with at least one stored turn
    pub async fn conversation_count(&self) -> usize {
        self.conversations.read().await.len()
    }
}

impl Default for ConversationStore {
    fn default() -> Self {
        Self::new()
    }
}
