//! Ephemeral per-chat conversation state.
//!
//! When the bot asks a user for free-text input (an invite code), it parks a
//! marker here; the next plain text message from that chat is routed as that
//! structured input instead of a generic message. Entries expire after a TTL
//! so abandoned prompts don't accumulate.

use std::collections::HashMap;
use std::sync::Arc;
use teloxide::types::ChatId;
use tokio::sync::Mutex;
use tokio::time::{interval, Duration, Instant};

use crate::core::config;

/// What the next free-text message from a chat should be interpreted as.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PendingInput {
    /// The user pressed "enter invite code"; the next message is a referral code
    AwaitingInviteCode,
}

/// Bounded, expiring map of pending free-text prompts.
pub struct ConversationTracker {
    states: Mutex<HashMap<ChatId, (PendingInput, Instant)>>,
    ttl: Duration,
}

impl ConversationTracker {
    pub fn new() -> Self {
        Self::with_ttl(config::conversation::ttl())
    }

    pub fn with_ttl(ttl: Duration) -> Self {
        Self {
            states: Mutex::new(HashMap::new()),
            ttl,
        }
    }

    /// Park a pending prompt for a chat, replacing any previous one.
    pub async fn set(&self, chat_id: ChatId, input: PendingInput) {
        let mut states = self.states.lock().await;
        states.insert(chat_id, (input, Instant::now() + self.ttl));
    }

    /// Consume the pending prompt for a chat.
    ///
    /// Returns `None` when there is no prompt or it has expired; either way
    /// the entry is gone afterwards, so a prompt is honored at most once.
    pub async fn take(&self, chat_id: ChatId) -> Option<PendingInput> {
        let mut states = self.states.lock().await;
        let (input, expires_at) = states.remove(&chat_id)?;
        if Instant::now() >= expires_at {
            return None;
        }
        Some(input)
    }

    /// Drop the pending prompt for a chat (explicit cancel).
    pub async fn clear(&self, chat_id: ChatId) {
        let mut states = self.states.lock().await;
        states.remove(&chat_id);
    }

    /// Remove all expired entries.
    pub async fn cleanup_expired(&self) {
        let now = Instant::now();
        let mut states = self.states.lock().await;
        states.retain(|_, (_, expires_at)| *expires_at > now);
    }

    /// Number of parked prompts.
    pub async fn len(&self) -> usize {
        self.states.lock().await.len()
    }

    /// Periodically sweep expired prompts.
    pub fn spawn_cleanup_task(self: Arc<Self>, every: Duration) {
        tokio::spawn(async move {
            let mut interval = interval(every);
            loop {
                interval.tick().await;
                self.cleanup_expired().await;
                log::debug!("Conversation state sweep done ({} pending)", self.len().await);
            }
        });
    }
}

impl Default for ConversationTracker {
    fn default() -> Self {
        Self::new()
    }
}
