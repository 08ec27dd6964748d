//! Per-sender conversation records for the relay loop.
//!
//! Records are keyed by sender id (a phone number) and hold the user/assistant history
//! plus a free-form stage marker. Each record sits behind its own async mutex: the webhook
//! flow holds it across completion, append and send so deliveries for one sender never
//! interleave. The store is bounded in both directions (exchanges per sender, senders overall).

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};

use crate::config::ConversationsConfig;

/// Stage assigned to every new record. Nothing transitions it yet.
pub const INITIAL_STAGE: &str = "initial";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

/// One history entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Turn {
    pub role: Role,
    pub content: String,
}

impl Turn {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

/// Accumulated dialogue for one sender.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversationRecord {
    pub history: Vec<Turn>,
    pub stage: String,
}

impl Default for ConversationRecord {
    fn default() -> Self {
        Self {
            history: Vec::new(),
            stage: INITIAL_STAGE.to_string(),
        }
    }
}

impl ConversationRecord {
    /// The last `n` history entries (all of them when fewer exist).
    pub fn recent(&self, n: usize) -> &[Turn] {
        let start = self.history.len().saturating_sub(n);
        &self.history[start..]
    }

    /// Append a user message and the assistant reply, then drop the oldest exchanges beyond
    /// `max_exchanges` (0 = keep everything). Entries are dropped in pairs so the history
    /// keeps alternating user/assistant.
    pub fn push_exchange(
        &mut self,
        user: impl Into<String>,
        assistant: impl Into<String>,
        max_exchanges: usize,
    ) {
        self.history.push(Turn::user(user));
        self.history.push(Turn::assistant(assistant));
        if max_exchanges == 0 {
            return;
        }
        let cap = max_exchanges.saturating_mul(2);
        if self.history.len() > cap {
            let mut excess = self.history.len() - cap;
            excess += excess % 2;
            self.history.drain(..excess);
        }
    }
}

struct Slot {
    record: Arc<Mutex<ConversationRecord>>,
    last_used: u64,
}

struct Slots {
    by_sender: HashMap<String, Slot>,
    clock: u64,
}

/// In-memory store of conversation records (checkout, snapshot, len).
pub struct ConversationStore {
    inner: RwLock<Slots>,
    limits: ConversationsConfig,
}

impl Default for ConversationStore {
    fn default() -> Self {
        Self::new(ConversationsConfig::default())
    }
}

impl ConversationStore {
    pub fn new(limits: ConversationsConfig) -> Self {
        Self {
            inner: RwLock::new(Slots {
                by_sender: HashMap::new(),
                clock: 0,
            }),
            limits,
        }
    }

    pub fn limits(&self) -> ConversationsConfig {
        self.limits
    }

    /// Return the sender's record, creating a default one on first contact. When the store is
    /// full, the least recently checked-out record is evicted to make room.
    pub async fn checkout(&self, sender: &str) -> Arc<Mutex<ConversationRecord>> {
        let mut g = self.inner.write().await;
        g.clock += 1;
        let now = g.clock;
        if let Some(slot) = g.by_sender.get_mut(sender) {
            slot.last_used = now;
            return slot.record.clone();
        }
        let cap = self.limits.max_conversations.max(1);
        while g.by_sender.len() >= cap {
            let oldest = g
                .by_sender
                .iter()
                .min_by_key(|(_, slot)| slot.last_used)
                .map(|(k, _)| k.clone());
            match oldest {
                Some(key) => {
                    log::debug!("conversation store full, evicting {}", key);
                    g.by_sender.remove(&key);
                }
                None => break,
            }
        }
        let record = Arc::new(Mutex::new(ConversationRecord::default()));
        g.by_sender.insert(
            sender.to_string(),
            Slot {
                record: record.clone(),
                last_used: now,
            },
        );
        record
    }

    /// Clone of the sender's record, if one exists. Waits for an in-flight exchange to finish.
    pub async fn snapshot(&self, sender: &str) -> Option<ConversationRecord> {
        let record = {
            let g = self.inner.read().await;
            g.by_sender.get(sender).map(|slot| slot.record.clone())
        }?;
        let guard = record.lock().await;
        Some(guard.clone())
    }

    pub async fn len(&self) -> usize {
        self.inner.read().await.by_sender.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}
