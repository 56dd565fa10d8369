use std::{
    collections::HashMap,
    sync::{Arc, Mutex},
};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::domain::ids::{ConversationId, UserId};

const READ_RECEIPT_WRITE_FAILED: &str = "READ_RECEIPT_WRITE_FAILED";
const READ_RECEIPT_DISCARDED: &str = "READ_RECEIPT_DISCARDED";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReceiptStoreError {
    Unauthorized,
    ConversationNotFound,
    Unavailable,
}

/// Partial update of `readBy.<user>` stamped with the store's clock.
#[async_trait]
pub trait ReadReceiptStore: Send + Sync {
    /// Returns the receipt stored after the write. Stores keep the larger of
    /// the existing and new value.
    async fn mark_read(
        &self,
        conversation: &ConversationId,
        user: &UserId,
    ) -> Result<DateTime<Utc>, ReceiptStoreError>;
}

/// Locks outlive `reset` so writes to one conversation stay serialized
/// across it. Everything else belongs to one generation.
#[derive(Default)]
struct TrackerState {
    generation: u64,
    cancel: CancellationToken,
    locks: HashMap<ConversationId, Arc<tokio::sync::Mutex<()>>>,
    acknowledged: HashMap<(ConversationId, UserId), DateTime<Utc>>,
}

/// Writes read receipts one at a time per conversation.
#[derive(Clone)]
pub struct ReadStateTracker {
    store: Arc<dyn ReadReceiptStore>,
    inner: Arc<Mutex<TrackerState>>,
}

impl ReadStateTracker {
    pub fn new(store: Arc<dyn ReadReceiptStore>) -> Self {
        Self {
            store,
            inner: Arc::new(Mutex::new(TrackerState::default())),
        }
    }

    /// Records a receipt for `user`. Failures, and writes overtaken by
    /// [`ReadStateTracker::reset`], yield `None`.
    pub async fn mark_read(
        &self,
        conversation: &ConversationId,
        user: &UserId,
    ) -> Option<DateTime<Utc>> {
        let (lock, generation) = self.conversation_lock(conversation)?;
        let _serialized = lock.lock().await;
        if !self.is_current(generation) {
            tracing::debug!(
                code = READ_RECEIPT_DISCARDED,
                conversation = %conversation,
                user = %user,
                "tracker reset before write; receipt skipped"
            );
            return None;
        }

        match self.store.mark_read(conversation, user).await {
            Ok(stored) => self.acknowledge(generation, conversation, user, stored),
            Err(error) => {
                tracing::warn!(
                    code = READ_RECEIPT_WRITE_FAILED,
                    conversation = %conversation,
                    user = %user,
                    error = ?error,
                    "read receipt write failed"
                );
                None
            }
        }
    }

    /// Spawns [`ReadStateTracker::mark_read`]. The task stops at the next
    /// `reset`.
    pub fn mark_read_in_background(
        &self,
        conversation: ConversationId,
        user: UserId,
    ) -> JoinHandle<()> {
        let tracker = self.clone();
        let cancel = self.cancel_token();
        tokio::spawn(async move {
            let marked = tokio::select! {
                biased;
                _ = cancel.cancelled() => None,
                marked = tracker.mark_read(&conversation, &user) => marked,
            };
            if let Some(at) = marked {
                tracing::debug!(
                    conversation = %conversation,
                    user = %user,
                    read_at = %at,
                    "conversation marked as read"
                );
            }
        })
    }

    pub fn last_acknowledged(
        &self,
        conversation: &ConversationId,
        user: &UserId,
    ) -> Option<DateTime<Utc>> {
        self.inner.lock().ok().and_then(|state| {
            state
                .acknowledged
                .get(&(conversation.clone(), user.clone()))
                .copied()
        })
    }

    /// Forgets acknowledged receipts and stops every write still pending.
    pub fn reset(&self) {
        if let Ok(mut state) = self.inner.lock() {
            state.generation += 1;
            state.cancel.cancel();
            state.cancel = CancellationToken::new();
            state.acknowledged.clear();
        }
    }

    fn cancel_token(&self) -> CancellationToken {
        self.inner
            .lock()
            .map(|state| state.cancel.clone())
            .unwrap_or_else(|_| {
                let cancelled = CancellationToken::new();
                cancelled.cancel();
                cancelled
            })
    }

    fn is_current(&self, generation: u64) -> bool {
        self.inner
            .lock()
            .is_ok_and(|state| state.generation == generation)
    }

    fn conversation_lock(
        &self,
        conversation: &ConversationId,
    ) -> Option<(Arc<tokio::sync::Mutex<()>>, u64)> {
        let mut state = self.inner.lock().ok()?;
        let generation = state.generation;
        let lock = Arc::clone(state.locks.entry(conversation.clone()).or_default());
        Some((lock, generation))
    }

    fn acknowledge(
        &self,
        generation: u64,
        conversation: &ConversationId,
        user: &UserId,
        stored: DateTime<Utc>,
    ) -> Option<DateTime<Utc>> {
        let mut state = self.inner.lock().ok()?;
        if state.generation != generation {
            return None;
        }
        let entry = state
            .acknowledged
            .entry((conversation.clone(), user.clone()))
            .or_insert(stored);
        if stored > *entry {
            *entry = stored;
        }
        Some(*entry)
    }
}
