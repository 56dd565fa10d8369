//! In-process document store and write API.
//!
//! Every mutation bumps a revision counter; live queries re-run on each
//! revision and emit only when their result changed.

use std::{
    collections::{BTreeMap, HashMap},
    fs,
    path::{Path, PathBuf},
    sync::{Arc, Mutex, MutexGuard, PoisonError},
};

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use futures::StreamExt;
use serde::Deserialize;
use serde_json::Value;
use thiserror::Error;
use tokio::sync::watch;

use crate::{
    backend::document::{decode_conversation, decode_message, decode_profile},
    domain::{
        conversation::ConversationRecord,
        ids::{ConversationId, MessageId, UserId},
        message::{sort_chronologically, MessageRecord},
        profile::{PublicProfile, Role},
    },
    usecases::{
        contracts::{FeedError, IdToken, SnapshotStream, WriteApi, WriteApiError},
        identity::{ProfileSource, ProfileSourceError},
        list_conversations::ConversationFeed,
        message_stream::MessageFeed,
        read_state::{ReadReceiptStore, ReceiptStoreError},
    },
};

const MEMORY_CONVERSATION_CREATED: &str = "MEMORY_CONVERSATION_CREATED";
const MEMORY_MESSAGE_APPENDED: &str = "MEMORY_MESSAGE_APPENDED";

#[derive(Debug, Error)]
pub enum FixtureError {
    #[error("failed to read fixture at {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse fixture: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("invalid fixture document: {0}")]
    Document(#[from] FeedError),
}

/// Seed data keyed by document id, messages grouped by conversation id.
#[derive(Debug, Default, Deserialize)]
struct Fixture {
    #[serde(default)]
    profiles: BTreeMap<String, Value>,
    #[serde(default)]
    conversations: BTreeMap<String, Value>,
    #[serde(default)]
    messages: BTreeMap<String, BTreeMap<String, Value>>,
}

#[derive(Default)]
struct StoreState {
    conversations: BTreeMap<ConversationId, ConversationRecord>,
    messages: HashMap<ConversationId, Vec<MessageRecord>>,
    profiles: HashMap<UserId, PublicProfile>,
    sessions: HashMap<String, UserId>,
    last_timestamp: Option<DateTime<Utc>>,
    next_id: u64,
}

impl StoreState {
    /// Server clock: wall time, nudged forward so stamps strictly increase.
    fn server_now(&mut self) -> DateTime<Utc> {
        let now = Utc::now();
        let stamped = match self.last_timestamp {
            Some(last) if now <= last => last + Duration::milliseconds(1),
            _ => now,
        };
        self.last_timestamp = Some(stamped);
        stamped
    }

    fn observe(&mut self, at: Option<DateTime<Utc>>) {
        if at > self.last_timestamp {
            self.last_timestamp = at;
        }
    }

    fn allocate_id(&mut self, prefix: &str) -> String {
        self.next_id += 1;
        format!("{prefix}-{}", self.next_id)
    }

    fn authenticate(&self, token: &IdToken) -> Result<UserId, WriteApiError> {
        self.sessions
            .get(token.expose())
            .cloned()
            .ok_or(WriteApiError::Unauthorized)
    }

    fn conversations_of(&self, user: &UserId) -> Vec<ConversationRecord> {
        let mut conversations: Vec<ConversationRecord> = self
            .conversations
            .values()
            .filter(|record| record.has_participant(user))
            .cloned()
            .collect();
        conversations.sort_by(|left, right| match (left.last_message_at, right.last_message_at) {
            (Some(l), Some(r)) => r.cmp(&l),
            (Some(_), None) => std::cmp::Ordering::Less,
            (None, Some(_)) => std::cmp::Ordering::Greater,
            (None, None) => left.id.cmp(&right.id),
        });
        conversations
    }

    fn messages_of(&self, conversation: &ConversationId) -> Vec<MessageRecord> {
        let mut messages = self.messages.get(conversation).cloned().unwrap_or_default();
        sort_chronologically(&mut messages);
        messages
    }

    fn find_pair(&self, left: &UserId, right: &UserId) -> Option<ConversationId> {
        self.conversations
            .values()
            .find(|record| {
                record.participants.len() == 2
                    && record.has_participant(left)
                    && record.has_participant(right)
            })
            .map(|record| record.id.clone())
    }
}

struct Inner {
    state: Mutex<StoreState>,
    revision: watch::Sender<u64>,
}

impl Inner {
    fn lock(&self) -> MutexGuard<'_, StoreState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn bump(&self) {
        self.revision.send_modify(|revision| *revision += 1);
    }
}

/// Shared handle; clones observe and mutate the same store.
#[derive(Clone)]
pub struct MemoryBackend {
    inner: Arc<Inner>,
}

impl Default for MemoryBackend {
    fn default() -> Self {
        let (revision, _) = watch::channel(0);
        Self {
            inner: Arc::new(Inner {
                state: Mutex::new(StoreState::default()),
                revision,
            }),
        }
    }
}

impl MemoryBackend {
    pub fn from_fixture_str(raw: &str) -> Result<Self, FixtureError> {
        let fixture: Fixture = serde_json::from_str(raw)?;
        let backend = Self::default();

        {
            let mut state = backend.inner.lock();
            for (uid, value) in &fixture.profiles {
                let profile = decode_profile(uid, value)?;
                state.profiles.insert(profile.uid.clone(), profile);
            }
            for (id, value) in &fixture.conversations {
                let record = decode_conversation(id, value)?;
                state.observe(record.last_message_at);
                state.conversations.insert(record.id.clone(), record);
            }
            for (conversation, messages) in &fixture.messages {
                for (id, value) in messages {
                    let record = decode_message(id, value)?;
                    state.observe(record.timestamp);
                    state
                        .messages
                        .entry(ConversationId::new(conversation.as_str()))
                        .or_default()
                        .push(record);
                }
            }
        }

        Ok(backend)
    }

    pub fn from_fixture_file(path: &Path) -> Result<Self, FixtureError> {
        let raw = fs::read_to_string(path).map_err(|source| FixtureError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_fixture_str(&raw)
    }

    /// Issues a bearer token accepted by the write API for `user`.
    pub fn sign_in(&self, user: &UserId) -> IdToken {
        let token = format!("memory-session-{user}");
        self.inner.lock().sessions.insert(token.clone(), user.clone());
        IdToken::new(token)
    }

    pub fn sign_out(&self, token: &IdToken) {
        self.inner.lock().sessions.remove(token.expose());
    }

    pub fn conversation(&self, id: &ConversationId) -> Option<ConversationRecord> {
        self.inner.lock().conversations.get(id).cloned()
    }

    fn live_query<T, F>(&self, query: F) -> SnapshotStream<T>
    where
        T: Clone + PartialEq + Send + 'static,
        F: Fn(&StoreState) -> Vec<T> + Send + 'static,
    {
        let mut revisions = self.inner.revision.subscribe();
        revisions.mark_changed();

        let watcher = LiveQuery {
            inner: Arc::clone(&self.inner),
            revisions,
            query,
            last: None,
        };

        futures::stream::unfold(watcher, |mut watcher| async move {
            loop {
                watcher.revisions.changed().await.ok()?;
                let snapshot = (watcher.query)(&*watcher.inner.lock());
                if watcher.last.as_ref() == Some(&snapshot) {
                    continue;
                }
                watcher.last = Some(snapshot.clone());
                return Some((Ok(snapshot), watcher));
            }
        })
        .boxed()
    }
}

struct LiveQuery<T, F> {
    inner: Arc<Inner>,
    revisions: watch::Receiver<u64>,
    query: F,
    last: Option<Vec<T>>,
}

#[async_trait]
impl ConversationFeed for MemoryBackend {
    async fn watch_conversations(
        &self,
        user: &UserId,
    ) -> Result<SnapshotStream<ConversationRecord>, FeedError> {
        let user = user.clone();
        Ok(self.live_query(move |state| state.conversations_of(&user)))
    }
}

#[async_trait]
impl MessageFeed for MemoryBackend {
    async fn watch_messages(
        &self,
        conversation: &ConversationId,
    ) -> Result<SnapshotStream<MessageRecord>, FeedError> {
        let conversation = conversation.clone();
        Ok(self.live_query(move |state| state.messages_of(&conversation)))
    }
}

#[async_trait]
impl ProfileSource for MemoryBackend {
    async fn fetch_profile(&self, uid: &UserId) -> Result<Option<PublicProfile>, ProfileSourceError> {
        Ok(self.inner.lock().profiles.get(uid).cloned())
    }

    async fn profiles_with_roles(
        &self,
        roles: &[Role],
    ) -> Result<Vec<PublicProfile>, ProfileSourceError> {
        Ok(self
            .inner
            .lock()
            .profiles
            .values()
            .filter(|profile| roles.contains(&profile.role))
            .cloned()
            .collect())
    }
}

#[async_trait]
impl ReadReceiptStore for MemoryBackend {
    async fn mark_read(
        &self,
        conversation: &ConversationId,
        user: &UserId,
    ) -> Result<DateTime<Utc>, ReceiptStoreError> {
        let stored = {
            let mut state = self.inner.lock();
            let now = state.server_now();
            let record = state
                .conversations
                .get_mut(conversation)
                .ok_or(ReceiptStoreError::ConversationNotFound)?;
            if !record.has_participant(user) {
                return Err(ReceiptStoreError::Unauthorized);
            }

            let entry = record.read_by.entry(user.clone()).or_insert(now);
            *entry = (*entry).max(now);
            *entry
        };

        self.inner.bump();
        Ok(stored)
    }
}

#[async_trait]
impl WriteApi for MemoryBackend {
    async fn start_conversation(
        &self,
        token: &IdToken,
        recipient: &UserId,
    ) -> Result<ConversationId, WriteApiError> {
        let created = {
            let mut state = self.inner.lock();
            let sender = state.authenticate(token)?;

            if recipient.is_blank() {
                return Err(WriteApiError::Rejected("Recipient is required.".to_owned()));
            }
            if &sender == recipient {
                return Err(WriteApiError::Rejected(
                    "Cannot start a conversation with yourself.".to_owned(),
                ));
            }
            if !state.profiles.contains_key(recipient) {
                return Err(WriteApiError::Rejected("Recipient not found.".to_owned()));
            }

            if let Some(existing) = state.find_pair(&sender, recipient) {
                return Ok(existing);
            }

            let id = ConversationId::new(state.allocate_id("conv"));
            let created_at = state.server_now();
            state.conversations.insert(
                id.clone(),
                ConversationRecord {
                    id: id.clone(),
                    participants: vec![sender, recipient.clone()],
                    last_message_at: None,
                    last_message_content: None,
                    last_message_sender_id: None,
                    created_at: Some(created_at),
                    read_by: HashMap::new(),
                },
            );
            id
        };

        tracing::debug!(code = MEMORY_CONVERSATION_CREATED, conversation = %created, "conversation created");
        self.inner.bump();
        Ok(created)
    }

    async fn send_message(
        &self,
        token: &IdToken,
        conversation: &ConversationId,
        content: &str,
    ) -> Result<(), WriteApiError> {
        {
            let mut state = self.inner.lock();
            let sender = state.authenticate(token)?;

            let content = content.trim();
            if content.is_empty() {
                return Err(WriteApiError::Rejected(
                    "Message content cannot be empty.".to_owned(),
                ));
            }

            let participant = state
                .conversations
                .get(conversation)
                .ok_or(WriteApiError::ConversationNotFound)?
                .has_participant(&sender);
            if !participant {
                return Err(WriteApiError::Unauthorized);
            }

            let id = MessageId::new(state.allocate_id("msg"));
            let timestamp = state.server_now();
            state
                .messages
                .entry(conversation.clone())
                .or_default()
                .push(MessageRecord {
                    id,
                    sender_id: sender.clone(),
                    content: content.to_owned(),
                    timestamp: Some(timestamp),
                });

            if let Some(record) = state.conversations.get_mut(conversation) {
                record.last_message_at = Some(timestamp);
                record.last_message_content = Some(content.to_owned());
                record.last_message_sender_id = Some(sender);
            }
        }

        tracing::debug!(code = MEMORY_MESSAGE_APPENDED, conversation = %conversation, "message appended");
        self.inner.bump();
        Ok(())
    }
}
