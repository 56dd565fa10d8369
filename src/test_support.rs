use std::{
    collections::HashMap,
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc, Mutex,
    },
    time::Duration,
};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::StreamExt;
use tokio::sync::{mpsc, watch};

use crate::{
    domain::{
        conversation::ConversationRecord,
        ids::{ConversationId, MessageId, UserId},
        message::MessageRecord,
        profile::{PublicProfile, Role},
    },
    usecases::{
        contracts::{
            CredentialError, CredentialProvider, FeedError, IdToken, SnapshotStream, WriteApi,
            WriteApiError,
        },
        identity::{
            IdentityCache, IdentityResolver, InMemoryIdentityCache, ProfileSource,
            ProfileSourceError,
        },
        list_conversations::ConversationFeed,
        message_stream::MessageFeed,
        read_state::{ReadReceiptStore, ReceiptStoreError},
    },
};

const WAIT_LIMIT: Duration = Duration::from_secs(2);

pub fn at(secs: i64) -> DateTime<Utc> {
    DateTime::from_timestamp(secs, 0).expect("timestamp should be in range")
}

pub fn message_record(id: &str, sender: &str, secs: i64) -> MessageRecord {
    MessageRecord {
        id: MessageId::new(id),
        sender_id: UserId::new(sender),
        content: format!("content of {id}"),
        timestamp: Some(at(secs)),
    }
}

/// Conversation with an optional `(seconds, sender)` last message.
pub fn conversation_record(
    id: &str,
    participants: &[&str],
    last_message: Option<(i64, &str)>,
) -> ConversationRecord {
    ConversationRecord {
        id: ConversationId::new(id),
        participants: participants.iter().copied().map(UserId::new).collect(),
        last_message_at: last_message.map(|(secs, _)| at(secs)),
        last_message_content: last_message.map(|(secs, _)| format!("message at {secs}")),
        last_message_sender_id: last_message.map(|(_, sender)| UserId::new(sender)),
        created_at: Some(at(0)),
        read_by: HashMap::new(),
    }
}

async fn wait_until(what: &str, mut ready: impl FnMut() -> bool) {
    let waited = tokio::time::timeout(WAIT_LIMIT, async {
        while !ready() {
            tokio::time::sleep(Duration::from_millis(1)).await;
        }
    })
    .await;
    assert!(waited.is_ok(), "timed out waiting for {what}");
}

type Snapshot<T> = Result<Vec<T>, FeedError>;

struct Watchers<T> {
    senders: HashMap<String, Vec<mpsc::UnboundedSender<Snapshot<T>>>>,
    opened: HashMap<String, usize>,
}

impl<T> Default for Watchers<T> {
    fn default() -> Self {
        Self {
            senders: HashMap::new(),
            opened: HashMap::new(),
        }
    }
}

impl<T: Clone + Send + 'static> Watchers<T> {
    fn open(&mut self, key: &str) -> SnapshotStream<T> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.senders.entry(key.to_owned()).or_default().push(tx);
        *self.opened.entry(key.to_owned()).or_default() += 1;

        futures::stream::unfold(rx, |mut rx| async move {
            rx.recv().await.map(|item| (item, rx))
        })
        .boxed()
    }

    fn has_open(&self, key: &str) -> bool {
        self.senders
            .get(key)
            .is_some_and(|senders| senders.iter().any(|tx| !tx.is_closed()))
    }

    fn opened(&self, key: &str) -> usize {
        self.opened.get(key).copied().unwrap_or(0)
    }

    fn broadcast(&mut self, key: &str, item: Snapshot<T>) -> usize {
        let Some(senders) = self.senders.get_mut(key) else {
            return 0;
        };
        senders.retain(|tx| !tx.is_closed());
        senders
            .iter()
            .filter(|tx| tx.send(item.clone()).is_ok())
            .count()
    }
}

/// In-process document feed. Every open watch on a key receives each push.
#[derive(Default)]
pub struct ChannelFeed {
    conversations: Mutex<Watchers<ConversationRecord>>,
    messages: Mutex<Watchers<MessageRecord>>,
    fail_next_open: Mutex<Option<FeedError>>,
}

impl ChannelFeed {
    pub fn fail_next_open(&self, error: FeedError) {
        *self.fail_next_open.lock().expect("feed lock") = Some(error);
    }

    pub async fn push_conversations(&self, user: &str, records: Vec<ConversationRecord>) {
        self.wait_for_conversation_watch(user).await;
        self.conversations
            .lock()
            .expect("feed lock")
            .broadcast(user, Ok(records));
    }

    /// Pushes without waiting for a watcher; returns how many received it.
    pub fn try_push_conversations(&self, user: &str, records: Vec<ConversationRecord>) -> usize {
        self.conversations
            .lock()
            .expect("feed lock")
            .broadcast(user, Ok(records))
    }

    pub async fn push_conversation_error(&self, user: &str, error: FeedError) {
        self.wait_for_conversation_watch(user).await;
        self.conversations
            .lock()
            .expect("feed lock")
            .broadcast(user, Err(error));
    }

    pub async fn push_messages(&self, conversation: &str, records: Vec<MessageRecord>) {
        self.wait_for_message_watch(conversation).await;
        self.messages
            .lock()
            .expect("feed lock")
            .broadcast(conversation, Ok(records));
    }

    pub async fn push_message_error(&self, conversation: &str, error: FeedError) {
        self.wait_for_message_watch(conversation).await;
        self.messages
            .lock()
            .expect("feed lock")
            .broadcast(conversation, Err(error));
    }

    /// Waits until `count` message watches were opened for `conversation`.
    pub async fn wait_for_watchers(&self, conversation: &str, count: usize) {
        wait_until("message watchers", || {
            self.messages.lock().expect("feed lock").opened(conversation) >= count
        })
        .await;
    }

    async fn wait_for_conversation_watch(&self, user: &str) {
        wait_until("a conversation watch", || {
            self.conversations.lock().expect("feed lock").has_open(user)
        })
        .await;
    }

    async fn wait_for_message_watch(&self, conversation: &str) {
        wait_until("a message watch", || {
            self.messages.lock().expect("feed lock").has_open(conversation)
        })
        .await;
    }

    fn take_open_failure(&self) -> Option<FeedError> {
        self.fail_next_open.lock().expect("feed lock").take()
    }
}

#[async_trait]
impl ConversationFeed for ChannelFeed {
    async fn watch_conversations(
        &self,
        user: &UserId,
    ) -> Result<SnapshotStream<ConversationRecord>, FeedError> {
        if let Some(error) = self.take_open_failure() {
            return Err(error);
        }
        Ok(self.conversations.lock().expect("feed lock").open(user.as_str()))
    }
}

#[async_trait]
impl MessageFeed for ChannelFeed {
    async fn watch_messages(
        &self,
        conversation: &ConversationId,
    ) -> Result<SnapshotStream<MessageRecord>, FeedError> {
        if let Some(error) = self.take_open_failure() {
            return Err(error);
        }
        Ok(self.messages.lock().expect("feed lock").open(conversation.as_str()))
    }
}

#[derive(Default)]
struct GatedInner {
    profiles: Mutex<HashMap<UserId, PublicProfile>>,
    gates: Mutex<HashMap<UserId, watch::Sender<bool>>>,
    blocked: Mutex<HashMap<UserId, usize>>,
}

/// Profile source whose lookups can be held open per uid.
#[derive(Clone, Default)]
pub struct GatedProfiles {
    inner: Arc<GatedInner>,
    cache: Arc<InMemoryIdentityCache>,
}

impl GatedProfiles {
    pub fn put(&self, uid: &str, username: &str) {
        let profile = PublicProfile {
            uid: UserId::new(uid),
            username: username.to_owned(),
            email: format!("{uid}@club.dev"),
            role: Role::Student,
        };
        self.inner
            .profiles
            .lock()
            .expect("profiles lock")
            .insert(profile.uid.clone(), profile);
    }

    /// Lookups of `uid` block until [`GatedProfiles::release`].
    pub fn gate(&self, uid: &str) {
        let (tx, _rx) = watch::channel(false);
        self.inner
            .gates
            .lock()
            .expect("gates lock")
            .insert(UserId::new(uid), tx);
    }

    pub fn release(&self, uid: &str) {
        if let Some(gate) = self.inner.gates.lock().expect("gates lock").get(&UserId::new(uid)) {
            gate.send_replace(true);
        }
    }

    pub async fn wait_until_blocked(&self, uid: &str) {
        let uid = UserId::new(uid);
        wait_until("a blocked profile lookup", || {
            self.inner
                .blocked
                .lock()
                .expect("blocked lock")
                .get(&uid)
                .is_some_and(|count| *count > 0)
        })
        .await;
    }

    pub fn resolver(&self) -> IdentityResolver {
        IdentityResolver::new(Arc::new(self.clone()), self.cache.clone())
    }

    pub fn cache_len(&self) -> usize {
        self.cache.len()
    }
}

#[async_trait]
impl ProfileSource for GatedProfiles {
    async fn fetch_profile(&self, uid: &UserId) -> Result<Option<PublicProfile>, ProfileSourceError> {
        let gate = self
            .inner
            .gates
            .lock()
            .expect("gates lock")
            .get(uid)
            .map(watch::Sender::subscribe);

        if let Some(mut gate) = gate {
            *self
                .inner
                .blocked
                .lock()
                .expect("blocked lock")
                .entry(uid.clone())
                .or_default() += 1;
            let _ = gate.wait_for(|open| *open).await;
        }

        Ok(self.inner.profiles.lock().expect("profiles lock").get(uid).cloned())
    }

    async fn profiles_with_roles(
        &self,
        roles: &[Role],
    ) -> Result<Vec<PublicProfile>, ProfileSourceError> {
        Ok(self
            .inner
            .profiles
            .lock()
            .expect("profiles lock")
            .values()
            .filter(|profile| roles.contains(&profile.role))
            .cloned()
            .collect())
    }
}

/// Receipt store that records each write and stamps it with a ticking clock.
#[derive(Default)]
pub struct RecordingReceipts {
    writes: Mutex<Vec<(ConversationId, UserId)>>,
}

impl RecordingReceipts {
    pub fn count(&self) -> usize {
        self.writes.lock().expect("receipts lock").len()
    }

    pub async fn wait_for(&self, count: usize) {
        wait_until("read receipts", || self.count() >= count).await;
    }
}

#[async_trait]
impl ReadReceiptStore for RecordingReceipts {
    async fn mark_read(
        &self,
        conversation: &ConversationId,
        user: &UserId,
    ) -> Result<DateTime<Utc>, ReceiptStoreError> {
        let mut writes = self.writes.lock().expect("receipts lock");
        writes.push((conversation.clone(), user.clone()));
        Ok(at(1_000 + writes.len() as i64))
    }
}

pub struct StubCredentials {
    token: Option<String>,
    mints: AtomicUsize,
}

impl StubCredentials {
    pub fn signed_in(token: &str) -> Self {
        Self {
            token: Some(token.to_owned()),
            mints: AtomicUsize::new(0),
        }
    }

    pub fn signed_out() -> Self {
        Self {
            token: None,
            mints: AtomicUsize::new(0),
        }
    }

    pub fn mints(&self) -> usize {
        self.mints.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl CredentialProvider for StubCredentials {
    async fn id_token(&self) -> Result<IdToken, CredentialError> {
        self.mints.fetch_add(1, Ordering::SeqCst);
        self.token
            .as_deref()
            .map(IdToken::new)
            .ok_or(CredentialError::NotSignedIn)
    }
}

#[derive(Default)]
pub struct StubWriteApi {
    failure: Option<WriteApiError>,
    calls: AtomicUsize,
    last_message: Mutex<Option<(ConversationId, String, String)>>,
    last_recipient: Mutex<Option<UserId>>,
}

impl StubWriteApi {
    pub fn failing_with(error: WriteApiError) -> Self {
        Self {
            failure: Some(error),
            ..Self::default()
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Conversation, content, and token of the last send.
    pub fn last_message(&self) -> Option<(ConversationId, String, String)> {
        self.last_message.lock().expect("api lock").clone()
    }

    pub fn last_recipient(&self) -> Option<UserId> {
        self.last_recipient.lock().expect("api lock").clone()
    }

    fn outcome(&self) -> Result<(), WriteApiError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match &self.failure {
            Some(error) => Err(error.clone()),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl WriteApi for StubWriteApi {
    async fn start_conversation(
        &self,
        _token: &IdToken,
        recipient: &UserId,
    ) -> Result<ConversationId, WriteApiError> {
        *self.last_recipient.lock().expect("api lock") = Some(recipient.clone());
        self.outcome()?;
        Ok(ConversationId::new(format!("conv-{recipient}")))
    }

    async fn send_message(
        &self,
        token: &IdToken,
        conversation: &ConversationId,
        content: &str,
    ) -> Result<(), WriteApiError> {
        *self.last_message.lock().expect("api lock") = Some((
            conversation.clone(),
            content.to_owned(),
            token.expose().to_owned(),
        ));
        self.outcome()
    }
}
