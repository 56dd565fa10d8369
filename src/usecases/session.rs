//! Messaging session: owns subscriptions, selection, and the views the UI reads.
//!
//! All subscriptions publish into one event channel. The session applies
//! events in arrival order and drops any that no longer match the current
//! selection. Logout swaps in a fresh channel so nothing queued by the old
//! subscriptions can be applied afterwards.

use std::sync::Arc;

use futures::future::join_all;
use thiserror::Error;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};

use crate::{
    domain::{
        conversation_list_state::ConversationListState,
        events::SyncEvent,
        ids::{ConversationId, UserId},
        open_conversation_state::{OpenConversationState, SelectionChange},
        profile::PublicProfile,
    },
    usecases::{
        contracts::{CredentialProvider, WriteApi},
        identity::{IdentityResolver, ProfileSource},
        list_conversations::ConversationListAggregator,
        list_mentors::{list_mentors, ListMentorsError},
        message_stream::MessageStreamAdapter,
        read_state::ReadStateTracker,
        send_message::{send_message, SendMessageCommand, SendMessageError},
        start_conversation::{start_conversation, StartConversationCommand, StartConversationError},
        subscription::Subscription,
    },
};

const SESSION_SELECTION_CHANGED: &str = "SESSION_SELECTION_CHANGED";
const SESSION_EVENT_DISCARDED: &str = "SESSION_EVENT_DISCARDED";

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SessionError {
    #[error("You must be logged in to see conversations.")]
    AuthenticationRequired,
}

/// Collaborators shared by every session.
#[derive(Clone)]
pub struct SessionServices {
    pub conversations: ConversationListAggregator,
    pub messages: MessageStreamAdapter,
    pub identities: IdentityResolver,
    pub receipts: ReadStateTracker,
    pub profiles: Arc<dyn ProfileSource>,
    pub write_api: Arc<dyn WriteApi>,
    pub credentials: Arc<dyn CredentialProvider>,
}

pub struct MessagingSession {
    user: Option<UserId>,
    services: SessionServices,
    events_tx: UnboundedSender<SyncEvent>,
    events_rx: UnboundedReceiver<SyncEvent>,
    list: ConversationListState,
    open: OpenConversationState,
    list_subscription: Option<Subscription>,
    message_subscription: Option<Subscription>,
    banner: Option<String>,
}

impl MessagingSession {
    pub fn new(services: SessionServices, user: Option<UserId>) -> Self {
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        Self {
            user,
            services,
            events_tx,
            events_rx,
            list: ConversationListState::default(),
            open: OpenConversationState::default(),
            list_subscription: None,
            message_subscription: None,
            banner: None,
        }
    }

    pub fn user(&self) -> Option<&UserId> {
        self.user.as_ref()
    }

    pub fn conversations(&self) -> &ConversationListState {
        &self.list
    }

    pub fn open_conversation(&self) -> &OpenConversationState {
        &self.open
    }

    /// Latest user-visible error, if any.
    pub fn banner(&self) -> Option<&str> {
        self.banner.as_deref()
    }

    /// Subscribes to the conversation list. A live subscription is kept as is.
    pub fn start(&mut self) -> Result<(), SessionError> {
        let user = self.user.clone().ok_or(SessionError::AuthenticationRequired)?;
        if self.is_subscribed() {
            return Ok(());
        }

        self.list.clear();
        self.list_subscription = Some(
            self.services
                .conversations
                .subscribe(user, self.events_tx.clone()),
        );
        Ok(())
    }

    pub fn select(&mut self, conversation: ConversationId) {
        let Some(user) = self.user.clone() else {
            return;
        };

        match self.open.select(conversation.clone()) {
            SelectionChange::Unchanged => return,
            SelectionChange::Opened => {
                tracing::debug!(
                    code = SESSION_SELECTION_CHANGED,
                    conversation = %conversation,
                    "conversation opened"
                );
            }
            SelectionChange::Switched { from } => {
                tracing::debug!(
                    code = SESSION_SELECTION_CHANGED,
                    from = %from,
                    conversation = %conversation,
                    "switching conversation"
                );
            }
        }

        self.resubscribe_messages(conversation, user);
    }

    /// Resubscribes the selected conversation after a subscription error.
    pub fn retry(&mut self) {
        let Some(user) = self.user.clone() else {
            return;
        };

        if let Some(conversation) = self.open.retry() {
            self.resubscribe_messages(conversation, user);
        }
    }

    /// Waits for the next event, applies it, and returns it.
    pub async fn next_event(&mut self) -> Option<SyncEvent> {
        let event = self.events_rx.recv().await?;
        self.apply(event.clone());
        Some(event)
    }

    /// Applies every event already queued without waiting.
    pub fn drain_pending(&mut self) -> usize {
        let mut applied = 0;
        while let Ok(event) = self.events_rx.try_recv() {
            if self.apply(event) {
                applied += 1;
            }
        }
        applied
    }

    /// Returns whether the event changed visible state.
    pub fn apply(&mut self, event: SyncEvent) -> bool {
        let kind = event.kind();
        let applied = match event {
            SyncEvent::ConversationsUpdated {
                batch,
                conversations,
            } => {
                let previous_had_selection = self
                    .open
                    .conversation_id()
                    .is_some_and(|id| self.list.contains(id));
                let applied = self.list.apply_batch(batch, conversations);
                if applied {
                    self.reconcile_selection(previous_had_selection);
                }
                applied
            }
            SyncEvent::ConversationsFailed { message } => {
                self.list.set_error(message.clone());
                self.banner = Some(message);
                true
            }
            SyncEvent::MessagesUpdated {
                conversation_id,
                messages,
            } => self.open.apply_messages(&conversation_id, messages),
            SyncEvent::MessagesFailed {
                conversation_id,
                message,
            } => {
                let applied = self.open.apply_error(&conversation_id, message.clone());
                if applied {
                    self.banner = Some(message);
                }
                applied
            }
        };

        if !applied {
            tracing::debug!(code = SESSION_EVENT_DISCARDED, kind, "event discarded");
        }
        applied
    }

    pub async fn send(&mut self, content: &str) -> Result<(), SendMessageError> {
        let command = SendMessageCommand {
            sender: self.user.clone(),
            conversation_id: self.open.conversation_id().cloned(),
            content: content.to_owned(),
        };

        let result = send_message(
            self.services.write_api.as_ref(),
            self.services.credentials.as_ref(),
            command,
        )
        .await;

        if let Err(error) = &result {
            self.banner = Some(error.to_string());
        }
        result
    }

    /// Starts a conversation and selects it on success.
    pub async fn start_conversation(
        &mut self,
        recipient: UserId,
    ) -> Result<ConversationId, StartConversationError> {
        let result = start_conversation(
            self.services.write_api.as_ref(),
            self.services.credentials.as_ref(),
            StartConversationCommand {
                current_user: self.user.clone(),
                recipient,
            },
        )
        .await;

        match &result {
            Ok(conversation) => self.select(conversation.clone()),
            Err(error) => self.banner = Some(error.to_string()),
        }
        result
    }

    pub async fn mentors(&mut self) -> Result<Vec<PublicProfile>, ListMentorsError> {
        let Some(user) = self.user.clone() else {
            return Err(ListMentorsError::AuthenticationRequired);
        };

        let result = list_mentors(self.services.profiles.as_ref(), &user).await;
        if let Err(error) = &result {
            self.banner = Some(error.to_string());
        }
        result
    }

    /// Cancels every subscription, waits for the tasks to stop, and forgets
    /// all session state.
    pub async fn logout(&mut self) {
        let subscriptions = [self.list_subscription.take(), self.message_subscription.take()];
        join_all(subscriptions.into_iter().flatten().map(Subscription::shutdown)).await;

        let (events_tx, events_rx) = mpsc::unbounded_channel();
        self.events_tx = events_tx;
        self.events_rx = events_rx;

        self.services.identities.cache().clear();
        self.services.receipts.reset();
        self.list.clear();
        self.open.clear();
        self.banner = None;
        self.user = None;
    }

    pub fn is_subscribed(&self) -> bool {
        self.list_subscription
            .as_ref()
            .is_some_and(Subscription::is_active)
    }

    fn resubscribe_messages(&mut self, conversation: ConversationId, user: UserId) {
        // Tear down first so the old task cannot publish into the new view.
        self.message_subscription = None;
        self.message_subscription = Some(self.services.messages.subscribe(
            conversation,
            user,
            self.events_tx.clone(),
        ));
    }

    fn reconcile_selection(&mut self, previous_had_selection: bool) {
        match self.open.conversation_id().cloned() {
            Some(selected) if !self.list.contains(&selected) && previous_had_selection => {
                tracing::debug!(
                    code = SESSION_SELECTION_CHANGED,
                    conversation = %selected,
                    "selected conversation left the list"
                );
                self.message_subscription = None;
                self.open.clear();
            }
            Some(_) => {}
            None => {
                if let Some(first) = self.list.first_id().cloned() {
                    self.select(first);
                }
            }
        }
    }
}
