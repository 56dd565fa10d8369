//! Live, time-ordered message view for the selected conversation.

use std::{collections::HashMap, sync::Arc};

use async_trait::async_trait;
use futures::{future::join_all, StreamExt};
use tokio::sync::mpsc::UnboundedSender;
use tokio_util::sync::CancellationToken;

use crate::{
    domain::{
        events::{SyncEvent, MESSAGES_LOAD_FAILED},
        ids::{ConversationId, UserId},
        message::{sort_chronologically, Message, MessageRecord},
    },
    usecases::{
        contracts::{FeedError, SnapshotStream},
        identity::IdentityResolver,
        read_state::ReadStateTracker,
        subscription::Subscription,
    },
};

const MESSAGE_STREAM_FAILED: &str = "MESSAGE_STREAM_FAILED";
const MESSAGE_STREAM_ENDED: &str = "MESSAGE_STREAM_ENDED";
const MESSAGE_BATCH_DISCARDED: &str = "MESSAGE_BATCH_DISCARDED";

#[async_trait]
pub trait MessageFeed: Send + Sync {
    /// Messages of one conversation, ordered by timestamp ascending.
    async fn watch_messages(
        &self,
        conversation: &ConversationId,
    ) -> Result<SnapshotStream<MessageRecord>, FeedError>;
}

#[derive(Clone)]
pub struct MessageStreamAdapter {
    feed: Arc<dyn MessageFeed>,
    identities: IdentityResolver,
    receipts: ReadStateTracker,
}

impl MessageStreamAdapter {
    pub fn new(
        feed: Arc<dyn MessageFeed>,
        identities: IdentityResolver,
        receipts: ReadStateTracker,
    ) -> Self {
        Self {
            feed,
            identities,
            receipts,
        }
    }

    pub fn subscribe(
        &self,
        conversation: ConversationId,
        current_user: UserId,
        events: UnboundedSender<SyncEvent>,
    ) -> Subscription {
        let adapter = self.clone();
        let key = conversation.to_string();
        Subscription::spawn("messages", key, move |cancel| async move {
            adapter.run(conversation, current_user, events, cancel).await;
        })
    }

    async fn run(
        self,
        conversation: ConversationId,
        current_user: UserId,
        events: UnboundedSender<SyncEvent>,
        cancel: CancellationToken,
    ) {
        let opened = tokio::select! {
            biased;
            _ = cancel.cancelled() => return,
            opened = self.feed.watch_messages(&conversation) => opened,
        };

        let mut stream = match opened {
            Ok(stream) => stream,
            Err(error) => {
                report_failure(&events, &conversation, &error);
                return;
            }
        };

        loop {
            let next = tokio::select! {
                biased;
                _ = cancel.cancelled() => return,
                next = stream.next() => next,
            };

            match next {
                None => {
                    tracing::debug!(
                        code = MESSAGE_STREAM_ENDED,
                        conversation = %conversation,
                        "message stream ended"
                    );
                    return;
                }
                Some(Err(error)) => report_failure(&events, &conversation, &error),
                Some(Ok(records)) => {
                    if !records.is_empty() {
                        self.receipts
                            .mark_read_in_background(conversation.clone(), current_user.clone());
                    }

                    let messages = tokio::select! {
                        biased;
                        _ = cancel.cancelled() => {
                            tracing::debug!(
                                code = MESSAGE_BATCH_DISCARDED,
                                conversation = %conversation,
                                "discarding message batch for cancelled subscription"
                            );
                            return;
                        }
                        messages = materialize_messages(&self.identities, records, &current_user) => messages,
                    };

                    let update = SyncEvent::MessagesUpdated {
                        conversation_id: conversation.clone(),
                        messages,
                    };
                    if events.send(update).is_err() {
                        return;
                    }
                }
            }
        }
    }
}

/// Sorts a snapshot and resolves each distinct sender once.
pub async fn materialize_messages(
    identities: &IdentityResolver,
    mut records: Vec<MessageRecord>,
    current_user: &UserId,
) -> Vec<Message> {
    sort_chronologically(&mut records);

    let mut senders: Vec<&UserId> = records
        .iter()
        .map(|record| &record.sender_id)
        .filter(|sender| *sender != current_user)
        .collect();
    senders.sort();
    senders.dedup();

    let names = join_all(senders.iter().map(|uid| identities.resolve_name(uid))).await;
    let names: HashMap<UserId, String> = senders.into_iter().cloned().zip(names).collect();

    records
        .into_iter()
        .map(|record| {
            let name = names.get(&record.sender_id).cloned().unwrap_or_default();
            Message::from_record(record, current_user, name)
        })
        .collect()
}

fn report_failure(
    events: &UnboundedSender<SyncEvent>,
    conversation: &ConversationId,
    error: &FeedError,
) {
    tracing::warn!(
        code = MESSAGE_STREAM_FAILED,
        conversation = %conversation,
        error = %error,
        "message subscription failed"
    );
    let _ = events.send(SyncEvent::MessagesFailed {
        conversation_id: conversation.clone(),
        message: MESSAGES_LOAD_FAILED.to_owned(),
    });
}
