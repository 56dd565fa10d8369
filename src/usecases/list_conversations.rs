//! Live conversation list for the signed-in user.
//!
//! Every snapshot from the feed becomes a numbered batch. A batch is only
//! published once all of its participant names are resolved, and a batch
//! that finishes after a newer one was published is dropped.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use futures::{future::join_all, StreamExt};
use tokio::sync::mpsc::UnboundedSender;
use tokio_util::sync::CancellationToken;

use crate::{
    domain::{
        conversation::{sort_for_display, ConversationRecord, ConversationSummary},
        events::{SyncEvent, CONVERSATIONS_LOAD_FAILED},
        ids::UserId,
    },
    usecases::{
        contracts::{FeedError, SnapshotStream},
        identity::IdentityResolver,
        subscription::Subscription,
    },
};

const CONVERSATION_STREAM_FAILED: &str = "CONVERSATION_STREAM_FAILED";
const CONVERSATION_STREAM_ENDED: &str = "CONVERSATION_STREAM_ENDED";
const CONVERSATION_BATCH_DISCARDED: &str = "CONVERSATION_BATCH_DISCARDED";

#[async_trait]
pub trait ConversationFeed: Send + Sync {
    /// Conversations whose participants include `user`, newest activity first.
    async fn watch_conversations(
        &self,
        user: &UserId,
    ) -> Result<SnapshotStream<ConversationRecord>, FeedError>;
}

#[derive(Clone)]
pub struct ConversationListAggregator {
    feed: Arc<dyn ConversationFeed>,
    identities: IdentityResolver,
}

impl ConversationListAggregator {
    pub fn new(feed: Arc<dyn ConversationFeed>, identities: IdentityResolver) -> Self {
        Self { feed, identities }
    }

    pub fn subscribe(&self, current_user: UserId, events: UnboundedSender<SyncEvent>) -> Subscription {
        let aggregator = self.clone();
        let key = current_user.to_string();
        Subscription::spawn("conversations", key, move |cancel| async move {
            aggregator.run(current_user, events, cancel).await;
        })
    }

    async fn run(
        self,
        current_user: UserId,
        events: UnboundedSender<SyncEvent>,
        cancel: CancellationToken,
    ) {
        let opened = tokio::select! {
            biased;
            _ = cancel.cancelled() => return,
            opened = self.feed.watch_conversations(&current_user) => opened,
        };

        let mut stream = match opened {
            Ok(stream) => stream,
            Err(error) => {
                report_failure(&events, &current_user, &error);
                return;
            }
        };

        let gate = Arc::new(PublishGate::new(events.clone(), cancel.clone()));
        let mut batch: u64 = 0;

        loop {
            let next = tokio::select! {
                biased;
                _ = cancel.cancelled() => return,
                next = stream.next() => next,
            };

            match next {
                None => {
                    tracing::debug!(
                        code = CONVERSATION_STREAM_ENDED,
                        user = %current_user,
                        "conversation stream ended"
                    );
                    return;
                }
                Some(Err(error)) => report_failure(&events, &current_user, &error),
                Some(Ok(records)) => {
                    batch += 1;
                    let identities = self.identities.clone();
                    let gate = Arc::clone(&gate);
                    let user = current_user.clone();
                    let cancel = cancel.clone();
                    tokio::spawn(async move {
                        tokio::select! {
                            biased;
                            _ = cancel.cancelled() => {}
                            conversations = materialize_conversations(&identities, &records, &user) => {
                                gate.publish(batch, conversations);
                            }
                        }
                    });
                }
            }
        }
    }
}

/// Resolves names concurrently, derives unread flags, and sorts for display.
pub async fn materialize_conversations(
    identities: &IdentityResolver,
    records: &[ConversationRecord],
    current_user: &UserId,
) -> Vec<ConversationSummary> {
    let names = join_all(
        records
            .iter()
            .map(|record| identities.resolve_optional(record.other_participant(current_user))),
    )
    .await;

    let mut conversations: Vec<ConversationSummary> = records
        .iter()
        .zip(names)
        .map(|(record, name)| ConversationSummary::from_record(record, current_user, name))
        .collect();
    sort_for_display(&mut conversations);
    conversations
}

/// Serializes publication so only increasing batch numbers reach the channel.
struct PublishGate {
    last_published: Mutex<u64>,
    events: UnboundedSender<SyncEvent>,
    cancel: CancellationToken,
}

impl PublishGate {
    fn new(events: UnboundedSender<SyncEvent>, cancel: CancellationToken) -> Self {
        Self {
            last_published: Mutex::new(0),
            events,
            cancel,
        }
    }

    fn publish(&self, batch: u64, conversations: Vec<ConversationSummary>) -> bool {
        let Ok(mut last) = self.last_published.lock() else {
            return false;
        };

        if self.cancel.is_cancelled() || batch <= *last {
            tracing::debug!(
                code = CONVERSATION_BATCH_DISCARDED,
                batch,
                last_published = *last,
                "discarding superseded conversation batch"
            );
            return false;
        }

        *last = batch;
        self.events
            .send(SyncEvent::ConversationsUpdated {
                batch,
                conversations,
            })
            .is_ok()
    }
}

fn report_failure(events: &UnboundedSender<SyncEvent>, user: &UserId, error: &FeedError) {
    tracing::warn!(
        code = CONVERSATION_STREAM_FAILED,
        user = %user,
        error = %error,
        "conversation subscription failed"
    );
    let _ = events.send(SyncEvent::ConversationsFailed {
        message: CONVERSATIONS_LOAD_FAILED.to_owned(),
    });
}
