use std::{cmp::Ordering, collections::HashMap};

use chrono::{DateTime, Utc};

use super::ids::{ConversationId, UserId};

/// Conversation document as stored, after boundary decoding.
///
/// The `last_message_*` fields are a denormalized cache maintained by the
/// write path; this crate only reads them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConversationRecord {
    pub id: ConversationId,
    pub participants: Vec<UserId>,
    pub last_message_at: Option<DateTime<Utc>>,
    pub last_message_content: Option<String>,
    pub last_message_sender_id: Option<UserId>,
    pub created_at: Option<DateTime<Utc>>,
    pub read_by: HashMap<UserId, DateTime<Utc>>,
}

impl ConversationRecord {
    /// Returns the participant that is not `current_user`.
    pub fn other_participant(&self, current_user: &UserId) -> Option<&UserId> {
        self.participants.iter().find(|uid| *uid != current_user)
    }

    pub fn has_participant(&self, user: &UserId) -> bool {
        self.participants.contains(user)
    }

    pub fn read_at(&self, user: &UserId) -> Option<DateTime<Utc>> {
        self.read_by.get(user).copied()
    }

    pub fn is_unread_for(&self, current_user: &UserId) -> bool {
        is_unread(
            self.last_message_at,
            self.last_message_sender_id.as_ref(),
            self.read_at(current_user),
            current_user,
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Participant {
    pub id: Option<UserId>,
    pub name: String,
}

/// Fully materialized row of the conversation list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConversationSummary {
    pub id: ConversationId,
    pub other_participant: Participant,
    pub last_message_at: Option<DateTime<Utc>>,
    pub last_message_content: Option<String>,
    pub last_message_sender_id: Option<UserId>,
    pub created_at: Option<DateTime<Utc>>,
    pub unread: bool,
}

impl ConversationSummary {
    pub fn from_record(
        record: &ConversationRecord,
        current_user: &UserId,
        other_participant_name: String,
    ) -> Self {
        Self {
            id: record.id.clone(),
            other_participant: Participant {
                id: record.other_participant(current_user).cloned(),
                name: other_participant_name,
            },
            last_message_at: record.last_message_at,
            last_message_content: record.last_message_content.clone(),
            last_message_sender_id: record.last_message_sender_id.clone(),
            created_at: record.created_at,
            unread: record.is_unread_for(current_user),
        }
    }

    pub fn preview(&self) -> &str {
        match self.last_message_content.as_deref() {
            Some(content) if !content.is_empty() => content,
            _ => "No messages yet.",
        }
    }
}

/// Unread when someone else sent the latest message and the current user's
/// receipt is missing or older than it.
pub fn is_unread(
    last_message_at: Option<DateTime<Utc>>,
    last_message_sender_id: Option<&UserId>,
    read_at: Option<DateTime<Utc>>,
    current_user: &UserId,
) -> bool {
    let Some(last_message_at) = last_message_at else {
        return false;
    };

    if last_message_sender_id == Some(current_user) {
        return false;
    }

    match read_at {
        None => true,
        Some(read_at) => last_message_at > read_at,
    }
}

/// Unread first, then newest activity first. Missing timestamps sort last.
pub fn sort_for_display(conversations: &mut [ConversationSummary]) {
    conversations.sort_by(display_order);
}

fn display_order(left: &ConversationSummary, right: &ConversationSummary) -> Ordering {
    right
        .unread
        .cmp(&left.unread)
        .then_with(|| match (left.last_message_at, right.last_message_at) {
            (Some(l), Some(r)) => r.cmp(&l),
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            (None, None) => Ordering::Equal,
        })
        .then_with(|| left.id.cmp(&right.id))
}

pub fn unread_count(conversations: &[ConversationSummary]) -> usize {
    conversations.iter().filter(|c| c.unread).count()
}
