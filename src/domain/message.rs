use std::cmp::Ordering;

use chrono::{DateTime, Utc};

use super::ids::{MessageId, UserId};

pub const CURRENT_USER_LABEL: &str = "You";

/// Message document as stored. `timestamp` is `None` until the server
/// assigns it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageRecord {
    pub id: MessageId,
    pub sender_id: UserId,
    pub content: String,
    pub timestamp: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    pub id: MessageId,
    pub sender_id: UserId,
    pub sender_name: String,
    pub content: String,
    pub timestamp: Option<DateTime<Utc>>,
    pub is_outgoing: bool,
}

impl Message {
    pub fn from_record(record: MessageRecord, current_user: &UserId, resolved_name: String) -> Self {
        let is_outgoing = &record.sender_id == current_user;
        let sender_name = if is_outgoing {
            CURRENT_USER_LABEL.to_owned()
        } else {
            resolved_name
        };

        Self {
            id: record.id,
            sender_id: record.sender_id,
            sender_name,
            content: record.content,
            timestamp: record.timestamp,
            is_outgoing,
        }
    }
}

/// Orders by timestamp ascending, then by id. Unstamped messages go last.
pub fn sort_chronologically(records: &mut [MessageRecord]) {
    records.sort_by(chronological_order);
}

fn chronological_order(left: &MessageRecord, right: &MessageRecord) -> Ordering {
    match (left.timestamp, right.timestamp) {
        (Some(l), Some(r)) => l.cmp(&r),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
    .then_with(|| left.id.cmp(&right.id))
}
