//! Store document shapes and their one-time decoding into domain records.
//!
//! Documents are loosely typed: field names are camelCase and timestamps are
//! either RFC 3339 strings or `{seconds, nanoseconds}` objects.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::Value;

use crate::{
    domain::{
        conversation::ConversationRecord,
        ids::{ConversationId, MessageId, UserId},
        message::MessageRecord,
        profile::{PublicProfile, Role},
    },
    usecases::contracts::FeedError,
};

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConversationDocument {
    pub participants: Option<Vec<String>>,
    pub last_message_at: Option<Value>,
    pub last_message_content: Option<String>,
    pub last_message_sender_id: Option<String>,
    pub created_at: Option<Value>,
    #[serde(default)]
    pub read_by: HashMap<String, Value>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageDocument {
    pub sender_id: Option<String>,
    pub content: Option<String>,
    pub timestamp: Option<Value>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProfileDocument {
    pub username: Option<String>,
    pub email: Option<String>,
    pub role: Option<Role>,
}

pub fn decode_conversation(id: &str, value: &Value) -> Result<ConversationRecord, FeedError> {
    let document: ConversationDocument = parse(id, value)?;
    let participants = document
        .participants
        .ok_or_else(|| invalid(id, "missing participants"))?;

    Ok(ConversationRecord {
        id: ConversationId::new(id),
        participants: participants.into_iter().map(UserId::new).collect(),
        last_message_at: document.last_message_at.as_ref().and_then(decode_timestamp),
        last_message_content: document.last_message_content,
        last_message_sender_id: document.last_message_sender_id.map(UserId::new),
        created_at: document.created_at.as_ref().and_then(decode_timestamp),
        read_by: document
            .read_by
            .iter()
            .filter_map(|(uid, at)| decode_timestamp(at).map(|at| (UserId::new(uid.as_str()), at)))
            .collect(),
    })
}

pub fn decode_message(id: &str, value: &Value) -> Result<MessageRecord, FeedError> {
    let document: MessageDocument = parse(id, value)?;
    let sender_id = document
        .sender_id
        .ok_or_else(|| invalid(id, "missing senderId"))?;

    Ok(MessageRecord {
        id: MessageId::new(id),
        sender_id: UserId::new(sender_id),
        content: document.content.unwrap_or_default(),
        timestamp: document.timestamp.as_ref().and_then(decode_timestamp),
    })
}

pub fn decode_profile(uid: &str, value: &Value) -> Result<PublicProfile, FeedError> {
    let document: ProfileDocument = parse(uid, value)?;

    Ok(PublicProfile {
        uid: UserId::new(uid),
        username: document.username.unwrap_or_default(),
        email: document.email.unwrap_or_default(),
        role: document.role.unwrap_or_default(),
    })
}

/// RFC 3339 string or `{seconds, nanoseconds}`; anything else is absent.
pub fn decode_timestamp(value: &Value) -> Option<DateTime<Utc>> {
    match value {
        Value::String(raw) => DateTime::parse_from_rfc3339(raw)
            .ok()
            .map(|at| at.with_timezone(&Utc)),
        Value::Object(fields) => {
            let seconds = fields.get("seconds").and_then(Value::as_i64)?;
            let nanoseconds = fields
                .get("nanoseconds")
                .and_then(Value::as_u64)
                .and_then(|nanos| u32::try_from(nanos).ok())
                .unwrap_or(0);
            DateTime::from_timestamp(seconds, nanoseconds)
        }
        _ => None,
    }
}

pub fn encode_timestamp(at: DateTime<Utc>) -> Value {
    Value::String(at.to_rfc3339())
}

fn parse<T: for<'de> Deserialize<'de>>(id: &str, value: &Value) -> Result<T, FeedError> {
    T::deserialize(value).map_err(|error| invalid(id, &error.to_string()))
}

fn invalid(id: &str, reason: &str) -> FeedError {
    FeedError::InvalidData {
        id: id.to_owned(),
        reason: reason.to_owned(),
    }
}
