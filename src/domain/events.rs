use super::{
    conversation::ConversationSummary,
    ids::ConversationId,
    message::Message,
};

pub const CONVERSATIONS_LOAD_FAILED: &str = "Failed to load conversations.";
pub const MESSAGES_LOAD_FAILED: &str = "Failed to load messages.";

/// Updates published by live subscriptions, drained by the session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncEvent {
    ConversationsUpdated {
        batch: u64,
        conversations: Vec<ConversationSummary>,
    },
    ConversationsFailed {
        message: String,
    },
    /// Tagged with the conversation the subscription was opened for.
    MessagesUpdated {
        conversation_id: ConversationId,
        messages: Vec<Message>,
    },
    MessagesFailed {
        conversation_id: ConversationId,
        message: String,
    },
}

impl SyncEvent {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::ConversationsUpdated { .. } => "conversations_updated",
            Self::ConversationsFailed { .. } => "conversations_failed",
            Self::MessagesUpdated { .. } => "messages_updated",
            Self::MessagesFailed { .. } => "messages_failed",
        }
    }
}
