use crate::domain::{
    conversation_list_state::{ConversationListState, ConversationListUiState},
    open_conversation_state::{OpenConversationPhase, OpenConversationState},
};

use super::message_rendering::{build_message_list_elements, element_to_line};

const UNREAD_MARKER: &str = "*";

/// Text lines for the conversation list panel.
pub fn conversation_list_lines(
    list: &ConversationListState,
    open: &OpenConversationState,
) -> Vec<String> {
    let mut lines = vec![format!("Conversations ({} unread)", list.unread_count())];

    match list.ui_state() {
        ConversationListUiState::Loading => lines.push("  Loading conversations...".to_owned()),
        ConversationListUiState::Empty => lines.push("  No conversations yet.".to_owned()),
        ConversationListUiState::Error if list.conversations().is_empty() => {
            lines.push(format!("  {}", list.error().unwrap_or_default()));
        }
        ConversationListUiState::Ready | ConversationListUiState::Error => {
            for conversation in list.conversations() {
                let selected = if open.is_selected(&conversation.id) { ">" } else { " " };
                let unread = if conversation.unread { UNREAD_MARKER } else { " " };
                lines.push(format!(
                    "{selected}{unread} {}: {}",
                    conversation.other_participant.name,
                    conversation.preview()
                ));
            }
        }
    }

    lines
}

/// Text lines for the open conversation panel.
pub fn open_conversation_lines(
    list: &ConversationListState,
    open: &OpenConversationState,
) -> Vec<String> {
    let Some(id) = open.conversation_id() else {
        return vec!["Select a conversation to start messaging.".to_owned()];
    };

    let title = list
        .find(id)
        .map(|conversation| conversation.other_participant.name.clone())
        .unwrap_or_else(|| id.to_string());
    let mut lines = vec![format!("== {title} ==")];

    match open.phase() {
        OpenConversationPhase::Subscribing if open.messages().is_empty() => {
            lines.push("Loading messages...".to_owned());
        }
        OpenConversationPhase::Live if open.messages().is_empty() => {
            lines.push("No messages yet. Say hello!".to_owned());
        }
        _ => lines.extend(
            build_message_list_elements(open.messages())
                .iter()
                .map(element_to_line),
        ),
    }

    if let Some(error) = open.error() {
        lines.push(format!("! {error}"));
    }
    lines
}
