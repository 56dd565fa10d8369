use super::{ids::ConversationId, message::Message};

/// Lifecycle of the selected conversation's message view.
///
/// Reselecting while live tears the old subscription down and goes back to
/// `Subscribing` for the new id; `Error` keeps the last messages on screen.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpenConversationPhase {
    Unselected,
    Subscribing,
    Live,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SelectionChange {
    Unchanged,
    Opened,
    Switched { from: ConversationId },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OpenConversationState {
    conversation_id: Option<ConversationId>,
    phase: OpenConversationPhase,
    messages: Vec<Message>,
    error: Option<String>,
}

impl Default for OpenConversationState {
    fn default() -> Self {
        Self {
            conversation_id: None,
            phase: OpenConversationPhase::Unselected,
            messages: Vec::new(),
            error: None,
        }
    }
}

impl OpenConversationState {
    pub fn conversation_id(&self) -> Option<&ConversationId> {
        self.conversation_id.as_ref()
    }

    pub fn phase(&self) -> OpenConversationPhase {
        self.phase
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn is_selected(&self, id: &ConversationId) -> bool {
        self.conversation_id.as_ref() == Some(id)
    }

    pub fn select(&mut self, id: ConversationId) -> SelectionChange {
        if self.is_selected(&id) && self.phase != OpenConversationPhase::Error {
            return SelectionChange::Unchanged;
        }

        let previous = self.conversation_id.replace(id.clone());
        self.phase = OpenConversationPhase::Subscribing;
        self.error = None;

        match previous {
            Some(from) if from != id => {
                self.messages.clear();
                SelectionChange::Switched { from }
            }
            Some(_) => SelectionChange::Opened,
            None => {
                self.messages.clear();
                SelectionChange::Opened
            }
        }
    }

    /// Applies messages only when they belong to the selected conversation.
    pub fn apply_messages(&mut self, id: &ConversationId, messages: Vec<Message>) -> bool {
        if !self.is_selected(id) {
            return false;
        }

        self.messages = messages;
        self.phase = OpenConversationPhase::Live;
        self.error = None;
        true
    }

    pub fn apply_error(&mut self, id: &ConversationId, message: impl Into<String>) -> bool {
        if !self.is_selected(id) {
            return false;
        }

        self.phase = OpenConversationPhase::Error;
        self.error = Some(message.into());
        true
    }

    /// Moves an errored view back to `Subscribing`, returning the id to resubscribe.
    pub fn retry(&mut self) -> Option<ConversationId> {
        if self.phase != OpenConversationPhase::Error {
            return None;
        }

        self.phase = OpenConversationPhase::Subscribing;
        self.error = None;
        self.conversation_id.clone()
    }

    pub fn clear(&mut self) {
        *self = Self::default();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ids::{MessageId, UserId};

    fn message(id: &str) -> Message {
        Message {
            id: MessageId::new(id),
            sender_id: UserId::new("u2"),
            sender_name: "Bob".to_owned(),
            content: "hello".to_owned(),
            timestamp: None,
            is_outgoing: false,
        }
    }

    fn conv(id: &str) -> ConversationId {
        ConversationId::new(id)
    }

    #[test]
    fn default_state_is_unselected() {
        let state = OpenConversationState::default();

        assert_eq!(state.phase(), OpenConversationPhase::Unselected);
        assert_eq!(state.conversation_id(), None);
        assert!(state.messages().is_empty());
    }

    #[test]
    fn selecting_moves_to_subscribing() {
        let mut state = OpenConversationState::default();

        let change = state.select(conv("a"));

        assert_eq!(change, SelectionChange::Opened);
        assert_eq!(state.phase(), OpenConversationPhase::Subscribing);
    }

    #[test]
    fn messages_for_selected_conversation_go_live() {
        let mut state = OpenConversationState::default();
        state.select(conv("a"));

        assert!(state.apply_messages(&conv("a"), vec![message("m1")]));

        assert_eq!(state.phase(), OpenConversationPhase::Live);
        assert_eq!(state.messages().len(), 1);
    }

    #[test]
    fn switching_clears_previous_messages() {
        let mut state = OpenConversationState::default();
        state.select(conv("a"));
        state.apply_messages(&conv("a"), vec![message("m1")]);

        let change = state.select(conv("b"));

        assert_eq!(change, SelectionChange::Switched { from: conv("a") });
        assert!(state.messages().is_empty());
        assert_eq!(state.phase(), OpenConversationPhase::Subscribing);
    }

    #[test]
    fn late_messages_from_previous_selection_are_discarded() {
        let mut state = OpenConversationState::default();
        state.select(conv("a"));
        state.select(conv("b"));

        let applied = state.apply_messages(&conv("a"), vec![message("stale")]);

        assert!(!applied);
        assert!(state.messages().is_empty());
        assert_eq!(state.conversation_id(), Some(&conv("b")));
    }

    #[test]
    fn reselecting_live_conversation_is_a_no_op() {
        let mut state = OpenConversationState::default();
        state.select(conv("a"));
        state.apply_messages(&conv("a"), vec![message("m1")]);

        assert_eq!(state.select(conv("a")), SelectionChange::Unchanged);
        assert_eq!(state.phase(), OpenConversationPhase::Live);
    }

    #[test]
    fn error_keeps_messages_and_can_retry() {
        let mut state = OpenConversationState::default();
        state.select(conv("a"));
        state.apply_messages(&conv("a"), vec![message("m1")]);

        state.apply_error(&conv("a"), "Failed to load messages.");

        assert_eq!(state.phase(), OpenConversationPhase::Error);
        assert_eq!(state.messages().len(), 1);
        assert_eq!(state.retry(), Some(conv("a")));
        assert_eq!(state.phase(), OpenConversationPhase::Subscribing);
        assert_eq!(state.messages().len(), 1);
    }

    #[test]
    fn reselecting_errored_conversation_resubscribes() {
        let mut state = OpenConversationState::default();
        state.select(conv("a"));
        state.apply_error(&conv("a"), "boom");

        assert_eq!(state.select(conv("a")), SelectionChange::Opened);
        assert_eq!(state.phase(), OpenConversationPhase::Subscribing);
    }

    #[test]
    fn retry_outside_error_does_nothing() {
        let mut state = OpenConversationState::default();
        state.select(conv("a"));

        assert_eq!(state.retry(), None);
    }

    #[test]
    fn clear_returns_to_unselected() {
        let mut state = OpenConversationState::default();
        state.select(conv("a"));
        state.apply_messages(&conv("a"), vec![message("m1")]);

        state.clear();

        assert_eq!(state.phase(), OpenConversationPhase::Unselected);
        assert!(state.messages().is_empty());
    }
}
