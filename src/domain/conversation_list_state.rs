use super::{
    conversation::{unread_count, ConversationSummary},
    ids::ConversationId,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConversationListUiState {
    Loading,
    Ready,
    Empty,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConversationListState {
    ui_state: ConversationListUiState,
    conversations: Vec<ConversationSummary>,
    last_batch: Option<u64>,
    error: Option<String>,
}

impl Default for ConversationListState {
    fn default() -> Self {
        Self {
            ui_state: ConversationListUiState::Loading,
            conversations: Vec::new(),
            last_batch: None,
            error: None,
        }
    }
}

impl ConversationListState {
    pub fn ui_state(&self) -> ConversationListUiState {
        self.ui_state
    }

    pub fn conversations(&self) -> &[ConversationSummary] {
        &self.conversations
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn unread_count(&self) -> usize {
        unread_count(&self.conversations)
    }

    pub fn find(&self, id: &ConversationId) -> Option<&ConversationSummary> {
        self.conversations.iter().find(|c| &c.id == id)
    }

    pub fn contains(&self, id: &ConversationId) -> bool {
        self.find(id).is_some()
    }

    pub fn first_id(&self) -> Option<&ConversationId> {
        self.conversations.first().map(|c| &c.id)
    }

    /// Replaces the whole list with a published batch. Batches that are not
    /// newer than the last applied one are ignored; returns whether it applied.
    pub fn apply_batch(&mut self, batch: u64, conversations: Vec<ConversationSummary>) -> bool {
        if self.last_batch.is_some_and(|last| batch <= last) {
            return false;
        }

        self.last_batch = Some(batch);
        self.error = None;
        self.ui_state = if conversations.is_empty() {
            ConversationListUiState::Empty
        } else {
            ConversationListUiState::Ready
        };
        self.conversations = conversations;
        true
    }

    /// Shows the error while keeping the last good list visible.
    pub fn set_error(&mut self, message: impl Into<String>) {
        self.ui_state = ConversationListUiState::Error;
        self.error = Some(message.into());
    }

    pub fn clear(&mut self) {
        *self = Self::default();
    }
}
