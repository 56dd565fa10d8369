use thiserror::Error;

use crate::{
    domain::ids::{ConversationId, UserId},
    usecases::contracts::{CredentialError, CredentialProvider, WriteApi, WriteApiError},
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StartConversationCommand {
    pub current_user: Option<UserId>,
    pub recipient: UserId,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StartConversationError {
    #[error("Select someone to start a conversation with.")]
    MissingRecipient,
    #[error("You cannot start a conversation with yourself.")]
    SelfConversation,
    #[error("You must be logged in to start a new conversation.")]
    AuthenticationRequired,
    #[error("{0}")]
    Rejected(String),
    #[error("Could not reach the server. Check your connection and try again.")]
    NetworkFailure,
    #[error("Failed to start conversation.")]
    TemporarilyUnavailable,
}

pub async fn start_conversation(
    api: &dyn WriteApi,
    credentials: &dyn CredentialProvider,
    command: StartConversationCommand,
) -> Result<ConversationId, StartConversationError> {
    if command.recipient.is_blank() {
        return Err(StartConversationError::MissingRecipient);
    }

    let current_user = command
        .current_user
        .ok_or(StartConversationError::AuthenticationRequired)?;
    if current_user == command.recipient {
        return Err(StartConversationError::SelfConversation);
    }

    let token = credentials.id_token().await.map_err(|error| match error {
        CredentialError::NotSignedIn => StartConversationError::AuthenticationRequired,
        CredentialError::Unavailable => StartConversationError::NetworkFailure,
    })?;

    api.start_conversation(&token, &command.recipient)
        .await
        .map_err(map_source_error)
}

fn map_source_error(error: WriteApiError) -> StartConversationError {
    match error {
        WriteApiError::Unauthorized => StartConversationError::AuthenticationRequired,
        WriteApiError::Rejected(message) => StartConversationError::Rejected(message),
        WriteApiError::Network(_) => StartConversationError::NetworkFailure,
        WriteApiError::ConversationNotFound | WriteApiError::Unavailable => {
            StartConversationError::TemporarilyUnavailable
        }
    }
}
