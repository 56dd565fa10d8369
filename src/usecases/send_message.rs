//! Use case for sending a message to the selected conversation.
//!
//! Nothing is inserted locally: the message shows up once the message
//! stream delivers the committed document.

use thiserror::Error;

use crate::{
    domain::ids::{ConversationId, UserId},
    usecases::contracts::{CredentialError, CredentialProvider, WriteApi, WriteApiError},
};

/// Command to send a message to a conversation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SendMessageCommand {
    pub sender: Option<UserId>,
    pub conversation_id: Option<ConversationId>,
    pub content: String,
}

/// Send failures, each with the text shown next to the message input.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SendMessageError {
    /// Content is empty after trimming whitespace.
    #[error("Message cannot be empty.")]
    EmptyMessage,
    #[error("Select a conversation before sending a message.")]
    NoConversationSelected,
    #[error("You must be logged in to send messages.")]
    AuthenticationRequired,
    #[error("This conversation no longer exists.")]
    ConversationNotFound,
    /// Backend refused the message; carries its error text.
    #[error("{0}")]
    Rejected(String),
    #[error("Could not reach the server. Check your connection and try again.")]
    NetworkFailure,
    #[error("Failed to send message.")]
    TemporarilyUnavailable,
}

/// Validates the command, mints a credential, and posts the message.
///
/// # Errors
/// Validation errors are returned before any credential or network call.
pub async fn send_message(
    api: &dyn WriteApi,
    credentials: &dyn CredentialProvider,
    command: SendMessageCommand,
) -> Result<(), SendMessageError> {
    let content = command.content.trim();
    if content.is_empty() {
        return Err(SendMessageError::EmptyMessage);
    }

    let conversation_id = command
        .conversation_id
        .ok_or(SendMessageError::NoConversationSelected)?;

    if command.sender.is_none() {
        return Err(SendMessageError::AuthenticationRequired);
    }

    let token = credentials.id_token().await.map_err(map_credential_error)?;

    api.send_message(&token, &conversation_id, content)
        .await
        .map_err(map_source_error)
}

fn map_credential_error(error: CredentialError) -> SendMessageError {
    match error {
        CredentialError::NotSignedIn => SendMessageError::AuthenticationRequired,
        CredentialError::Unavailable => SendMessageError::NetworkFailure,
    }
}

fn map_source_error(error: WriteApiError) -> SendMessageError {
    match error {
        WriteApiError::Unauthorized => SendMessageError::AuthenticationRequired,
        WriteApiError::ConversationNotFound => SendMessageError::ConversationNotFound,
        WriteApiError::Rejected(message) => SendMessageError::Rejected(message),
        WriteApiError::Network(_) => SendMessageError::NetworkFailure,
        WriteApiError::Unavailable => SendMessageError::TemporarilyUnavailable,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{StubCredentials, StubWriteApi};

    fn command(conversation: Option<&str>, content: &str) -> SendMessageCommand {
        SendMessageCommand {
            sender: Some(UserId::new("u1")),
            conversation_id: conversation.map(ConversationId::new),
            content: content.to_owned(),
        }
    }

    #[tokio::test]
    async fn rejects_empty_message_before_any_call() {
        let api = StubWriteApi::default();
        let credentials = StubCredentials::signed_in("tok");

        let result = send_message(&api, &credentials, command(Some("conv1"), "")).await;

        assert_eq!(result, Err(SendMessageError::EmptyMessage));
        assert_eq!(api.calls(), 0);
        assert_eq!(credentials.mints(), 0);
    }

    #[tokio::test]
    async fn rejects_whitespace_only_message() {
        let api = StubWriteApi::default();
        let credentials = StubCredentials::signed_in("tok");

        let result = send_message(&api, &credentials, command(Some("conv1"), "  \n\t ")).await;

        assert_eq!(result, Err(SendMessageError::EmptyMessage));
        assert_eq!(api.calls(), 0);
    }

    #[tokio::test]
    async fn requires_selected_conversation() {
        let api = StubWriteApi::default();
        let credentials = StubCredentials::signed_in("tok");

        let result = send_message(&api, &credentials, command(None, "hi")).await;

        assert_eq!(result, Err(SendMessageError::NoConversationSelected));
        assert_eq!(api.calls(), 0);
    }

    #[tokio::test]
    async fn requires_signed_in_user() {
        let api = StubWriteApi::default();
        let credentials = StubCredentials::signed_out();

        let result = send_message(&api, &credentials, command(Some("conv1"), "hi")).await;

        assert_eq!(result, Err(SendMessageError::AuthenticationRequired));
        assert_eq!(api.calls(), 0);
    }

    #[tokio::test]
    async fn requires_sender_before_minting_credential() {
        let api = StubWriteApi::default();
        let credentials = StubCredentials::signed_in("tok");
        let mut anonymous = command(Some("conv1"), "hi");
        anonymous.sender = None;

        let result = send_message(&api, &credentials, anonymous).await;

        assert_eq!(result, Err(SendMessageError::AuthenticationRequired));
        assert_eq!(credentials.mints(), 0);
    }

    #[tokio::test]
    async fn trims_content_and_passes_token() {
        let api = StubWriteApi::default();
        let credentials = StubCredentials::signed_in("tok-1");

        send_message(&api, &credentials, command(Some("conv7"), "  hello world  "))
            .await
            .expect("send should succeed");

        let sent = api.last_message().expect("message should be captured");
        assert_eq!(sent.0.as_str(), "conv7");
        assert_eq!(sent.1, "hello world");
        assert_eq!(sent.2, "tok-1");
    }

    #[tokio::test]
    async fn maps_backend_errors_to_distinct_messages() {
        let cases = [
            (WriteApiError::Unauthorized, SendMessageError::AuthenticationRequired),
            (
                WriteApiError::ConversationNotFound,
                SendMessageError::ConversationNotFound,
            ),
            (
                WriteApiError::Rejected("Message too long".to_owned()),
                SendMessageError::Rejected("Message too long".to_owned()),
            ),
            (
                WriteApiError::Network("timed out".to_owned()),
                SendMessageError::NetworkFailure,
            ),
            (WriteApiError::Unavailable, SendMessageError::TemporarilyUnavailable),
        ];

        for (source, expected) in cases {
            let api = StubWriteApi::failing_with(source.clone());
            let credentials = StubCredentials::signed_in("tok");

            let result = send_message(&api, &credentials, command(Some("conv1"), "hi")).await;

            assert_eq!(result, Err(expected), "failed for {source:?}");
        }
    }

    #[test]
    fn user_messages_are_distinct() {
        let messages = [
            SendMessageError::EmptyMessage.to_string(),
            SendMessageError::AuthenticationRequired.to_string(),
            SendMessageError::NetworkFailure.to_string(),
        ];

        assert_ne!(messages[0], messages[1]);
        assert_ne!(messages[1], messages[2]);
        assert_ne!(messages[0], messages[2]);
    }
}
