use std::fmt;

use async_trait::async_trait;
use futures::stream::BoxStream;
use thiserror::Error;

use crate::domain::ids::{ConversationId, UserId};

/// Live query result: the full matching set after every change.
pub type SnapshotStream<T> = BoxStream<'static, Result<Vec<T>, FeedError>>;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FeedError {
    #[error("permission denied by document store")]
    PermissionDenied,
    #[error("document store unavailable")]
    Unavailable,
    #[error("invalid document {id}: {reason}")]
    InvalidData { id: String, reason: String },
}

/// Short-lived bearer credential minted by the identity provider.
#[derive(Clone, PartialEq, Eq)]
pub struct IdToken(String);

impl IdToken {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for IdToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("IdToken([REDACTED])")
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CredentialError {
    #[error("no signed-in user")]
    NotSignedIn,
    #[error("identity provider unavailable")]
    Unavailable,
}

/// Mints a credential per request; implementations refresh transparently.
#[async_trait]
pub trait CredentialProvider: Send + Sync {
    async fn id_token(&self) -> Result<IdToken, CredentialError>;
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum WriteApiError {
    #[error("credential rejected")]
    Unauthorized,
    #[error("{0}")]
    Rejected(String),
    #[error("conversation not found")]
    ConversationNotFound,
    #[error("backend unavailable")]
    Unavailable,
    #[error("network failure: {0}")]
    Network(String),
}

/// Authenticated REST endpoints for writes that need server-side checks.
#[async_trait]
pub trait WriteApi: Send + Sync {
    async fn start_conversation(
        &self,
        token: &IdToken,
        recipient: &UserId,
    ) -> Result<ConversationId, WriteApiError>;

    async fn send_message(
        &self,
        token: &IdToken,
        conversation: &ConversationId,
        content: &str,
    ) -> Result<(), WriteApiError>;
}
