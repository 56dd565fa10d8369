//! REST client for the authenticated write endpoints.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode, Url};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{
    domain::ids::{ConversationId, UserId},
    infra::config::BackendConfig,
    usecases::contracts::{IdToken, WriteApi, WriteApiError},
};

const HTTP_WRITE_FAILED: &str = "HTTP_WRITE_FAILED";
const SEND_FALLBACK: &str = "Failed to send message.";
const START_FALLBACK: &str = "Failed to start conversation.";

#[derive(Debug, Error)]
pub enum HttpClientError {
    #[error("invalid api base url {url}: {reason}")]
    InvalidBaseUrl { url: String, reason: String },
    #[error("failed to build http client: {0}")]
    Build(#[from] reqwest::Error),
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct StartConversationBody<'a> {
    recipient_id: &'a str,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct StartConversationResponse {
    conversation_id: String,
}

#[derive(Serialize)]
struct SendMessageBody<'a> {
    content: &'a str,
}

#[derive(Deserialize)]
struct ErrorBody {
    error: Option<String>,
}

#[derive(Debug, Clone)]
pub struct HttpWriteApi {
    client: Client,
    base: Url,
}

impl HttpWriteApi {
    pub fn new(config: &BackendConfig) -> Result<Self, HttpClientError> {
        let base = endpoint_base(&config.api_base_url, &config.api_prefix)?;
        let client = Client::builder()
            .timeout(Duration::from_millis(config.request_timeout_ms))
            .build()?;

        Ok(Self { client, base })
    }

    fn url(&self, segments: &[&str]) -> Result<Url, WriteApiError> {
        let mut url = self.base.clone();
        url.path_segments_mut()
            .map_err(|()| WriteApiError::Unavailable)?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    async fn post<B: Serialize + Sync>(
        &self,
        url: Url,
        token: &IdToken,
        body: &B,
        fallback: &str,
    ) -> Result<String, WriteApiError> {
        let response = self
            .client
            .post(url)
            .bearer_auth(token.expose())
            .json(body)
            .send()
            .await
            .map_err(network_error)?;

        let status = response.status();
        let text = response.text().await.map_err(network_error)?;
        if status.is_success() {
            return Ok(text);
        }

        let error = map_status(status, &text, fallback);
        tracing::warn!(
            code = HTTP_WRITE_FAILED,
            status = status.as_u16(),
            error = %error,
            "write request failed"
        );
        Err(error)
    }
}

#[async_trait]
impl WriteApi for HttpWriteApi {
    async fn start_conversation(
        &self,
        token: &IdToken,
        recipient: &UserId,
    ) -> Result<ConversationId, WriteApiError> {
        let url = self.url(&["conversations"])?;
        let body = StartConversationBody {
            recipient_id: recipient.as_str(),
        };

        let text = self.post(url, token, &body, START_FALLBACK).await?;
        let response: StartConversationResponse =
            serde_json::from_str(&text).map_err(|_| WriteApiError::Unavailable)?;
        Ok(ConversationId::new(response.conversation_id))
    }

    async fn send_message(
        &self,
        token: &IdToken,
        conversation: &ConversationId,
        content: &str,
    ) -> Result<(), WriteApiError> {
        let url = self.url(&["conversations", conversation.as_str(), "messages"])?;

        self.post(url, token, &SendMessageBody { content }, SEND_FALLBACK)
            .await
            .map(|_| ())
    }
}

fn endpoint_base(base_url: &str, prefix: &str) -> Result<Url, HttpClientError> {
    let invalid = |reason: String| HttpClientError::InvalidBaseUrl {
        url: base_url.to_owned(),
        reason,
    };

    let mut url = Url::parse(base_url).map_err(|error| invalid(error.to_string()))?;
    url.path_segments_mut()
        .map_err(|()| invalid("url cannot carry a path".to_owned()))?
        .pop_if_empty()
        .extend(prefix.split('/').filter(|segment| !segment.is_empty()));
    Ok(url)
}

/// Maps a non-success status and its body to a write error.
fn map_status(status: StatusCode, body: &str, fallback: &str) -> WriteApiError {
    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => WriteApiError::Unauthorized,
        StatusCode::NOT_FOUND => WriteApiError::ConversationNotFound,
        StatusCode::BAD_REQUEST | StatusCode::UNPROCESSABLE_ENTITY => {
            WriteApiError::Rejected(error_text(body).unwrap_or_else(|| fallback.to_owned()))
        }
        _ => WriteApiError::Unavailable,
    }
}

fn error_text(body: &str) -> Option<String> {
    serde_json::from_str::<ErrorBody>(body)
        .ok()
        .and_then(|body| body.error)
        .filter(|text| !text.trim().is_empty())
}

fn network_error(error: reqwest::Error) -> WriteApiError {
    WriteApiError::Network(error.to_string())
}
