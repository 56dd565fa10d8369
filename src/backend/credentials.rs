use async_trait::async_trait;

use crate::usecases::contracts::{CredentialError, CredentialProvider, IdToken};

/// Hands out a token obtained outside the process, e.g. from the environment.
#[derive(Debug, Clone, Default)]
pub struct StaticCredentialProvider {
    token: Option<IdToken>,
}

impl StaticCredentialProvider {
    pub fn new(token: Option<IdToken>) -> Self {
        Self { token }
    }

    /// Treats a missing or blank value as signed out.
    pub fn from_raw(raw: Option<&str>) -> Self {
        let token = raw
            .map(str::trim)
            .filter(|value| !value.is_empty())
            .map(IdToken::new);
        Self { token }
    }
}

#[async_trait]
impl CredentialProvider for StaticCredentialProvider {
    async fn id_token(&self) -> Result<IdToken, CredentialError> {
        self.token.clone().ok_or(CredentialError::NotSignedIn)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn blank_token_counts_as_signed_out() {
        let provider = StaticCredentialProvider::from_raw(Some("   "));

        assert_eq!(provider.id_token().await, Err(CredentialError::NotSignedIn));
    }

    #[tokio::test]
    async fn returns_trimmed_token() {
        let provider = StaticCredentialProvider::from_raw(Some(" abc.def \n"));

        let token = provider.id_token().await.expect("token should be present");

        assert_eq!(token.expose(), "abc.def");
    }
}
