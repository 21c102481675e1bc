//! Credential verification over HTTP
//!
//! `POST {url}` with `{"accountName", "passphrase"}` and a bearer token. A
//! `200` response carrying `{"success": true}` admits the publisher; any other
//! status, a transport or decode failure, or `success: false` rejects it.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use super::{Authenticator, Credentials};
use crate::config::AuthConfig;
use crate::error::AuthError;

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct VerifyRequest<'a> {
    account_name: &'a str,
    passphrase: &'a str,
}

#[derive(Deserialize)]
struct VerifyResponse {
    success: bool,
    #[serde(default)]
    message: Option<String>,
}

/// Verifies publisher credentials against the account service
pub struct RemoteAuthenticator {
    client: reqwest::Client,
    url: String,
    api_token: String,
}

impl RemoteAuthenticator {
    pub fn new(config: &AuthConfig) -> Result<Self, AuthError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .user_agent(config.user_agent.clone())
            .build()?;

        Ok(Self::with_client(config, client))
    }

    /// Use a caller-provided HTTP client
    pub fn with_client(config: &AuthConfig, client: reqwest::Client) -> Self {
        Self {
            client,
            url: config.url.clone(),
            api_token: config.api_token.clone(),
        }
    }
}

#[async_trait]
impl Authenticator for RemoteAuthenticator {
    #[tracing::instrument(skip_all, fields(account = %credentials.name))]
    async fn authenticate(&self, credentials: &Credentials) -> Result<(), AuthError> {
        let request = VerifyRequest {
            account_name: &credentials.name,
            passphrase: &credentials.secret,
        };

        let resp = self
            .client
            .post(&self.url)
            .bearer_auth(&self.api_token)
            .json(&request)
            .send()
            .await?;

        let status = resp.status();
        if status != reqwest::StatusCode::OK {
            return Err(AuthError::Status(status.as_u16()));
        }

        let body: VerifyResponse = resp
            .json()
            .await
            .map_err(|e| AuthError::Decode(e.to_string()))?;

        if !body.success {
            return Err(AuthError::Rejected(body.message.filter(|m| !m.is_empty())));
        }

        tracing::debug!("Credentials accepted");
        Ok(())
    }
}
