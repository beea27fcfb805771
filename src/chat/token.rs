//! Token provisioning against the chat authentication service.
//!
//! A display name is exchanged for a short-lived [`Credential`] with
//! `POST {api_url}/auth`. One request is made per call; nothing is cached
//! or retried here.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};
use uuid::Uuid;

use super::credential::Credential;
use crate::config::ChatConfig;
use crate::{ChatError, Result};

/// User agent string for token requests.
const USER_AGENT: &str = "livechat/0.1";

/// Source of chat credentials.
#[async_trait]
pub trait TokenProvider: Send + Sync {
    /// Exchange `username` for a new credential.
    async fn fetch_token(&self, username: &str) -> Result<Credential>;
}

/// Permission scope granted to a token. Only message sending is supported.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Capability {
    /// Send chat messages.
    SendMessage,
}

/// Body of the token request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthRequest {
    /// Room resource identifier.
    pub arn: String,
    /// Composite user id, unique per sign-in.
    pub user_id: String,
    /// User attributes; carries `username`.
    pub attributes: HashMap<String, String>,
    /// Requested capabilities.
    pub capabilities: Vec<Capability>,
}

impl AuthRequest {
    /// Build a request for `username` in `room_id`.
    ///
    /// Only message sending is requested; moderation scopes are never asked for.
    pub fn new(room_id: impl Into<String>, username: &str) -> Self {
        let mut attributes = HashMap::new();
        attributes.insert("username".to_string(), username.to_string());
        Self {
            arn: room_id.into(),
            user_id: generate_user_id(username),
            attributes,
            capabilities: vec![Capability::SendMessage],
        }
    }
}

/// Body of a successful token response.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthResponse {
    /// Opaque chat token.
    pub token: String,
    /// Session expiration timestamp.
    pub session_expiration_time: DateTime<Utc>,
    /// Token expiration timestamp.
    pub token_expiration_time: DateTime<Utc>,
}

impl From<AuthResponse> for Credential {
    fn from(response: AuthResponse) -> Self {
        Credential::new(
            response.token,
            response.session_expiration_time,
            response.token_expiration_time,
        )
    }
}

/// Generate a per-sign-in user id of the form `"{username}.{uuid}"`.
pub fn generate_user_id(username: &str) -> String {
    format!("{}.{}", username, Uuid::new_v4())
}

/// Parse a token response body.
pub fn parse_auth_response(body: &[u8]) -> Result<Credential> {
    let response: AuthResponse = serde_json::from_slice(body)
        .map_err(|e| ChatError::Auth(format!("malformed token response: {e}")))?;
    if response.token.is_empty() {
        return Err(ChatError::Auth("token response has an empty token".to_string()));
    }
    Ok(response.into())
}

/// Token provider backed by the HTTP authentication service.
pub struct HttpTokenProvider {
    client: Client,
    auth_url: String,
    room_id: String,
}

impl HttpTokenProvider {
    /// Create a provider from the chat configuration.
    pub fn new(config: &ChatConfig) -> Result<Self> {
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(config.connect_timeout_secs))
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .user_agent(USER_AGENT)
            .build()
            .map_err(|e| ChatError::Config(format!("failed to create HTTP client: {e}")))?;

        Ok(Self {
            client,
            auth_url: format!("{}/auth", config.api_url.trim_end_matches('/')),
            room_id: config.room_id.clone(),
        })
    }

    /// URL the token requests are posted to.
    pub fn auth_url(&self) -> &str {
        &self.auth_url
    }
}

#[async_trait]
impl TokenProvider for HttpTokenProvider {
    async fn fetch_token(&self, username: &str) -> Result<Credential> {
        let request = AuthRequest::new(&self.room_id, username);
        debug!(user_id = %request.user_id, "requesting chat token");

        let response = self
            .client
            .post(&self.auth_url)
            .json(&request)
            .send()
            .await
            .map_err(|e| ChatError::Auth(format!("failed to request token: {e}")))?;

        if !response.status().is_success() {
            warn!(status = %response.status(), "token request rejected");
            return Err(ChatError::Auth(format!("HTTP error: {}", response.status())));
        }

        let body = response
            .bytes()
            .await
            .map_err(|e| ChatError::Auth(format!("failed to read token response: {e}")))?;

        parse_auth_response(&body)
    }
}
