//! Quip API client: obtains a realtime WebSocket endpoint for the token's user.

use async_trait::async_trait;
use serde::Deserialize;
use std::time::Duration;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);
const DEFAULT_BASE_URL: &str = "https://platform.quip.com";

#[derive(Debug, thiserror::Error)]
pub enum QuipError {
    #[error("quip request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("quip api error: {0}")]
    Api(String),
}

/// Endpoint returned by websockets/new. Each URL is good for one connection.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct SessionEndpoint {
    pub url: String,
    #[serde(default)]
    pub user_id: Option<String>,
}

/// Source of connection endpoints; asked once per connect attempt.
#[async_trait]
pub trait DocumentService: Send + Sync {
    async fn new_session(&self) -> Result<SessionEndpoint, QuipError>;
}

/// Client for the Quip Automation API.
#[derive(Clone)]
pub struct QuipClient {
    base_url: String,
    access_token: String,
    client: reqwest::Client,
}

impl QuipClient {
    pub fn new(access_token: impl Into<String>, base_url: Option<String>) -> Self {
        let base_url = base_url
            .map(|u| u.trim_end_matches('/').to_string())
            .unwrap_or_else(|| DEFAULT_BASE_URL.to_string());
        Self {
            base_url,
            access_token: access_token.into(),
            client: reqwest::Client::builder()
                .timeout(REQUEST_TIMEOUT)
                .build()
                .unwrap_or_default(),
        }
    }

    /// GET /1/websockets/new
    pub async fn new_websocket(&self) -> Result<SessionEndpoint, QuipError> {
        let url = format!("{}/1/websockets/new", self.base_url);
        let res = self
            .client
            .get(&url)
            .bearer_auth(&self.access_token)
            .send()
            .await?;
        if !res.status().is_success() {
            let status = res.status();
            let body = res.text().await.unwrap_or_default();
            return Err(QuipError::Api(format!("{} {}", status, body)));
        }
        let endpoint: SessionEndpoint = res.json().await?;
        if endpoint.url.trim().is_empty() {
            return Err(QuipError::Api("websockets/new returned an empty url".to_string()));
        }
        Ok(endpoint)
    }
}

#[async_trait]
impl DocumentService for QuipClient {
    async fn new_session(&self) -> Result<SessionEndpoint, QuipError> {
        self.new_websocket().await
    }
}
