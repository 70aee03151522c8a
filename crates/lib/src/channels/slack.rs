//! Slack channel: chat.postMessage via the Web API.

use crate::channels::sink::{NotificationSink, SinkError};
use crate::relay::protocol::FileAttachment;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);
const DEFAULT_API_BASE: &str = "https://slack.com/api";

#[derive(Debug, thiserror::Error)]
pub enum SlackError {
    #[error("slack request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("slack api error: {status} {body}")]
    Api { status: u16, body: String },
    #[error("slack rejected message: {0}")]
    Rejected(String),
}

#[derive(Debug, Serialize)]
struct PostMessageRequest<'a> {
    channel: &'a str,
    text: &'a str,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    attachments: Vec<SlackAttachment<'a>>,
}

#[derive(Debug, Serialize)]
struct SlackAttachment<'a> {
    title: &'a str,
    title_link: &'a str,
}

#[derive(Debug, Deserialize)]
struct PostMessageResponse {
    ok: bool,
    #[serde(default)]
    error: Option<String>,
}

/// Slack Web API client used as the relay's notification sink.
#[derive(Clone)]
pub struct SlackSink {
    api_base: String,
    token: String,
    client: reqwest::Client,
}

impl SlackSink {
    pub fn new(token: impl Into<String>, api_base: Option<String>) -> Self {
        let api_base = api_base
            .map(|u| u.trim_end_matches('/').to_string())
            .unwrap_or_else(|| DEFAULT_API_BASE.to_string());
        Self {
            api_base,
            token: token.into(),
            client: reqwest::Client::builder()
                .timeout(REQUEST_TIMEOUT)
                .build()
                .unwrap_or_default(),
        }
    }

    /// POST chat.postMessage. Slack answers 200 with `ok: false` for most failures.
    pub async fn post_message(
        &self,
        channel: &str,
        text: &str,
        attachments: &[FileAttachment],
    ) -> Result<(), SlackError> {
        let url = format!("{}/chat.postMessage", self.api_base);
        let body = PostMessageRequest {
            channel,
            text,
            attachments: attachments
                .iter()
                .map(|a| SlackAttachment {
                    title: &a.title,
                    title_link: &a.url,
                })
                .collect(),
        };
        let res = self
            .client
            .post(&url)
            .bearer_auth(&self.token)
            .json(&body)
            .send()
            .await?;
        if !res.status().is_success() {
            let status = res.status().as_u16();
            let body = res.text().await.unwrap_or_default();
            return Err(SlackError::Api { status, body });
        }
        let data: PostMessageResponse = res.json().await?;
        if !data.ok {
            return Err(SlackError::Rejected(
                data.error.unwrap_or_else(|| "unknown_error".to_string()),
            ));
        }
        log::info!("message sent to {}", channel);
        Ok(())
    }
}

#[async_trait]
impl NotificationSink for SlackSink {
    async fn post(
        &self,
        text: &str,
        channel: &str,
        attachments: &[FileAttachment],
    ) -> Result<(), SinkError> {
        self.post_message(channel, text, attachments)
            .await
            .map_err(SinkError::from)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn posts_text_and_attachments() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat.postMessage"))
            .and(header("authorization", "Bearer xoxb-test"))
            .and(body_json(serde_json::json!({
                "channel": "#general",
                "text": "Alice: hi",
                "attachments": [{ "title": "a.png", "title_link": "https://b/T1/H1?name=a.png" }]
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({ "ok": true })))
            .expect(1)
            .mount(&server)
            .await;

        let sink = SlackSink::new("xoxb-test", Some(server.uri()));
        let attachments = vec![FileAttachment {
            title: "a.png".into(),
            url: "https://b/T1/H1?name=a.png".into(),
        }];
        sink.post("Alice: hi", "#general", &attachments).await.unwrap();
    }

    #[tokio::test]
    async fn empty_attachments_are_omitted() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat.postMessage"))
            .and(body_json(serde_json::json!({ "channel": "#status", "text": "up" })))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({ "ok": true })))
            .expect(1)
            .mount(&server)
            .await;

        let sink = SlackSink::new("t", Some(format!("{}/", server.uri())));
        sink.post_message("#status", "up", &[]).await.unwrap();
    }

    #[tokio::test]
    async fn ok_false_is_rejected_with_remote_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat.postMessage"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(serde_json::json!({ "ok": false, "error": "channel_not_found" })),
            )
            .mount(&server)
            .await;

        let sink = SlackSink::new("t", Some(server.uri()));
        let err = sink.post_message("#nope", "x", &[]).await.unwrap_err();
        assert!(matches!(err, SlackError::Rejected(ref e) if e == "channel_not_found"));
        assert!(err.to_string().contains("channel_not_found"));
    }

    #[tokio::test]
    async fn http_failure_carries_status_and_body() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
            .mount(&server)
            .await;

        let sink = SlackSink::new("t", Some(server.uri()));
        let err = sink.post_message("#general", "x", &[]).await.unwrap_err();
        assert!(matches!(err, SlackError::Api { status: 500, ref body } if body == "boom"));
    }
}
