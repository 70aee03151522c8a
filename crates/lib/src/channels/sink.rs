//! Notification sink: where forwarded messages and lifecycle notices go.

use crate::channels::slack::SlackError;
use crate::relay::protocol::FileAttachment;
use async_trait::async_trait;

#[derive(Debug, thiserror::Error)]
pub enum SinkError {
    #[error(transparent)]
    Slack(#[from] SlackError),
}

/// Posts text (with optional attachments) to a channel. Delivery is best-effort.
#[async_trait]
pub trait NotificationSink: Send + Sync {
    async fn post(
        &self,
        text: &str,
        channel: &str,
        attachments: &[FileAttachment],
    ) -> Result<(), SinkError>;
}
