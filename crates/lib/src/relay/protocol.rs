//! Relay data model: typed inbound events and the outbound notification shape.

use serde::Serialize;

/// Inbound frame after classification. Built once per frame and never mutated.
#[derive(Debug, Clone, PartialEq)]
pub enum TypedEvent {
    /// `type: "message"`. Either part may be missing from the frame.
    Message {
        message: Option<ChatMessage>,
        thread: Option<ThreadRef>,
        payload: serde_json::Value,
    },
    /// `type: "alive"`; payload kept for diagnostics only.
    Alive(serde_json::Value),
    /// `type: "heartbeat"` echoed by the server; payload kept for diagnostics only.
    Heartbeat(serde_json::Value),
    /// Valid JSON with a missing or unknown `type`.
    Unclassified(serde_json::Value),
    /// Not JSON at all; the raw text is kept for logging.
    Unparseable(String),
}

/// Chat message body of a `message` frame.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChatMessage {
    pub author_name: Option<String>,
    pub text: Option<String>,
    pub files: Vec<FileRef>,
}

/// File attached to a chat message, addressed by blob hash within its thread.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileRef {
    pub name: String,
    pub hash: String,
}

/// Document/conversation the message belongs to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ThreadRef {
    pub id: String,
}

/// Outbound-ready attachment: display title plus fetch URL.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FileAttachment {
    pub title: String,
    pub url: String,
}

/// Notification handed to the sink. Immutable once built.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutboundNotification {
    pub text: String,
    pub attachments: Vec<FileAttachment>,
    pub channel: String,
}

/// Keep-alive frame: `{"type":"heartbeat"}`.
#[derive(Debug, Clone, Serialize)]
pub struct KeepAliveFrame {
    #[serde(rename = "type")]
    pub typ: &'static str,
}

impl Default for KeepAliveFrame {
    fn default() -> Self {
        Self { typ: "heartbeat" }
    }
}

impl KeepAliveFrame {
    pub fn to_text(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|_| r#"{"type":"heartbeat"}"#.to_string())
    }
}

impl TypedEvent {
    /// Alive/heartbeat traffic is low-value and logged at debug; everything else at info.
    pub fn diagnostic_level(&self) -> log::Level {
        match self {
            TypedEvent::Alive(_) | TypedEvent::Heartbeat(_) => log::Level::Debug,
            TypedEvent::Message { .. }
            | TypedEvent::Unclassified(_)
            | TypedEvent::Unparseable(_) => log::Level::Info,
        }
    }

    /// Verbatim rendering for diagnostic logs.
    pub fn diagnostic_text(&self) -> String {
        match self {
            TypedEvent::Message { payload, .. }
            | TypedEvent::Alive(payload)
            | TypedEvent::Heartbeat(payload)
            | TypedEvent::Unclassified(payload) => {
                serde_json::to_string_pretty(payload).unwrap_or_else(|_| payload.to_string())
            }
            TypedEvent::Unparseable(raw) => raw.clone(),
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            TypedEvent::Message { .. } => "message",
            TypedEvent::Alive(_) => "alive",
            TypedEvent::Heartbeat(_) => "heartbeat",
            TypedEvent::Unclassified(_) => "unclassified",
            TypedEvent::Unparseable(_) => "unparseable",
        }
    }
}
