//! Frame classification: raw inbound text to [`TypedEvent`].
//!
//! Total over any input string. Malformed or partially-shaped frames never error;
//! fields that are missing or of the wrong JSON type are treated as absent.

use crate::relay::protocol::{ChatMessage, FileRef, ThreadRef, TypedEvent};
use serde_json::Value;

/// Classify one inbound frame.
pub fn classify(raw: &str) -> TypedEvent {
    let payload: Value = match serde_json::from_str(raw) {
        Ok(v) => v,
        Err(_) => return TypedEvent::Unparseable(raw.to_string()),
    };
    let kind = payload
        .get("type")
        .and_then(Value::as_str)
        .map(str::to_string);
    match kind.as_deref() {
        Some("message") => {
            let message = payload.get("message").and_then(chat_message);
            let thread = payload
                .get("thread")
                .and_then(|t| t.get("id"))
                .and_then(Value::as_str)
                .filter(|id| !id.is_empty())
                .map(|id| ThreadRef { id: id.to_string() });
            TypedEvent::Message {
                message,
                thread,
                payload,
            }
        }
        Some("alive") => TypedEvent::Alive(payload),
        Some("heartbeat") => TypedEvent::Heartbeat(payload),
        _ => TypedEvent::Unclassified(payload),
    }
}

fn chat_message(v: &Value) -> Option<ChatMessage> {
    if !v.is_object() {
        return None;
    }
    let files = v
        .get("files")
        .and_then(Value::as_array)
        .map(|files| files.iter().filter_map(file_ref).collect())
        .unwrap_or_default();
    Some(ChatMessage {
        author_name: non_empty_str(v.get("author_name")),
        text: non_empty_str(v.get("text")),
        files,
    })
}

/// A file needs a hash to be fetchable; the display name falls back to the hash.
fn file_ref(v: &Value) -> Option<FileRef> {
    let hash = non_empty_str(v.get("hash"))?;
    let name = non_empty_str(v.get("name")).unwrap_or_else(|| hash.clone());
    Some(FileRef { name, hash })
}

fn non_empty_str(v: Option<&Value>) -> Option<String> {
    v.and_then(Value::as_str)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}
