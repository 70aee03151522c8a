//! Event routing: decide whether a typed event becomes an outbound notification.
//!
//! Routing is pure. Diagnostic logging of the event is left to the caller, which can
//! use [`TypedEvent::diagnostic_level`] to pick a severity.

use crate::relay::attachments::AttachmentResolver;
use crate::relay::protocol::{ChatMessage, OutboundNotification, ThreadRef, TypedEvent};

/// Turns qualifying chat messages into notifications for the primary channel.
#[derive(Debug, Clone)]
pub struct EventRouter {
    primary_channel: String,
    resolver: AttachmentResolver,
}

impl EventRouter {
    pub fn new(primary_channel: impl Into<String>, resolver: AttachmentResolver) -> Self {
        Self {
            primary_channel: primary_channel.into(),
            resolver,
        }
    }

    pub fn route(&self, event: &TypedEvent) -> Option<OutboundNotification> {
        match event {
            TypedEvent::Message {
                message: Some(message),
                thread,
                ..
            } => self.route_message(message, thread.as_ref()),
            TypedEvent::Message { message: None, .. }
            | TypedEvent::Alive(_)
            | TypedEvent::Heartbeat(_)
            | TypedEvent::Unclassified(_)
            | TypedEvent::Unparseable(_) => None,
        }
    }

    fn route_message(
        &self,
        message: &ChatMessage,
        thread: Option<&ThreadRef>,
    ) -> Option<OutboundNotification> {
        let author = message.author_name.as_deref()?;
        if message.text.is_none() && message.files.is_empty() {
            return None;
        }
        let text = format!("{}: {}", author, message.text.as_deref().unwrap_or(""));
        // Without a thread there is nothing to scope the blob URL to; send text only.
        let attachments = match thread {
            Some(thread) if !message.files.is_empty() => {
                self.resolver.resolve(&thread.id, &message.files)
            }
            _ => Vec::new(),
        };
        Some(OutboundNotification {
            text,
            attachments,
            channel: self.primary_channel.clone(),
        })
    }
}
