//! Notification channels (e.g. Slack).
//!
//! The relay hands finished notifications to a [`NotificationSink`]; the Slack sink
//! posts them with chat.postMessage.

mod sink;
mod slack;

pub use sink::{NotificationSink, SinkError};
pub use slack::{SlackError, SlackSink};
