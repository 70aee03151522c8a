//! Streaming transport to the document service.
//!
//! A connection is split into a write half ([`FrameSink`]) and a read half
//! ([`FrameSource`]) so the supervisor can wait for inbound frames while it
//! drains its own send queue.

mod websocket;

pub use websocket::WsTransport;

use async_trait::async_trait;

#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("connect failed: {0}")]
    Connect(String),
    #[error("send failed: {0}")]
    Send(String),
}

/// What the read half produced next.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportEvent {
    /// One text frame, in receipt order.
    Frame(String),
    /// Orderly close (or end of stream) with the peer's status code and reason, if any.
    Closed { code: Option<u16>, reason: String },
    /// Mid-stream fault; the connection is unusable afterwards.
    Error(String),
}

/// Write half of a live connection.
#[async_trait]
pub trait FrameSink: Send {
    async fn send(&mut self, text: String) -> Result<(), TransportError>;
    /// Best-effort close; errors are ignored by callers.
    async fn close(&mut self) -> Result<(), TransportError>;
}

/// Read half of a live connection.
#[async_trait]
pub trait FrameSource: Send {
    /// Suspends until a frame arrives, the connection closes, or it fails.
    async fn next_event(&mut self) -> TransportEvent;
}

/// One open transport session.
pub struct Connection {
    pub sink: Box<dyn FrameSink>,
    pub source: Box<dyn FrameSource>,
}

/// Opens streaming connections to an endpoint URL.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn open(&self, endpoint: &str) -> Result<Connection, TransportError>;
}
