//! Quip relay core library: connection supervision, frame routing, and the Quip,
//! Slack and WebSocket adapters used by the CLI.

pub mod channels;
pub mod config;
pub mod init;
pub mod quip;
pub mod relay;
pub mod transport;
