//! Relay: keeps a Quip realtime connection alive and forwards chat messages to Slack.
//!
//! Frames flow `transport -> classify -> route -> sink`. The supervisor owns the
//! connection lifecycle and the per-connection heartbeat.

pub mod attachments;
pub mod classify;
mod dispatch;
pub mod heartbeat;
pub mod protocol;
pub mod router;
pub mod supervisor;

pub use attachments::AttachmentResolver;
pub use classify::classify;
pub use protocol::{ChatMessage, FileAttachment, FileRef, OutboundNotification, ThreadRef, TypedEvent};
pub use router::EventRouter;
pub use supervisor::{ConnectionState, ConnectionSupervisor, SupervisorSettings};

use crate::channels::SlackSink;
use crate::config::{self, Config};
use crate::quip::QuipClient;
use crate::transport::WsTransport;
use anyhow::{Context, Result};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

impl SupervisorSettings {
    /// Build from a config that has already passed [`Config::validate`].
    pub fn from_config(config: &Config) -> Result<Self> {
        Ok(Self {
            heartbeat_interval: config.relay.heartbeat_interval(),
            reconnect_delay: config.relay.reconnect_delay(),
            primary_channel: config.primary_channel().context("slack.channel is not set")?,
            status_channel: config
                .status_channel()
                .context("slack.statusChannel is not set")?,
            blob_base_url: config.relay.blob_base_url.clone(),
        })
    }
}

/// Build the Slack sink from config (token from env or file).
pub fn slack_sink(config: &Config) -> Result<SlackSink> {
    let token = config::resolve_slack_token(config)
        .context("slack.oauthAccessToken (or SLACK_BOT_TOKEN) is not set")?;
    Ok(SlackSink::new(token, Some(config.slack.api_base.clone())))
}

/// Run the relay until SIGINT/SIGTERM. Validates config first; after that nothing is fatal.
pub async fn run_relay(config: Config) -> Result<()> {
    config.validate()?;
    let quip_token = config::resolve_quip_token(&config)
        .context("quip.accessToken (or QUIP_ACCESS_TOKEN) is not set")?;
    let documents = Arc::new(QuipClient::new(quip_token, Some(config.quip.base_url.clone())));
    let sink = Arc::new(slack_sink(&config)?);
    let settings = SupervisorSettings::from_config(&config)?;
    log::info!(
        "relaying to {} (status {}), heartbeat every {}s, reconnect delay {}s",
        settings.primary_channel,
        settings.status_channel,
        settings.heartbeat_interval.as_secs(),
        settings.reconnect_delay.as_secs()
    );

    let supervisor = ConnectionSupervisor::new(documents, Arc::new(WsTransport::new()), sink, settings);
    let shutdown = CancellationToken::new();
    tokio::spawn(shutdown_signal(shutdown.clone()));
    supervisor.run(shutdown).await;
    log::info!("relay stopped");
    Ok(())
}

/// Cancels `shutdown` on SIGINT or SIGTERM.
async fn shutdown_signal(shutdown: CancellationToken) {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            log::error!("failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                log::error!("failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    log::info!("shutdown signal received, closing connection");
    shutdown.cancel();
}
