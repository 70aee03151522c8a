//! Connection supervisor: connect, run, fail, wait, reconnect.
//!
//! One connection epoch at a time. Each epoch owns a [`ConnectionHandle`] (send queue
//! plus heartbeat task). The handle is fully retired before the next connect attempt,
//! so at most one heartbeat task exists at any instant. Notifications go through a
//! [`NotificationQueue`]; the epoch loop never waits on the sink.

use crate::channels::NotificationSink;
use crate::quip::DocumentService;
use crate::relay::attachments::AttachmentResolver;
use crate::relay::classify::classify;
use crate::relay::dispatch::NotificationQueue;
use crate::relay::heartbeat::{HeartbeatEmitter, HeartbeatGauge};
use crate::relay::protocol::OutboundNotification;
use crate::relay::router::EventRouter;
use crate::transport::{Connection, Transport, TransportEvent};
use anyhow::Context;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio_util::sync::CancellationToken;

const SEND_QUEUE_CAPACITY: usize = 16;
const NOTIFICATION_QUEUE_CAPACITY: usize = 256;
/// How long pending notices get to reach the sink once shutdown starts.
const NOTIFICATION_DRAIN_GRACE: Duration = Duration::from_secs(5);

const ESTABLISHED_NOTICE: &str = "### connection established ###";

/// Lifecycle state, published on a watch channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
    Closing,
}

/// Explicit settings handed to the supervisor at construction.
#[derive(Debug, Clone)]
pub struct SupervisorSettings {
    pub heartbeat_interval: Duration,
    pub reconnect_delay: Duration,
    pub primary_channel: String,
    pub status_channel: String,
    pub blob_base_url: String,
}

/// How a connection epoch ended.
#[derive(Debug, Clone, PartialEq, Eq)]
enum EpochEnd {
    Closed { code: Option<u16>, reason: String },
    Failed(String),
    Shutdown,
}

/// One live transport session: its send queue and the heartbeat bound to it.
struct ConnectionHandle {
    epoch: u64,
    outbound: mpsc::Sender<String>,
    heartbeat: HeartbeatEmitter,
}

impl ConnectionHandle {
    /// Stop the heartbeat and drop the send queue. Returns once the heartbeat task is gone.
    async fn retire(self) {
        let exit = self.heartbeat.stop().await;
        drop(self.outbound);
        log::debug!("connection {} retired (heartbeat {:?})", self.epoch, exit);
    }
}

pub struct ConnectionSupervisor {
    documents: Arc<dyn DocumentService>,
    transport: Arc<dyn Transport>,
    sink: Arc<dyn NotificationSink>,
    router: EventRouter,
    settings: SupervisorSettings,
    state_tx: watch::Sender<ConnectionState>,
    heartbeats: HeartbeatGauge,
}

impl ConnectionSupervisor {
    pub fn new(
        documents: Arc<dyn DocumentService>,
        transport: Arc<dyn Transport>,
        sink: Arc<dyn NotificationSink>,
        settings: SupervisorSettings,
    ) -> Self {
        let router = EventRouter::new(
            settings.primary_channel.clone(),
            AttachmentResolver::new(settings.blob_base_url.clone()),
        );
        let (state_tx, _) = watch::channel(ConnectionState::Disconnected);
        Self {
            documents,
            transport,
            sink,
            router,
            settings,
            state_tx,
            heartbeats: HeartbeatGauge::default(),
        }
    }

    pub fn subscribe_state(&self) -> watch::Receiver<ConnectionState> {
        self.state_tx.subscribe()
    }

    pub fn state(&self) -> ConnectionState {
        *self.state_tx.borrow()
    }

    /// Number of live heartbeat tasks (0 or 1).
    pub fn active_heartbeats(&self) -> usize {
        self.heartbeats.active()
    }

    /// Run until `shutdown` is cancelled. Transport faults never end the loop.
    pub async fn run(&self, shutdown: CancellationToken) {
        let notifications =
            NotificationQueue::spawn(self.sink.clone(), NOTIFICATION_QUEUE_CAPACITY);
        let mut epoch: u64 = 0;
        loop {
            self.set_state(ConnectionState::Connecting);
            let attempt = tokio::select! {
                biased;

                () = shutdown.cancelled() => None,
                r = self.connect() => Some(r),
            };
            let Some(attempt) = attempt else { break };

            match attempt {
                Ok(connection) => {
                    epoch += 1;
                    let end = self
                        .run_connection(epoch, connection, &notifications, &shutdown)
                        .await;
                    self.post_status(&notifications, closed_notice(&end));
                    if end == EpochEnd::Shutdown {
                        break;
                    }
                }
                Err(e) => log::warn!("websocket connection error: {:#}", e),
            }

            self.set_state(ConnectionState::Disconnected);
            log::info!(
                "reconnecting websocket after {} sec",
                self.settings.reconnect_delay.as_secs_f32()
            );
            tokio::select! {
                biased;

                () = shutdown.cancelled() => break,
                () = tokio::time::sleep(self.settings.reconnect_delay) => {}
            }
        }

        self.set_state(ConnectionState::Closing);
        notifications.drain(NOTIFICATION_DRAIN_GRACE).await;
        self.set_state(ConnectionState::Disconnected);
        log::info!("relay supervisor stopped");
    }

    async fn connect(&self) -> anyhow::Result<Connection> {
        let endpoint = self
            .documents
            .new_session()
            .await
            .context("requesting websocket endpoint")?;
        log::debug!("opening websocket for user {:?}", endpoint.user_id);
        let connection = self
            .transport
            .open(&endpoint.url)
            .await
            .context("opening websocket")?;
        Ok(connection)
    }

    async fn run_connection(
        &self,
        epoch: u64,
        connection: Connection,
        notifications: &NotificationQueue,
        shutdown: &CancellationToken,
    ) -> EpochEnd {
        let Connection {
            mut sink,
            mut source,
        } = connection;
        let (outbound, mut outbound_rx) = mpsc::channel::<String>(SEND_QUEUE_CAPACITY);
        let heartbeat = HeartbeatEmitter::spawn(
            epoch,
            outbound.clone(),
            self.settings.heartbeat_interval,
            shutdown.child_token(),
            &self.heartbeats,
        );
        let handle = ConnectionHandle {
            epoch,
            outbound,
            heartbeat,
        };
        self.set_state(ConnectionState::Connected);
        log::info!("{}", ESTABLISHED_NOTICE);
        log::debug!("active heartbeat tasks: {}", self.heartbeats.active());
        self.post_status(notifications, ESTABLISHED_NOTICE.to_string());

        let end = loop {
            tokio::select! {
                biased;

                () = shutdown.cancelled() => break EpochEnd::Shutdown,
                Some(frame) = outbound_rx.recv() => {
                    if let Err(e) = sink.send(frame).await {
                        break EpochEnd::Failed(e.to_string());
                    }
                }
                event = source.next_event() => match event {
                    TransportEvent::Frame(text) => self.handle_frame(&text, notifications),
                    TransportEvent::Closed { code, reason } => break EpochEnd::Closed { code, reason },
                    TransportEvent::Error(e) => break EpochEnd::Failed(e),
                },
            }
        };

        self.set_state(ConnectionState::Closing);
        handle.retire().await;
        match &end {
            EpochEnd::Shutdown => {
                if let Err(e) = sink.close().await {
                    log::debug!("closing websocket on shutdown: {}", e);
                }
            }
            EpochEnd::Failed(e) => log::warn!("websocket connection error: {}", e),
            EpochEnd::Closed { .. } => {}
        }
        log::info!("{}", closed_notice(&end));
        end
    }

    fn handle_frame(&self, raw: &str, notifications: &NotificationQueue) {
        let event = classify(raw);
        let level = event.diagnostic_level();
        if log::log_enabled!(level) {
            log::log!(level, "{} frame:\n{}", event.kind(), event.diagnostic_text());
        }
        if let Some(notification) = self.router.route(&event) {
            log::info!("forwarding message to {}", notification.channel);
            notifications.enqueue(notification);
        }
    }

    fn post_status(&self, notifications: &NotificationQueue, text: String) {
        notifications.enqueue(OutboundNotification {
            text,
            attachments: Vec::new(),
            channel: self.settings.status_channel.clone(),
        });
    }

    fn set_state(&self, state: ConnectionState) {
        publish_state(&self.state_tx, state);
    }
}

/// Publish `state` only when it differs from the current one.
fn publish_state(tx: &watch::Sender<ConnectionState>, state: ConnectionState) {
    tx.send_if_modified(|current| {
        if *current == state {
            return false;
        }
        log::debug!("connection state {:?} -> {:?}", current, state);
        *current = state;
        true
    });
}

fn closed_notice(end: &EpochEnd) -> String {
    let (code, reason) = match end {
        EpochEnd::Closed { code, reason } if reason.is_empty() => (*code, "None"),
        EpochEnd::Closed { code, reason } => (*code, reason.as_str()),
        EpochEnd::Failed(e) => (None, e.as_str()),
        EpochEnd::Shutdown => (None, "shutdown"),
    };
    let code = code
        .map(|c| c.to_string())
        .unwrap_or_else(|| "None".to_string());
    format!(
        "### connection closed, status code is {}, msg is {} ###",
        code, reason
    )
}
