//! Keep-alive emitter bound to one connection.
//!
//! The emitter never touches the transport. It pushes keep-alive frames into the
//! connection's send queue, and the supervisor is the only writer. Its lifetime is tied
//! to a [`CancellationToken`]: dropping or stopping the emitter cancels it, and
//! [`HeartbeatEmitter::stop`] waits for the task to finish.

use crate::relay::protocol::KeepAliveFrame;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tokio::task::JoinHandle;
use tokio::time::{self, Instant, MissedTickBehavior};
use tokio_util::sync::{CancellationToken, DropGuard};

/// Why a heartbeat task ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HeartbeatExit {
    /// Stopped by its owner.
    Cancelled,
    /// The bound connection's send queue was closed.
    ConnectionGone,
}

/// Count of heartbeat tasks currently alive.
#[derive(Debug, Clone, Default)]
pub struct HeartbeatGauge(Arc<AtomicUsize>);

impl HeartbeatGauge {
    pub fn active(&self) -> usize {
        self.0.load(Ordering::SeqCst)
    }

    fn enter(&self) -> GaugeGuard {
        self.0.fetch_add(1, Ordering::SeqCst);
        GaugeGuard(self.0.clone())
    }
}

struct GaugeGuard(Arc<AtomicUsize>);

impl Drop for GaugeGuard {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

/// Running heartbeat task for one connection epoch.
pub struct HeartbeatEmitter {
    epoch: u64,
    cancel: CancellationToken,
    join: JoinHandle<HeartbeatExit>,
    _guard: DropGuard,
}

impl HeartbeatEmitter {
    /// Start emitting every `interval` (first beat one interval from now) into `outbound`.
    pub fn spawn(
        epoch: u64,
        outbound: mpsc::Sender<String>,
        interval: Duration,
        cancel: CancellationToken,
        gauge: &HeartbeatGauge,
    ) -> Self {
        let guard = gauge.enter();
        let task_cancel = cancel.clone();
        let join = tokio::spawn(async move {
            let _guard = guard;
            run_heartbeat(epoch, outbound, interval, task_cancel).await
        });
        Self {
            epoch,
            _guard: cancel.clone().drop_guard(),
            cancel,
            join,
        }
    }

    /// Cancel and wait for the task to finish; the timer is released on return.
    pub async fn stop(mut self) -> HeartbeatExit {
        self.cancel.cancel();
        match (&mut self.join).await {
            Ok(exit) => exit,
            Err(e) => {
                log::warn!("heartbeat task for connection {} ended abnormally: {}", self.epoch, e);
                HeartbeatExit::Cancelled
            }
        }
    }
}

async fn run_heartbeat(
    epoch: u64,
    outbound: mpsc::Sender<String>,
    interval: Duration,
    cancel: CancellationToken,
) -> HeartbeatExit {
    let mut ticker = time::interval_at(Instant::now() + interval, interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let frame = KeepAliveFrame::default().to_text();
    log::debug!("heartbeat started for connection {}", epoch);

    let exit = loop {
        tokio::select! {
            biased;

            () = cancel.cancelled() => break HeartbeatExit::Cancelled,
            _ = ticker.tick() => {
                match outbound.try_send(frame.clone()) {
                    Ok(()) => log::debug!("heartbeat queued for connection {}", epoch),
                    // Keep-alive is best-effort; a backed-up queue means the writer is busy.
                    Err(TrySendError::Full(_)) => {
                        log::debug!("send queue full, skipping heartbeat for connection {}", epoch);
                    }
                    Err(TrySendError::Closed(_)) => break HeartbeatExit::ConnectionGone,
                }
            }
        }
    };
    log::debug!("heartbeat stopped for connection {}: {:?}", epoch, exit);
    exit
}
