//! Ordered notification delivery off the receive loop.
//!
//! The supervisor enqueues and never awaits the sink, so a slow or stalled Slack
//! cannot hold up keep-alives, frame reads or shutdown. One task posts notifications
//! in enqueue order.

use crate::channels::NotificationSink;
use crate::relay::protocol::OutboundNotification;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tokio::task::JoinHandle;
use tokio_util::sync::{CancellationToken, DropGuard};

pub(crate) struct NotificationQueue {
    tx: mpsc::Sender<OutboundNotification>,
    abort: CancellationToken,
    join: JoinHandle<()>,
    _guard: DropGuard,
}

impl NotificationQueue {
    pub(crate) fn spawn(sink: Arc<dyn NotificationSink>, capacity: usize) -> Self {
        let (tx, rx) = mpsc::channel(capacity);
        let abort = CancellationToken::new();
        let join = tokio::spawn(deliver(sink, rx, abort.clone()));
        Self {
            tx,
            _guard: abort.clone().drop_guard(),
            abort,
            join,
        }
    }

    /// Queue a notification without waiting. Dropped (and logged) when the queue is full.
    pub(crate) fn enqueue(&self, notification: OutboundNotification) {
        match self.tx.try_send(notification) {
            Ok(()) => {}
            Err(TrySendError::Full(n)) => {
                log::warn!("notification queue full, dropping message to {}", n.channel);
            }
            Err(TrySendError::Closed(n)) => {
                log::warn!("notification queue closed, dropping message to {}", n.channel);
            }
        }
    }

    /// Close the queue and let pending posts finish for up to `grace`; abandon the rest.
    pub(crate) async fn drain(self, grace: Duration) {
        let NotificationQueue {
            tx,
            abort,
            mut join,
            _guard,
        } = self;
        drop(tx);
        let res = match tokio::time::timeout(grace, &mut join).await {
            Ok(res) => res,
            Err(_) => {
                log::warn!(
                    "notifications still pending after {}s, abandoning them",
                    grace.as_secs_f32()
                );
                abort.cancel();
                join.await
            }
        };
        if let Err(e) = res {
            log::warn!("notification task ended abnormally: {}", e);
        }
    }
}

async fn deliver(
    sink: Arc<dyn NotificationSink>,
    mut rx: mpsc::Receiver<OutboundNotification>,
    abort: CancellationToken,
) {
    loop {
        let notification = tokio::select! {
            biased;

            () = abort.cancelled() => break,
            n = rx.recv() => match n {
                Some(n) => n,
                None => break,
            },
        };
        tokio::select! {
            biased;

            () = abort.cancelled() => break,
            r = sink.post(&notification.text, &notification.channel, &notification.attachments) => {
                if let Err(e) = r {
                    log::error!("error sending message to {}: {}", notification.channel, e);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channels::SinkError;
    use crate::relay::protocol::FileAttachment;
    use async_trait::async_trait;
    use std::sync::Mutex;

    #[derive(Default)]
    struct Recording {
        texts: Mutex<Vec<String>>,
        stall_on: Option<&'static str>,
    }

    #[async_trait]
    impl NotificationSink for Recording {
        async fn post(
            &self,
            text: &str,
            _channel: &str,
            _attachments: &[FileAttachment],
        ) -> Result<(), SinkError> {
            if self.stall_on == Some(text) {
                std::future::pending::<()>().await;
            }
            self.texts.lock().unwrap().push(text.to_string());
            Ok(())
        }
    }

    fn note(text: &str) -> OutboundNotification {
        OutboundNotification {
            text: text.to_string(),
            attachments: Vec::new(),
            channel: "#general".to_string(),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn delivers_in_order_before_drain_returns() {
        let sink = Arc::new(Recording::default());
        let queue = NotificationQueue::spawn(sink.clone(), 8);
        for text in ["one", "two", "three"] {
            queue.enqueue(note(text));
        }
        queue.drain(Duration::from_secs(5)).await;
        assert_eq!(*sink.texts.lock().unwrap(), vec!["one", "two", "three"]);
    }

    #[tokio::test(start_paused = true)]
    async fn stalled_post_is_abandoned_after_grace() {
        let sink = Arc::new(Recording {
            stall_on: Some("two"),
            ..Recording::default()
        });
        let queue = NotificationQueue::spawn(sink.clone(), 8);
        for text in ["one", "two", "three"] {
            queue.enqueue(note(text));
        }
        let started = tokio::time::Instant::now();
        queue.drain(Duration::from_secs(5)).await;
        assert!(started.elapsed() >= Duration::from_secs(5));
        assert!(started.elapsed() < Duration::from_secs(6));
        assert_eq!(*sink.texts.lock().unwrap(), vec!["one"]);
    }

    #[tokio::test(start_paused = true)]
    async fn full_queue_drops_without_blocking() {
        let sink = Arc::new(Recording {
            stall_on: Some("one"),
            ..Recording::default()
        });
        let queue = NotificationQueue::spawn(sink.clone(), 1);
        queue.enqueue(note("one"));
        tokio::task::yield_now().await;
        queue.enqueue(note("two"));
        queue.enqueue(note("three"));
        queue.drain(Duration::from_secs(1)).await;
        assert!(sink.texts.lock().unwrap().is_empty());
    }
}
