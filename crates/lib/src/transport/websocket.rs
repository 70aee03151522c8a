//! WebSocket transport (tokio-tungstenite).

use crate::transport::{Connection, FrameSink, FrameSource, Transport, TransportError, TransportEvent};
use async_trait::async_trait;
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Opens `ws://` / `wss://` connections.
#[derive(Debug, Clone, Default)]
pub struct WsTransport;

impl WsTransport {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Transport for WsTransport {
    async fn open(&self, endpoint: &str) -> Result<Connection, TransportError> {
        let (ws, _) = tokio_tungstenite::connect_async(endpoint)
            .await
            .map_err(|e| TransportError::Connect(e.to_string()))?;
        let (sink, stream) = ws.split();
        Ok(Connection {
            sink: Box::new(WsSink { inner: sink }),
            source: Box::new(WsSource { inner: stream }),
        })
    }
}

struct WsSink {
    inner: SplitSink<WsStream, Message>,
}

#[async_trait]
impl FrameSink for WsSink {
    async fn send(&mut self, text: String) -> Result<(), TransportError> {
        self.inner
            .send(Message::Text(text))
            .await
            .map_err(|e| TransportError::Send(e.to_string()))
    }

    async fn close(&mut self) -> Result<(), TransportError> {
        self.inner
            .close()
            .await
            .map_err(|e| TransportError::Send(e.to_string()))
    }
}

struct WsSource {
    inner: SplitStream<WsStream>,
}

#[async_trait]
impl FrameSource for WsSource {
    async fn next_event(&mut self) -> TransportEvent {
        loop {
            let Some(msg) = self.inner.next().await else {
                return TransportEvent::Closed {
                    code: None,
                    reason: String::new(),
                };
            };
            match msg {
                Ok(Message::Text(text)) => return TransportEvent::Frame(text),
                Ok(Message::Binary(bytes)) => {
                    return TransportEvent::Frame(String::from_utf8_lossy(&bytes).into_owned())
                }
                Ok(Message::Close(frame)) => {
                    let (code, reason) = frame
                        .map(|f| (Some(u16::from(f.code)), f.reason.into_owned()))
                        .unwrap_or((None, String::new()));
                    return TransportEvent::Closed { code, reason };
                }
                // Pongs are queued by tungstenite itself.
                Ok(Message::Ping(_)) | Ok(Message::Pong(_)) | Ok(Message::Frame(_)) => continue,
                Err(e) => return TransportEvent::Error(e.to_string()),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::net::TcpListener;
    use tokio::task::JoinHandle;
    use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
    use tokio_tungstenite::tungstenite::protocol::CloseFrame;

    /// Accept one client, send `script`, then collect what the client sends until it goes away.
    async fn serve(script: Vec<Message>, hang_up: bool) -> (String, JoinHandle<Vec<Message>>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let url = format!("ws://{}", listener.local_addr().unwrap());
        let server = tokio::spawn(async move {
            let (tcp, _) = listener.accept().await.unwrap();
            let mut ws = tokio_tungstenite::accept_async(tcp).await.unwrap();
            let mut received = Vec::new();
            if hang_up {
                // Wait for one client frame, reply, then drop the socket without a close handshake.
                if let Some(Ok(msg)) = ws.next().await {
                    received.push(msg);
                }
                for msg in script {
                    ws.send(msg).await.unwrap();
                }
                return received;
            }
            for msg in script {
                ws.send(msg).await.unwrap();
            }
            while let Some(Ok(msg)) = ws.next().await {
                received.push(msg);
            }
            received
        });
        (url, server)
    }

    #[tokio::test]
    async fn control_frames_skipped_and_close_reported() {
        let (url, server) = serve(
            vec![
                Message::Ping(vec![1]),
                Message::Text("hello".into()),
                Message::Binary(vec![0xff, b'a']),
                Message::Close(Some(CloseFrame {
                    code: CloseCode::Away,
                    reason: "bye".into(),
                })),
            ],
            false,
        )
        .await;

        let Connection { sink, mut source } = WsTransport::new().open(&url).await.unwrap();
        assert_eq!(source.next_event().await, TransportEvent::Frame("hello".into()));
        assert_eq!(
            source.next_event().await,
            TransportEvent::Frame("\u{FFFD}a".into())
        );
        assert_eq!(
            source.next_event().await,
            TransportEvent::Closed {
                code: Some(1001),
                reason: "bye".into()
            }
        );
        // Once the handshake completes the stream ends.
        assert_eq!(
            source.next_event().await,
            TransportEvent::Closed {
                code: None,
                reason: String::new()
            }
        );
        drop((sink, source));

        let received = server.await.unwrap();
        assert!(received
            .iter()
            .any(|m| matches!(m, Message::Pong(p) if p == &vec![1u8])));
    }

    #[tokio::test]
    async fn sends_text_and_reports_reset_as_error() {
        let (url, server) = serve(vec![Message::Text("x".into())], true).await;

        let Connection {
            mut sink,
            mut source,
        } = WsTransport::new().open(&url).await.unwrap();
        sink.send(r#"{"type":"heartbeat"}"#.to_string()).await.unwrap();
        assert_eq!(source.next_event().await, TransportEvent::Frame("x".into()));

        let received = server.await.unwrap();
        assert_eq!(received, vec![Message::Text(r#"{"type":"heartbeat"}"#.into())]);
        assert!(matches!(source.next_event().await, TransportEvent::Error(_)));
    }

    #[tokio::test]
    async fn unreachable_endpoint_is_connect_error() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let url = format!("ws://{}", listener.local_addr().unwrap());
        drop(listener);

        let err = WsTransport::new().open(&url).await.err().unwrap();
        assert!(matches!(err, TransportError::Connect(_)));
    }
}
