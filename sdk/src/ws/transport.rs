//! Transport abstraction.
//!
//! The session loop talks to the network through [`Connector`] and
//! [`Transport`]. [`TungsteniteConnector`] is the production implementation;
//! tests substitute an in-memory one.

use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};
use tracing::debug;

use crate::error::SyncError;

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Something that happened on an open transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportEvent {
    /// A complete text frame.
    Frame(String),
    /// The connection closed. `code` is `None` when no close frame arrived.
    Closed {
        /// Close code.
        code: Option<u16>,
        /// Close reason.
        reason: String,
    },
    /// A transport-level error. A `Closed` event always follows.
    Error(String),
}

/// An open, bidirectional text transport.
#[async_trait]
pub trait Transport: Send {
    /// Writes one text frame.
    async fn send_text(&mut self, text: String) -> Result<(), SyncError>;

    /// Waits for the next event. Must be cancel safe.
    async fn next_event(&mut self) -> TransportEvent;

    /// Closes the transport with a close code.
    async fn close(&mut self, code: u16, reason: &str) -> Result<(), SyncError>;
}

/// Opens transports.
#[async_trait]
pub trait Connector: Send + Sync + 'static {
    /// Transport produced by this connector.
    type Transport: Transport + 'static;

    /// Opens a transport to `url`.
    async fn connect(&self, url: &str) -> Result<Self::Transport, SyncError>;
}

/// Connector backed by `tokio-tungstenite`.
#[derive(Debug, Clone, Copy, Default)]
pub struct TungsteniteConnector;

#[async_trait]
impl Connector for TungsteniteConnector {
    type Transport = TungsteniteTransport;

    async fn connect(&self, url: &str) -> Result<Self::Transport, SyncError> {
        let (stream, _) = tokio_tungstenite::connect_async(url)
            .await
            .map_err(|e| SyncError::Transport(e.to_string()))?;

        Ok(TungsteniteTransport {
            stream,
            failed: false,
        })
    }
}

/// WebSocket transport over `tokio-tungstenite`.
pub struct TungsteniteTransport {
    stream: WsStream,
    failed: bool,
}

#[async_trait]
impl Transport for TungsteniteTransport {
    async fn send_text(&mut self, text: String) -> Result<(), SyncError> {
        self.stream
            .send(Message::Text(text.into()))
            .await
            .map_err(|e| SyncError::Transport(e.to_string()))
    }

    async fn next_event(&mut self) -> TransportEvent {
        if self.failed {
            // The stream is unusable after an error; report the drop.
            return TransportEvent::Closed {
                code: None,
                reason: "transport failed".to_string(),
            };
        }

        loop {
            match self.stream.next().await {
                Some(Ok(Message::Text(text))) => {
                    return TransportEvent::Frame(text.as_str().to_owned());
                }
                Some(Ok(Message::Binary(bytes))) => {
                    return match String::from_utf8(bytes.to_vec()) {
                        Ok(text) => TransportEvent::Frame(text),
                        Err(e) => {
                            TransportEvent::Error(format!("binary frame is not utf-8: {}", e))
                        }
                    };
                }
                Some(Ok(Message::Close(frame))) => {
                    let (code, reason) = match frame {
                        Some(f) => (Some(u16::from(f.code)), f.reason.as_str().to_owned()),
                        None => (None, String::new()),
                    };
                    return TransportEvent::Closed { code, reason };
                }
                Some(Ok(other)) => {
                    debug!(kind = ?other, "ignoring control frame");
                }
                Some(Err(e)) => {
                    self.failed = true;
                    return TransportEvent::Error(e.to_string());
                }
                None => {
                    return TransportEvent::Closed {
                        code: None,
                        reason: String::new(),
                    };
                }
            }
        }
    }

    async fn close(&mut self, code: u16, reason: &str) -> Result<(), SyncError> {
        let frame = CloseFrame {
            code: CloseCode::from(code),
            reason: reason.to_string().into(),
        };
        self.stream
            .close(Some(frame))
            .await
            .map_err(|e| SyncError::Transport(e.to_string()))
    }
}

#[cfg(test)]
pub(crate) mod mock {
    //! In-memory connector for session tests.

    use std::collections::VecDeque;
    use std::sync::{Arc, Mutex};

    use async_trait::async_trait;
    use tokio::sync::mpsc;

    use super::{Connector, Transport, TransportEvent};
    use crate::error::SyncError;

    /// Test-side handle of one mock connection.
    pub(crate) struct MockLink {
        /// Push events into the client.
        pub(crate) inbound: mpsc::UnboundedSender<TransportEvent>,
        /// Frames the client wrote.
        pub(crate) sent: mpsc::UnboundedReceiver<String>,
        /// Close code the client used, if it closed.
        pub(crate) closed: Arc<Mutex<Option<u16>>>,
    }

    impl MockLink {
        pub(crate) fn push(&self, raw: &str) {
            let _ = self.inbound.send(TransportEvent::Frame(raw.to_string()));
        }

        pub(crate) fn drop_connection(&self, code: Option<u16>) {
            let _ = self.inbound.send(TransportEvent::Closed {
                code,
                reason: String::new(),
            });
        }

        pub(crate) fn close_code(&self) -> Option<u16> {
            *self.closed.lock().expect("lock")
        }
    }

    pub(crate) struct MockTransport {
        inbound: mpsc::UnboundedReceiver<TransportEvent>,
        sent: mpsc::UnboundedSender<String>,
        closed: Arc<Mutex<Option<u16>>>,
    }

    pub(crate) fn pair() -> (MockTransport, MockLink) {
        let (in_tx, in_rx) = mpsc::unbounded_channel();
        let (out_tx, out_rx) = mpsc::unbounded_channel();
        let closed = Arc::new(Mutex::new(None));
        (
            MockTransport {
                inbound: in_rx,
                sent: out_tx,
                closed: Arc::clone(&closed),
            },
            MockLink {
                inbound: in_tx,
                sent: out_rx,
                closed,
            },
        )
    }

    #[async_trait]
    impl Transport for MockTransport {
        async fn send_text(&mut self, text: String) -> Result<(), SyncError> {
            self.sent
                .send(text)
                .map_err(|e| SyncError::Transport(e.to_string()))
        }

        async fn next_event(&mut self) -> TransportEvent {
            match self.inbound.recv().await {
                Some(event) => event,
                None => std::future::pending().await,
            }
        }

        async fn close(&mut self, code: u16, _reason: &str) -> Result<(), SyncError> {
            *self.closed.lock().expect("lock") = Some(code);
            Ok(())
        }
    }

    /// Hands out queued transports; dials fail once the queue is empty.
    #[derive(Clone, Default)]
    pub(crate) struct MockConnector {
        queue: Arc<Mutex<VecDeque<MockTransport>>>,
        urls: Arc<Mutex<Vec<String>>>,
    }

    impl MockConnector {
        pub(crate) fn new() -> Self {
            Self::default()
        }

        /// Queues a transport for the next dial and returns its link.
        pub(crate) fn expect_dial(&self) -> MockLink {
            let (transport, link) = pair();
            self.queue.lock().expect("lock").push_back(transport);
            link
        }

        pub(crate) fn dialed(&self) -> Vec<String> {
            self.urls.lock().expect("lock").clone()
        }
    }

    #[async_trait]
    impl Connector for MockConnector {
        type Transport = MockTransport;

        async fn connect(&self, url: &str) -> Result<Self::Transport, SyncError> {
            self.urls.lock().expect("lock").push(url.to_string());
            self.queue
                .lock()
                .expect("lock")
                .pop_front()
                .ok_or_else(|| SyncError::Transport("connection refused".to_string()))
        }
    }
}

#[cfg(test)]
mod tests {
    use tokio::net::TcpListener;
    use tokio_tungstenite::accept_async;

    use super::*;

    async fn loopback() -> (TungsteniteTransport, WebSocketStream<TcpStream>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
        let url = format!("ws://{}", listener.local_addr().expect("addr"));

        let accept = tokio::spawn(async move {
            let (stream, _) = listener.accept().await.expect("accept");
            accept_async(stream).await.expect("handshake")
        });
        let client = TungsteniteConnector.connect(&url).await.expect("connect");
        let server = accept.await.expect("server task");
        (client, server)
    }

    async fn next_closed(client: &mut TungsteniteTransport) -> Option<u16> {
        loop {
            match client.next_event().await {
                TransportEvent::Closed { code, .. } => return code,
                TransportEvent::Error(_) => {}
                TransportEvent::Frame(frame) => panic!("unexpected frame {}", frame),
            }
        }
    }

    #[tokio::test]
    async fn test_text_frames_both_ways() {
        let (mut client, mut server) = loopback().await;

        server
            .send(Message::Text(r#"{"type":"pong"}"#.to_string().into()))
            .await
            .expect("server send");
        assert_eq!(
            client.next_event().await,
            TransportEvent::Frame(r#"{"type":"pong"}"#.to_string())
        );

        client
            .send_text(r#"{"type":"ping"}"#.to_string())
            .await
            .expect("client send");
        let received = server.next().await.expect("frame").expect("message");
        assert_eq!(received, Message::Text(r#"{"type":"ping"}"#.to_string().into()));
    }

    #[tokio::test]
    async fn test_server_close_frame_reports_code() {
        let (mut client, mut server) = loopback().await;

        let frame = CloseFrame {
            code: CloseCode::Normal,
            reason: "auction over".to_string().into(),
        };
        server.close(Some(frame)).await.expect("close");

        match client.next_event().await {
            TransportEvent::Closed { code, reason } => {
                assert_eq!(code, Some(1000));
                assert_eq!(reason, "auction over");
            }
            other => panic!("expected close, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_server_abnormal_close_reports_code() {
        let (mut client, mut server) = loopback().await;

        let frame = CloseFrame {
            code: CloseCode::Away,
            reason: "restarting".to_string().into(),
        };
        server.close(Some(frame)).await.expect("close");

        assert_eq!(next_closed(&mut client).await, Some(1001));
    }

    #[tokio::test]
    async fn test_dropped_tcp_reports_no_code() {
        let (mut client, server) = loopback().await;

        drop(server);

        assert_eq!(next_closed(&mut client).await, None);
        // The stream stays reported as closed afterwards.
        assert_eq!(next_closed(&mut client).await, None);
    }

    #[tokio::test]
    async fn test_client_close_sends_code() {
        let (mut client, mut server) = loopback().await;

        client.close(1000, "client disconnect").await.expect("close");

        match server.next().await {
            Some(Ok(Message::Close(Some(frame)))) => {
                assert_eq!(u16::from(frame.code), 1000);
                assert_eq!(frame.reason.as_str(), "client disconnect");
            }
            other => panic!("expected close frame, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_connect_refused() {
        let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
        let url = format!("ws://{}", listener.local_addr().expect("addr"));
        drop(listener);

        let result = TungsteniteConnector.connect(&url).await;
        assert!(matches!(result, Err(SyncError::Transport(_))));
    }
}
