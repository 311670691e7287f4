//! WebSocket transport backed by `tokio-tungstenite`.
//!
//! Socket.IO servers accept a direct WebSocket upgrade on
//! `/socket.io/?EIO=4&transport=websocket`, skipping the long-polling
//! bootstrap. Each WebSocket text message carries exactly one Engine.IO
//! packet, which is what [`Transport`] expects. Use
//! [`ClientConfig::socket_endpoint`](crate::config::ClientConfig::socket_endpoint)
//! to derive that URL from the server origin.
//!
//! # Example
//!
//! ```rust,no_run
//! # async fn example() -> Result<(), party_game_client::PartyClientError> {
//! use party_game_client::{Transport, WebSocketTransport};
//!
//! let url = "ws://localhost:5000/socket.io/?EIO=4&transport=websocket";
//! let mut transport = WebSocketTransport::connect(url).await?;
//!
//! // The server greets with an Engine.IO OPEN packet.
//! if let Some(Ok(open)) = transport.recv().await {
//!     println!("handshake: {open}");
//! }
//!
//! transport.close().await?;
//! # Ok(())
//! # }
//! ```

use std::time::Duration;

use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use tokio_tungstenite::tungstenite::protocol::Message;

use crate::error::PartyClientError;
use crate::transport::Transport;

/// The underlying WebSocket stream type.
pub type WsStream =
    tokio_tungstenite::WebSocketStream<tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>>;

/// A [`Transport`] over a single WebSocket connection.
///
/// `recv` is cancel-safe: dropping its future before completion does not
/// lose a frame.
#[derive(Debug)]
pub struct WebSocketTransport {
    stream: WsStream,
    closed: bool,
}

impl WebSocketTransport {
    /// Open a WebSocket connection to `url` (`ws://` or `wss://`).
    ///
    /// # Errors
    ///
    /// Returns [`PartyClientError::Io`] if the URL is invalid or the
    /// connection cannot be established. The original I/O error kind is
    /// kept when there is one.
    pub async fn connect(url: &str) -> Result<Self, PartyClientError> {
        tracing::debug!(url = %url, "opening game socket");

        let (stream, _response) = tokio_tungstenite::connect_async(url).await.map_err(|e| {
            let kind = match &e {
                tokio_tungstenite::tungstenite::Error::Io(io) => io.kind(),
                _ => std::io::ErrorKind::Other,
            };
            PartyClientError::Io(std::io::Error::new(kind, e))
        })?;

        tracing::info!(url = %url, "game socket open");
        Ok(Self::from_stream(stream))
    }

    /// Like [`connect`](Self::connect), failing with
    /// [`PartyClientError::Timeout`] when `timeout` elapses first.
    ///
    /// # Errors
    ///
    /// [`PartyClientError::Timeout`] or anything `connect` returns.
    pub async fn connect_with_timeout(
        url: &str,
        timeout: Duration,
    ) -> Result<Self, PartyClientError> {
        tokio::time::timeout(timeout, Self::connect(url))
            .await
            .map_err(|_| PartyClientError::Timeout)?
    }

    /// Wrap an already-established stream (custom TLS, proxies, headers).
    pub fn from_stream(stream: WsStream) -> Self {
        Self {
            stream,
            closed: false,
        }
    }
}

#[async_trait]
impl Transport for WebSocketTransport {
    async fn send(&mut self, frame: String) -> Result<(), PartyClientError> {
        if self.closed {
            return Err(PartyClientError::TransportClosed);
        }
        self.stream
            .send(Message::Text(frame.into()))
            .await
            .map_err(|e| PartyClientError::TransportSend(e.to_string()))
    }

    async fn recv(&mut self) -> Option<Result<String, PartyClientError>> {
        loop {
            let msg = match self.stream.next().await {
                Some(Ok(msg)) => msg,
                Some(Err(e)) => {
                    return Some(Err(PartyClientError::TransportReceive(e.to_string())));
                }
                None => return None,
            };

            match msg {
                Message::Text(text) => return Some(Ok(text.to_string())),
                Message::Close(frame) => {
                    tracing::debug!(?frame, "game socket closed by server");
                    return None;
                }
                // Socket.IO binary attachments are never used by the game server.
                Message::Binary(bytes) => {
                    tracing::warn!(len = bytes.len(), "skipping binary frame");
                }
                Message::Ping(_) | Message::Pong(_) | Message::Frame(_) => {}
            }
        }
    }

    async fn close(&mut self) -> Result<(), PartyClientError> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;
        self.stream
            .close(None)
            .await
            .map_err(|e| PartyClientError::TransportSend(e.to_string()))
    }
}

#[cfg(test)]
#[allow(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::panic,
    clippy::todo,
    clippy::unimplemented,
    clippy::indexing_slicing
)]
mod tests {
    use super::*;
    use tokio::net::TcpListener;

    /// Accept one WebSocket connection on a random port and hand it to `handler`.
    async fn start_mock_server<F, Fut>(handler: F) -> String
    where
        F: FnOnce(tokio_tungstenite::WebSocketStream<tokio::net::TcpStream>) -> Fut
            + Send
            + 'static,
        Fut: std::future::Future<Output = ()> + Send,
    {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        tokio::spawn(async move {
            let (tcp, _) = listener.accept().await.unwrap();
            let ws = tokio_tungstenite::accept_async(tcp).await.unwrap();
            handler(ws).await;
        });

        format!("ws://{addr}/socket.io/?EIO=4&transport=websocket")
    }

    #[test]
    fn websocket_transport_is_send() {
        fn assert_send<T: Send>() {}
        assert_send::<WebSocketTransport>();
    }

    #[tokio::test]
    async fn connect_rejects_invalid_url() {
        let err = WebSocketTransport::connect("not-a-url").await.unwrap_err();
        assert!(matches!(err, PartyClientError::Io(_)));
    }

    #[tokio::test]
    async fn wss_urls_attempt_a_tls_handshake() {
        use tokio::io::AsyncWriteExt;

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let (mut tcp, _) = listener.accept().await.unwrap();
            let _ = tcp.write_all(b"HTTP/1.1 400 Bad Request\r\n\r\n").await;
        });

        let err = WebSocketTransport::connect(&format!(
            "wss://{addr}/socket.io/?EIO=4&transport=websocket"
        ))
        .await
        .unwrap_err();
        let detail = format!("{err:?}");
        assert!(matches!(err, PartyClientError::Io(_)));
        assert!(!detail.contains("TlsFeatureNotEnabled"), "got {detail}");
    }

    #[tokio::test]
    async fn connect_with_timeout_times_out() {
        let err = WebSocketTransport::connect_with_timeout(
            "ws://192.0.2.1:1",
            Duration::from_millis(50),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, PartyClientError::Timeout));
    }

    #[tokio::test]
    async fn recv_yields_engine_io_frames_in_order() {
        let url = start_mock_server(|mut ws| async move {
            ws.send(Message::Text(r#"0{"sid":"abc","pingInterval":25000}"#.into()))
                .await
                .unwrap();
            ws.send(Message::Text(r#"42["timer_update",{"time":9}]"#.into()))
                .await
                .unwrap();
            ws.close(None).await.unwrap();
        })
        .await;

        let mut transport = WebSocketTransport::connect(&url).await.unwrap();
        let open = transport.recv().await.unwrap().unwrap();
        assert!(open.starts_with('0'));
        let event = transport.recv().await.unwrap().unwrap();
        assert_eq!(event, r#"42["timer_update",{"time":9}]"#);
        assert!(transport.recv().await.is_none());
    }

    #[tokio::test]
    async fn recv_skips_binary_frames() {
        let url = start_mock_server(|mut ws| async move {
            ws.send(Message::Binary(vec![1, 2, 3].into())).await.unwrap();
            ws.send(Message::Text("2".into())).await.unwrap();
            ws.close(None).await.unwrap();
        })
        .await;

        let mut transport = WebSocketTransport::connect(&url).await.unwrap();
        assert_eq!(transport.recv().await.unwrap().unwrap(), "2");
    }

    #[tokio::test]
    async fn send_reaches_server() {
        let (tx, rx) = tokio::sync::oneshot::channel::<String>();
        let url = start_mock_server(|mut ws| async move {
            if let Some(Ok(Message::Text(text))) = ws.next().await {
                let _ = tx.send(text.to_string());
            }
        })
        .await;

        let mut transport = WebSocketTransport::connect(&url).await.unwrap();
        transport.send("40".to_string()).await.unwrap();
        assert_eq!(rx.await.unwrap(), "40");
    }

    #[tokio::test]
    async fn send_after_close_is_rejected_and_close_is_idempotent() {
        let url =
            start_mock_server(|mut ws| async move { while let Some(Ok(_)) = ws.next().await {} })
                .await;

        let mut transport = WebSocketTransport::connect(&url).await.unwrap();
        transport.close().await.unwrap();
        transport.close().await.unwrap();

        let err = transport.send("3".to_string()).await.unwrap_err();
        assert!(matches!(err, PartyClientError::TransportClosed));
    }
}
