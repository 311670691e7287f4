//! Transport abstraction for the game's real-time feed.
//!
//! The [`Transport`] trait is a bidirectional channel of text frames. The
//! game server speaks Socket.IO over Engine.IO, and every Engine.IO packet
//! travels as one text frame, so implementations only need to deliver
//! whole frames (WebSocket messages, channel items, test scripts).
//!
//! # Connection Setup
//!
//! Connection setup is not part of this trait. Open the transport
//! externally, then hand it to [`GameSocket::connect`](crate::GameSocket::connect).
//! With the default `transport-websocket` feature,
//! [`GameSocket::connect_websocket`](crate::GameSocket::connect_websocket)
//! does both steps against the configured endpoint.
//!
//! # Implementing a Custom Transport
//!
//! ```rust,no_run
//! use async_trait::async_trait;
//! use party_game_client::error::PartyClientError;
//! use party_game_client::transport::Transport;
//!
//! struct MyTransport { /* ... */ }
//!
//! #[async_trait]
//! impl Transport for MyTransport {
//!     async fn send(&mut self, frame: String) -> Result<(), PartyClientError> {
//!         todo!()
//!     }
//!
//!     async fn recv(&mut self) -> Option<Result<String, PartyClientError>> {
//!         // Return None when the connection is closed cleanly
//!         todo!()
//!     }
//!
//!     async fn close(&mut self) -> Result<(), PartyClientError> {
//!         todo!()
//!     }
//! }
//! ```

use async_trait::async_trait;

use crate::error::PartyClientError;

/// A bidirectional text frame transport.
///
/// Each call to [`send`](Transport::send) transmits one complete Engine.IO
/// packet; each call to [`recv`](Transport::recv) yields one.
///
/// # Cancel Safety
///
/// [`recv`](Transport::recv) **MUST** be cancel-safe because the socket
/// loop polls it inside `tokio::select!`. Channel-backed implementations
/// are naturally cancel-safe.
#[async_trait]
pub trait Transport: Send + 'static {
    /// Send one text frame to the server.
    ///
    /// # Errors
    ///
    /// Returns [`PartyClientError::TransportSend`] if the frame could not be
    /// written, or [`PartyClientError::TransportClosed`] after `close`.
    async fn send(&mut self, frame: String) -> Result<(), PartyClientError>;

    /// Receive the next text frame from the server.
    ///
    /// Returns:
    /// - `Some(Ok(text))` when a frame arrived
    /// - `Some(Err(e))` on a transport failure
    /// - `None` when the server closed the connection cleanly
    async fn recv(&mut self) -> Option<Result<String, PartyClientError>>;

    /// Close the connection gracefully.
    ///
    /// # Errors
    ///
    /// Returns an error if the close handshake fails. Implementations should
    /// release their resources regardless.
    async fn close(&mut self) -> Result<(), PartyClientError>;
}
