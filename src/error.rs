//! Error types for the party game client.

use thiserror::Error;

/// Errors that can occur inside the party game client.
///
/// Most public store operations swallow these and report a plain `bool`;
/// the error values still flow through the transport and API seams so they
/// can be logged with their cause.
#[derive(Debug, Error)]
pub enum PartyClientError {
    /// Failed to send a frame through the transport.
    #[error("transport send error: {0}")]
    TransportSend(String),

    /// Failed to receive a frame from the transport.
    #[error("transport receive error: {0}")]
    TransportReceive(String),

    /// The transport connection was closed.
    #[error("transport connection closed")]
    TransportClosed,

    /// Failed to serialize or deserialize JSON.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// A Socket.IO or Engine.IO frame could not be decoded.
    #[error("malformed frame: {0}")]
    Protocol(String),

    /// Attempted an operation that requires an active connection.
    #[error("not connected to server")]
    NotConnected,

    /// The operation requires an authenticated session.
    #[error("no authenticated session")]
    NotAuthenticated,

    /// The HTTP request could not be completed.
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    /// The backend answered with a non-success status.
    #[error("api error ({status}): {message}")]
    Api {
        /// HTTP status code returned by the backend.
        status: u16,
        /// The body's `error` field, or the status reason.
        message: String,
    },

    /// The persistence backend failed.
    #[error("storage error: {0}")]
    Storage(String),

    /// An operation timed out.
    #[error("operation timed out")]
    Timeout,

    /// An I/O error occurred.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// A specialized [`Result`] type for party game client operations.
pub type Result<T> = std::result::Result<T, PartyClientError>;
