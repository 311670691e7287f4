//! # Party Game Client
//!
//! Client-side state for a browser-style multiplayer party game: a
//! Socket.IO connection shim that mirrors live game state, plus the
//! session, player and game stores that sit next to it.
//!
//! ## Features
//!
//! - **Transport-agnostic** — implement the [`Transport`] trait for any backend
//! - **Socket.IO v5 framing** — Engine.IO v4 text frames, handshake and heartbeat
//! - **WebSocket built-in** — default `transport-websocket` feature provides `WebSocketTransport`
//! - **Mirrored state** — every server event lands in a [`GameMirror`] before callbacks run
//! - **Typed callbacks** — subscribe per [`EventName`], unsubscribe through the returned handle
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use party_game_client::{ClientConfig, EventName, GameEvent, GameSocket};
//!
//! let config = ClientConfig::from_env();
//! let mut socket = GameSocket::new(config.socket_config());
//! let _sub = socket.subscribe(EventName::TimerUpdate, |event| {
//!     if let GameEvent::TimerUpdate(timer) = event {
//!         println!("lobby closes in {}s", timer.time);
//!     }
//! });
//! socket.connect_websocket().await;
//! socket.request_timer();
//! ```

pub mod api;
pub mod bus;
pub mod client;
pub mod config;
pub mod error;
pub mod event;
pub mod game;
pub mod mirror;
pub mod player;
pub mod protocol;
pub mod session;
pub mod storage;
pub mod transport;
pub mod transports;

// Re-export primary types for ergonomic imports.
pub use api::{GameApi, HttpApi};
pub use bus::{EventBus, Subscription};
pub use client::{GameSocket, SocketConfig};
pub use config::ClientConfig;
pub use error::PartyClientError;
pub use event::{EventName, GameEvent};
pub use game::{GamePlayer, GameStore};
pub use mirror::GameMirror;
pub use player::{Player, PlayerStore};
pub use session::{
    IdentityProvider, Session, SessionStore, StoredSessionProvider, TelegramWebAppProvider,
};
pub use storage::{FileStorage, MemoryStorage, SharedStorage, Storage};
pub use transport::Transport;

#[cfg(feature = "transport-websocket")]
pub use transports::WebSocketTransport;
