//! Real-time connection to the game server.
//!
//! [`GameSocket`] owns at most one Socket.IO connection. Each connection is
//! a background task that multiplexes outgoing frames, a shutdown signal
//! and incoming frames with `tokio::select!`. Incoming server events are
//! folded into the shared [`GameMirror`] first and then fanned out to the
//! callbacks registered on the [`EventBus`], in registration order.
//!
//! # Example
//!
//! ```rust,ignore
//! let config = ClientConfig::from_env();
//! let mut socket = GameSocket::new(config.socket_config());
//!
//! let _sub = socket.subscribe(EventName::GameFinished, |event| {
//!     if let GameEvent::GameFinished(finished) = event {
//!         println!("winner: {:?}", finished.winner_id);
//!     }
//! });
//!
//! socket.connect_websocket().await;
//! socket.join_lobby("u-42", "main");
//! ```

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use serde_json::{json, Value};
use tokio::sync::{mpsc, oneshot, RwLock};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::bus::{EventBus, Subscription};
use crate::error::Result;
use crate::event::{error_message, EventName, GameEvent, GameFinishedPayload};
use crate::mirror::GameMirror;
use crate::protocol::{self, EnginePacket, SocketPacket};
use crate::transport::Transport;

/// Default time allowed for opening the WebSocket.
const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Default time allowed for a graceful disconnect.
const DEFAULT_SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(1);

/// Disconnect reasons, worded as Socket.IO clients report them.
const CLIENT_DISCONNECT: &str = "io client disconnect";
const SERVER_DISCONNECT: &str = "io server disconnect";
const TRANSPORT_CLOSE: &str = "transport close";

// ── Configuration ───────────────────────────────────────────────────

/// Settings for a [`GameSocket`].
///
/// # Example
///
/// ```
/// use party_game_client::client::SocketConfig;
/// use std::time::Duration;
///
/// let config = SocketConfig::new("ws://localhost:5000/socket.io/?EIO=4&transport=websocket")
///     .with_shutdown_timeout(Duration::from_millis(250));
/// assert_eq!(config.connect_timeout, Duration::from_secs(10));
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SocketConfig {
    /// Socket.IO WebSocket endpoint used by
    /// [`connect_websocket`](GameSocket::connect_websocket).
    pub url: String,
    /// Deadline for opening the WebSocket. Defaults to **10 seconds**.
    pub connect_timeout: Duration,
    /// Deadline for a graceful [`disconnect`](GameSocket::disconnect), after
    /// which the connection task is aborted. Defaults to **1 second**.
    pub shutdown_timeout: Duration,
}

impl SocketConfig {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            shutdown_timeout: DEFAULT_SHUTDOWN_TIMEOUT,
        }
    }

    #[must_use]
    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    #[must_use]
    pub fn with_shutdown_timeout(mut self, timeout: Duration) -> Self {
        self.shutdown_timeout = timeout;
        self
    }
}

// ── Shared state ────────────────────────────────────────────────────

/// Mirror and callbacks, shared by the handle and every connection task.
struct SocketState {
    mirror: Arc<RwLock<GameMirror>>,
    bus: Arc<EventBus>,
}

impl SocketState {
    /// Update the mirror, then run the callbacks for the event.
    async fn dispatch(&self, event: GameEvent) {
        self.mirror.write().await.apply(&event);
        let invoked = self.bus.publish(&event);
        debug!(event = %event.name(), invoked, "event dispatched");

        // A result also finishes the game for `GameFinished` listeners.
        if let GameEvent::GameResult(result) = &event {
            self.bus
                .publish(&GameEvent::GameFinished(GameFinishedPayload::from(result)));
        }
    }
}

/// The single live connection.
struct Connection {
    id: Uuid,
    connected: Arc<AtomicBool>,
    frame_tx: mpsc::UnboundedSender<String>,
    task: tokio::task::JoinHandle<()>,
    shutdown_tx: Option<oneshot::Sender<()>>,
}

// ── Socket handle ───────────────────────────────────────────────────

/// Connection shim for the game's Socket.IO feed.
///
/// Holds one connection at a time, the [`GameMirror`] it feeds and the
/// callback registry. Callbacks registered with
/// [`subscribe`](Self::subscribe) survive reconnects.
pub struct GameSocket {
    config: SocketConfig,
    state: Arc<SocketState>,
    connection: Option<Connection>,
}

impl GameSocket {
    pub fn new(config: SocketConfig) -> Self {
        Self {
            config,
            state: Arc::new(SocketState {
                mirror: Arc::new(RwLock::new(GameMirror::default())),
                bus: EventBus::new(),
            }),
            connection: None,
        }
    }

    /// Start a connection over an already-open transport.
    ///
    /// Does nothing and returns `false` while a connection is established.
    /// Otherwise any previous connection handle is discarded (its task is
    /// aborted without draining) and a new connection task is spawned.
    /// The connected flag turns on once the server acknowledges the
    /// Socket.IO handshake.
    pub fn connect(&mut self, transport: impl Transport) -> bool {
        if self.is_connected() {
            debug!("already connected, ignoring connect");
            return false;
        }
        if let Some(stale) = self.connection.take() {
            debug!(connection = %stale.id, "discarding previous connection");
            stale.task.abort();
        }

        let id = Uuid::new_v4();
        let connected = Arc::new(AtomicBool::new(false));
        let (frame_tx, frame_rx) = mpsc::unbounded_channel::<String>();
        let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();

        let task = tokio::spawn(connection_loop(
            id,
            transport,
            frame_rx,
            Arc::clone(&self.state),
            Arc::clone(&connected),
            shutdown_rx,
        ));

        self.connection = Some(Connection {
            id,
            connected,
            frame_tx,
            task,
            shutdown_tx: Some(shutdown_tx),
        });
        info!(connection = %id, "socket connection started");
        true
    }

    /// Open a WebSocket to the configured endpoint and [`connect`](Self::connect).
    ///
    /// A failure to open the socket is reported to
    /// [`EventName::ConnectError`] subscribers and returns `false`.
    #[cfg(feature = "transport-websocket")]
    pub async fn connect_websocket(&mut self) -> bool {
        if self.is_connected() {
            debug!("already connected, ignoring connect");
            return false;
        }
        let opened = crate::transports::WebSocketTransport::connect_with_timeout(
            &self.config.url,
            self.config.connect_timeout,
        )
        .await;
        match opened {
            Ok(transport) => self.connect(transport),
            Err(e) => {
                warn!(url = %self.config.url, "could not open game socket: {e}");
                self.state
                    .dispatch(GameEvent::ConnectError {
                        message: e.to_string(),
                    })
                    .await;
                false
            }
        }
    }

    /// Tear the connection down and reset the connected flag.
    ///
    /// Sends the Socket.IO disconnect packet and closes the transport,
    /// waiting at most the configured shutdown timeout before aborting the
    /// connection task. Subscribers of [`EventName::Disconnect`] are told
    /// when the connection had been established.
    pub async fn disconnect(&mut self) {
        let Some(mut connection) = self.connection.take() else {
            return;
        };
        debug!(connection = %connection.id, "disconnect requested");

        if let Some(tx) = connection.shutdown_tx.take() {
            let _ = tx.send(());
        }

        match tokio::time::timeout(self.config.shutdown_timeout, &mut connection.task).await {
            Ok(Ok(())) => {}
            Ok(Err(join_err)) => {
                warn!("connection task ended with join error: {join_err}");
            }
            Err(_) => {
                warn!("connection task did not stop in time; aborting");
                connection.task.abort();
                if let Err(join_err) = connection.task.await {
                    debug!("connection task aborted: {join_err}");
                }
            }
        }

        // Still set only when the task was aborted before it could report.
        if connection.connected.swap(false, Ordering::AcqRel) {
            self.state
                .dispatch(GameEvent::Disconnected {
                    reason: Some(CLIENT_DISCONNECT.to_string()),
                })
                .await;
        }
    }

    /// Send an event to the server.
    ///
    /// While disconnected the event is dropped without touching the
    /// transport and `false` is returned. Nothing is queued for later.
    pub fn emit(&self, name: &str, payload: Option<Value>) -> bool {
        let Some(connection) = self.live_connection() else {
            debug!(event = name, "not connected, dropping emit");
            return false;
        };
        let frame = match EnginePacket::event(name, payload).encode() {
            Ok(frame) => frame,
            Err(e) => {
                error!(event = name, "failed to encode event: {e}");
                return false;
            }
        };
        connection.frame_tx.send(frame).is_ok()
    }

    /// Join `lobby_id` as `user_id`.
    pub fn join_lobby(&self, user_id: &str, lobby_id: &str) -> bool {
        self.emit(
            "join_lobby",
            Some(json!({ "user_id": user_id, "lobby_id": lobby_id })),
        )
    }

    /// Leave the lobby `user_id` is in.
    pub fn leave_lobby(&self, user_id: &str) -> bool {
        self.emit("leave_lobby", Some(json!({ "user_id": user_id })))
    }

    /// Ask the server to broadcast the lobby roster.
    pub fn request_lobby(&self) -> bool {
        self.emit("request_lobby", None)
    }

    /// Ask the server for the current lobby countdown.
    pub fn request_timer(&self) -> bool {
        self.emit("request_timer", None)
    }

    /// Ask the server to start the game in `lobby_id`.
    pub fn start_game(&self, lobby_id: &str) -> bool {
        self.emit("start_game", Some(json!({ "lobby_id": lobby_id })))
    }

    /// Register `callback` for events named `name`.
    pub fn subscribe<F>(&self, name: EventName, callback: F) -> Subscription
    where
        F: Fn(&GameEvent) + Send + Sync + 'static,
    {
        self.state.bus.subscribe(name, callback)
    }

    /// The callback registry, for consumers that subscribe on their own.
    pub fn events(&self) -> Arc<EventBus> {
        Arc::clone(&self.state.bus)
    }

    /// A snapshot of the mirrored game state.
    pub async fn mirror(&self) -> GameMirror {
        self.state.mirror.read().await.clone()
    }

    /// Shared handle to the mirror, for consumers that read it directly.
    ///
    /// The mirror is already updated when callbacks for an event run.
    pub fn mirror_handle(&self) -> Arc<RwLock<GameMirror>> {
        Arc::clone(&self.state.mirror)
    }

    /// Whether the server has acknowledged the current connection.
    pub fn is_connected(&self) -> bool {
        self.live_connection().is_some()
    }

    pub fn config(&self) -> &SocketConfig {
        &self.config
    }

    fn live_connection(&self) -> Option<&Connection> {
        self.connection
            .as_ref()
            .filter(|c| c.connected.load(Ordering::Acquire))
    }
}

impl std::fmt::Debug for GameSocket {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GameSocket")
            .field("url", &self.config.url)
            .field("connected", &self.is_connected())
            .field("connection", &self.connection.as_ref().map(|c| c.id))
            .finish()
    }
}

impl Drop for GameSocket {
    fn drop(&mut self) {
        // No executor to drive a graceful close from `Drop`; abort instead.
        if let Some(connection) = self.connection.take() {
            connection.task.abort();
        }
    }
}

// ── Connection loop ─────────────────────────────────────────────────

#[derive(Debug, PartialEq, Eq)]
enum Flow {
    Continue,
    Stop,
}

/// Background task driving one connection.
///
/// Exits when the handle asks it to, when the server disconnects or closes
/// the transport, or on a transport error.
async fn connection_loop(
    id: Uuid,
    mut transport: impl Transport,
    mut frame_rx: mpsc::UnboundedReceiver<String>,
    state: Arc<SocketState>,
    connected: Arc<AtomicBool>,
    mut shutdown_rx: oneshot::Receiver<()>,
) {
    debug!(connection = %id, "connection loop started");

    loop {
        tokio::select! {
            frame = frame_rx.recv() => {
                match frame {
                    Some(frame) => {
                        if let Err(e) = transport.send(frame).await {
                            error!(connection = %id, "transport send error: {e}");
                            connection_lost(&state, &connected, format!("transport send error: {e}")).await;
                            break;
                        }
                    }
                    // Handle dropped.
                    None => {
                        let _ = transport.close().await;
                        connection_lost(&state, &connected, CLIENT_DISCONNECT.to_string()).await;
                        break;
                    }
                }
            }

            _ = &mut shutdown_rx => {
                if connected.load(Ordering::Acquire) {
                    if let Err(e) = send_packet(&mut transport, &EnginePacket::Message(SocketPacket::Disconnect)).await {
                        debug!(connection = %id, "could not send disconnect packet: {e}");
                    }
                }
                let _ = transport.close().await;
                if connected.swap(false, Ordering::AcqRel) {
                    state.dispatch(GameEvent::Disconnected { reason: Some(CLIENT_DISCONNECT.to_string()) }).await;
                }
                break;
            }

            incoming = transport.recv() => {
                match incoming {
                    Some(Ok(text)) => {
                        if handle_frame(&text, &mut transport, &state, &connected).await == Flow::Stop {
                            let _ = transport.close().await;
                            break;
                        }
                    }
                    Some(Err(e)) => {
                        error!(connection = %id, "transport receive error: {e}");
                        connection_lost(&state, &connected, format!("transport receive error: {e}")).await;
                        break;
                    }
                    None => {
                        debug!(connection = %id, "transport closed by server");
                        connection_lost(&state, &connected, TRANSPORT_CLOSE.to_string()).await;
                        break;
                    }
                }
            }
        }
    }

    debug!(connection = %id, "connection loop exited");
}

/// React to one incoming frame.
async fn handle_frame(
    text: &str,
    transport: &mut impl Transport,
    state: &SocketState,
    connected: &AtomicBool,
) -> Flow {
    let packet = match protocol::decode(text) {
        Ok(packet) => packet,
        Err(e) => {
            warn!("dropping undecodable frame: {e} (raw: {text})");
            return Flow::Continue;
        }
    };

    let reply = match packet {
        EnginePacket::Open(open) => {
            debug!(sid = %open.sid, ping_interval = open.ping_interval, "engine.io open");
            Some(EnginePacket::connect())
        }
        EnginePacket::Ping => Some(EnginePacket::Pong),
        EnginePacket::Pong | EnginePacket::Noop | EnginePacket::Upgrade => None,
        EnginePacket::Close => {
            connection_lost(state, connected, TRANSPORT_CLOSE.to_string()).await;
            return Flow::Stop;
        }
        EnginePacket::Message(SocketPacket::Connect(_)) => {
            connected.store(true, Ordering::Release);
            info!("socket connected");
            state.dispatch(GameEvent::Connected).await;
            None
        }
        EnginePacket::Message(SocketPacket::Disconnect) => {
            connection_lost(state, connected, SERVER_DISCONNECT.to_string()).await;
            return Flow::Stop;
        }
        EnginePacket::Message(SocketPacket::ConnectError(detail)) => {
            connected.store(false, Ordering::Release);
            let message = error_message(&detail.unwrap_or(Value::Null));
            warn!("server refused connection: {message}");
            state.dispatch(GameEvent::ConnectError { message }).await;
            return Flow::Stop;
        }
        EnginePacket::Message(SocketPacket::Event { name, data, .. }) => {
            match GameEvent::from_wire(&name, data) {
                // Connection state follows the handshake packets only.
                Some(GameEvent::Connected | GameEvent::Disconnected { .. }) => {
                    debug!(event = %name, "ignoring reserved event name from server");
                }
                Some(event) => state.dispatch(event).await,
                None => debug!(event = %name, "ignoring unknown event"),
            }
            None
        }
        EnginePacket::Message(SocketPacket::Ack { ack_id, .. }) => {
            debug!(ack_id, "ignoring ack");
            None
        }
    };

    if let Some(reply) = reply {
        if let Err(e) = send_packet(transport, &reply).await {
            error!("transport send error: {e}");
            connection_lost(state, connected, format!("transport send error: {e}")).await;
            return Flow::Stop;
        }
    }
    Flow::Continue
}

async fn send_packet(transport: &mut impl Transport, packet: &EnginePacket) -> Result<()> {
    transport.send(packet.encode()?).await
}

/// Clear the connected flag and report the loss: `Disconnected` when the
/// connection had been established, `ConnectError` when it never was.
async fn connection_lost(state: &SocketState, connected: &AtomicBool, reason: String) {
    if connected.swap(false, Ordering::AcqRel) {
        state
            .dispatch(GameEvent::Disconnected {
                reason: Some(reason),
            })
            .await;
    } else {
        state
            .dispatch(GameEvent::ConnectError { message: reason })
            .await;
    }
}

// ── Tests ───────────────────────────────────────────────────────────

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
    use crate::error::PartyClientError;
    use async_trait::async_trait;
    use std::collections::VecDeque;
    use std::sync::Mutex as StdMutex;

    const OPEN: &str = r#"0{"sid":"eio-1","upgrades":[],"pingInterval":25000,"pingTimeout":20000}"#;
    const CONNECT_ACK: &str = r#"40{"sid":"sio-1"}"#;

    /// Replays scripted frames and records what the client sends.
    struct MockTransport {
        incoming: VecDeque<Option<std::result::Result<String, PartyClientError>>>,
        sent: Arc<StdMutex<Vec<String>>>,
        closed: Arc<AtomicBool>,
        close_hangs: bool,
    }

    impl MockTransport {
        fn new(frames: &[&str]) -> (Self, Arc<StdMutex<Vec<String>>>, Arc<AtomicBool>) {
            let sent = Arc::new(StdMutex::new(Vec::new()));
            let closed = Arc::new(AtomicBool::new(false));
            let transport = Self {
                incoming: frames.iter().map(|f| Some(Ok(f.to_string()))).collect(),
                sent: Arc::clone(&sent),
                closed: Arc::clone(&closed),
                close_hangs: false,
            };
            (transport, sent, closed)
        }

        /// A transport whose `close` never completes.
        fn hanging_on_close(mut self) -> Self {
            self.close_hangs = true;
            self
        }
    }

    #[async_trait]
    impl Transport for MockTransport {
        async fn send(&mut self, frame: String) -> std::result::Result<(), PartyClientError> {
            self.sent.lock().unwrap().push(frame);
            Ok(())
        }

        async fn recv(&mut self) -> Option<std::result::Result<String, PartyClientError>> {
            match self.incoming.pop_front() {
                Some(item) => item,
                // Script exhausted: stay open until shut down.
                None => std::future::pending().await,
            }
        }

        async fn close(&mut self) -> std::result::Result<(), PartyClientError> {
            self.closed.store(true, Ordering::Relaxed);
            if self.close_hangs {
                std::future::pending::<()>().await;
            }
            Ok(())
        }
    }

    fn test_socket() -> GameSocket {
        GameSocket::new(
            SocketConfig::new("ws://test").with_shutdown_timeout(Duration::from_millis(200)),
        )
    }

    /// Forward every event named `name` into a channel.
    fn watch(socket: &GameSocket, name: EventName) -> mpsc::UnboundedReceiver<GameEvent> {
        let (tx, rx) = mpsc::unbounded_channel();
        let _ = socket.subscribe(name, move |event| {
            let _ = tx.send(event.clone());
        });
        rx
    }

    async fn next(rx: &mut mpsc::UnboundedReceiver<GameEvent>) -> GameEvent {
        tokio::time::timeout(Duration::from_secs(1), rx.recv())
            .await
            .expect("timed out waiting for event")
            .expect("event channel closed")
    }

    #[tokio::test]
    async fn handshake_sends_namespace_connect_and_sets_flag() {
        let mut socket = test_socket();
        let mut connects = watch(&socket, EventName::Connect);
        let (transport, sent, _closed) = MockTransport::new(&[OPEN, CONNECT_ACK]);

        assert!(socket.connect(transport));
        assert_eq!(next(&mut connects).await, GameEvent::Connected);
        assert!(socket.is_connected());
        assert_eq!(sent.lock().unwrap()[0], "40");

        socket.disconnect().await;
    }

    #[tokio::test]
    async fn ping_is_answered_with_pong() {
        let mut socket = test_socket();
        let mut ticks = watch(&socket, EventName::TimerUpdate);
        let (transport, sent, _closed) =
            MockTransport::new(&[OPEN, CONNECT_ACK, "2", r#"42["timer_update",{"time":5}]"#]);

        socket.connect(transport);
        next(&mut ticks).await;
        assert_eq!(*sent.lock().unwrap(), vec!["40", "3"]);

        socket.disconnect().await;
    }

    #[tokio::test]
    async fn emit_before_connect_ack_is_dropped() {
        let mut socket = test_socket();
        assert!(!socket.emit("request_lobby", None));

        let (transport, sent, _closed) = MockTransport::new(&[OPEN]);
        socket.connect(transport);
        tokio::time::sleep(Duration::from_millis(50)).await;

        assert!(!socket.is_connected());
        assert!(!socket.request_lobby());
        assert_eq!(*sent.lock().unwrap(), vec!["40"]);

        socket.disconnect().await;
    }

    #[tokio::test]
    async fn emit_encodes_socket_io_event() {
        let mut socket = test_socket();
        let mut connects = watch(&socket, EventName::Connect);
        let (transport, sent, _closed) = MockTransport::new(&[OPEN, CONNECT_ACK]);
        socket.connect(transport);
        next(&mut connects).await;

        assert!(socket.join_lobby("u1", "main"));
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(
            sent.lock().unwrap().last().unwrap(),
            r#"42["join_lobby",{"lobby_id":"main","user_id":"u1"}]"#
        );

        socket.disconnect().await;
    }

    #[tokio::test]
    async fn second_connect_while_connected_is_ignored() {
        let mut socket = test_socket();
        let mut connects = watch(&socket, EventName::Connect);
        let (first, _sent, _closed) = MockTransport::new(&[OPEN, CONNECT_ACK]);
        socket.connect(first);
        next(&mut connects).await;

        let (second, second_sent, _closed) = MockTransport::new(&[OPEN, CONNECT_ACK]);
        assert!(!socket.connect(second));
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(second_sent.lock().unwrap().is_empty());

        socket.disconnect().await;
    }

    #[tokio::test]
    async fn disconnect_sends_packet_closes_and_notifies() {
        let mut socket = test_socket();
        let mut connects = watch(&socket, EventName::Connect);
        let mut disconnects = watch(&socket, EventName::Disconnect);
        let (transport, sent, closed) = MockTransport::new(&[OPEN, CONNECT_ACK]);
        socket.connect(transport);
        next(&mut connects).await;

        socket.disconnect().await;

        assert!(!socket.is_connected());
        assert!(closed.load(Ordering::Relaxed));
        assert_eq!(sent.lock().unwrap().last().unwrap(), "41");
        assert_eq!(
            next(&mut disconnects).await,
            GameEvent::Disconnected {
                reason: Some(CLIENT_DISCONNECT.into())
            }
        );
        assert!(!socket.emit("request_timer", None));
    }

    #[tokio::test]
    async fn aborted_disconnect_still_notifies_once() {
        let mut socket = test_socket();
        let mut connects = watch(&socket, EventName::Connect);
        let mut disconnects = watch(&socket, EventName::Disconnect);
        let (transport, sent, closed) = MockTransport::new(&[OPEN, CONNECT_ACK]);
        socket.connect(transport.hanging_on_close());
        next(&mut connects).await;

        socket.disconnect().await;

        assert!(closed.load(Ordering::Relaxed));
        assert_eq!(sent.lock().unwrap().last().unwrap(), "41");
        assert!(!socket.is_connected());
        assert_eq!(
            next(&mut disconnects).await,
            GameEvent::Disconnected {
                reason: Some(CLIENT_DISCONNECT.into())
            }
        );
        assert!(disconnects.try_recv().is_err());
    }

    #[tokio::test]
    async fn disconnect_without_connection_is_a_no_op() {
        let mut socket = test_socket();
        socket.disconnect().await;
        assert!(!socket.is_connected());
    }

    #[tokio::test]
    async fn server_disconnect_clears_flag() {
        let mut socket = test_socket();
        let mut disconnects = watch(&socket, EventName::Disconnect);
        let (transport, _sent, closed) = MockTransport::new(&[OPEN, CONNECT_ACK, "41"]);
        socket.connect(transport);

        assert_eq!(
            next(&mut disconnects).await,
            GameEvent::Disconnected {
                reason: Some(SERVER_DISCONNECT.into())
            }
        );
        assert!(!socket.is_connected());
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(closed.load(Ordering::Relaxed));
    }

    #[tokio::test]
    async fn connect_error_packet_is_reported() {
        let mut socket = test_socket();
        let mut errors = watch(&socket, EventName::ConnectError);
        let (transport, _sent, _closed) =
            MockTransport::new(&[OPEN, r#"44{"message":"invalid namespace"}"#]);
        socket.connect(transport);

        assert_eq!(
            next(&mut errors).await,
            GameEvent::ConnectError {
                message: "invalid namespace".into()
            }
        );
        assert!(!socket.is_connected());
    }

    #[tokio::test]
    async fn reconnect_after_connection_loss_replaces_handle() {
        let mut socket = test_socket();
        let mut connects = watch(&socket, EventName::Connect);
        let (first, _sent, _closed) = MockTransport::new(&[OPEN, CONNECT_ACK, "1"]);
        socket.connect(first);
        next(&mut connects).await;
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(!socket.is_connected());

        let (second, second_sent, _closed) = MockTransport::new(&[OPEN, CONNECT_ACK]);
        assert!(socket.connect(second));
        next(&mut connects).await;
        assert!(socket.is_connected());
        assert_eq!(*second_sent.lock().unwrap(), vec!["40"]);

        socket.disconnect().await;
    }

    #[tokio::test]
    async fn mirror_is_updated_before_callbacks_run() {
        let mut socket = test_socket();
        let mirror = socket.mirror_handle();
        let (tx, mut rx) = mpsc::unbounded_channel();
        let _ = socket.subscribe(EventName::GameTimerUpdate, move |_| {
            let seen = mirror.try_read().map(|m| (m.round_timer, m.game_timer_running));
            let _ = tx.send(seen.ok());
        });
        let (transport, _sent, _closed) = MockTransport::new(&[
            OPEN,
            CONNECT_ACK,
            r#"42["game_timer_update",{"time":7}]"#,
            r#"42["game_timer_update",{"time":0}]"#,
        ]);
        socket.connect(transport);

        let first = tokio::time::timeout(Duration::from_secs(1), rx.recv()).await.unwrap();
        assert_eq!(first, Some(Some((7, true))));
        let second = tokio::time::timeout(Duration::from_secs(1), rx.recv()).await.unwrap();
        assert_eq!(second, Some(Some((0, false))));

        socket.disconnect().await;
    }

    #[tokio::test]
    async fn game_result_also_notifies_game_finished_listeners() {
        let mut socket = test_socket();
        let order = Arc::new(StdMutex::new(Vec::new()));
        let result_log = Arc::clone(&order);
        let _ = socket.subscribe(EventName::GameResult, move |_| {
            result_log.lock().unwrap().push("result".to_string());
        });
        let (tx, mut rx) = mpsc::unbounded_channel();
        let finished_log = Arc::clone(&order);
        let _ = socket.subscribe(EventName::GameFinished, move |event| {
            if let GameEvent::GameFinished(finished) = event {
                finished_log
                    .lock()
                    .unwrap()
                    .push(format!("finished:{}", finished.winner_id.clone().unwrap_or_default()));
            }
            let _ = tx.send(());
        });
        let (transport, _sent, _closed) = MockTransport::new(&[
            OPEN,
            CONNECT_ACK,
            r#"42["game_result",{"winner_id":"w1","game_finished":true}]"#,
        ]);
        socket.connect(transport);

        tokio::time::timeout(Duration::from_secs(1), rx.recv()).await.unwrap();
        assert_eq!(*order.lock().unwrap(), vec!["result", "finished:w1"]);
        let mirror = socket.mirror().await;
        assert!(mirror.game_finished);
        assert_eq!(mirror.game_winner.as_deref(), Some("w1"));

        socket.disconnect().await;
    }

    #[tokio::test]
    async fn garbage_frames_and_unknown_events_are_skipped() {
        let mut socket = test_socket();
        let mut ticks = watch(&socket, EventName::TimerUpdate);
        let (transport, _sent, _closed) = MockTransport::new(&[
            OPEN,
            CONNECT_ACK,
            "zzz",
            r#"42["chat",{"text":"hi"}]"#,
            r#"42["timer_update",{"time":3}]"#,
        ]);
        socket.connect(transport);

        let GameEvent::TimerUpdate(timer) = next(&mut ticks).await else {
            panic!("wrong variant");
        };
        assert_eq!(timer.time, 3);
        assert!(socket.is_connected());
        assert_eq!(socket.mirror().await.global_timer, 3);

        socket.disconnect().await;
    }

    #[tokio::test]
    async fn config_defaults() {
        let config = SocketConfig::new("ws://x");
        assert_eq!(config.connect_timeout, Duration::from_secs(10));
        assert_eq!(config.shutdown_timeout, Duration::from_secs(1));
    }
}
