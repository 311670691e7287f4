#![allow(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::panic,
    clippy::todo,
    clippy::unimplemented,
    clippy::indexing_slicing,
    dead_code
)]
//! Shared test utilities for the party game client integration tests.
//!
//! Provides a scripted [`MockTransport`], a channel-backed
//! [`ChannelTransport`] for interactive server scripts, an in-memory
//! [`MockApi`] backend and helpers for building Socket.IO frames.

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex as StdMutex};
use std::time::Duration;

use async_trait::async_trait;
use party_game_client::api::{AdminStatus, CoinUpdate, GameApi, Registration, UserRecord};
use party_game_client::{GameEvent, GameSocket, PartyClientError, SocketConfig, Transport};
use serde_json::{json, Value};
use tokio::sync::mpsc;

// ── MockTransport ───────────────────────────────────────────────────

/// Scripted server frames are consumed in order by `recv()`.
/// All frames sent by the client are recorded in `sent`.
pub struct MockTransport {
    incoming: VecDeque<Option<Result<String, PartyClientError>>>,
    pub sent: Arc<StdMutex<Vec<String>>>,
    pub closed: Arc<AtomicBool>,
}

impl MockTransport {
    /// Create a mock transport with the given scripted incoming frames.
    ///
    /// Returns the transport plus shared handles for inspecting sent frames
    /// and whether close was called.
    pub fn new(
        incoming: Vec<Option<Result<String, PartyClientError>>>,
    ) -> (Self, Arc<StdMutex<Vec<String>>>, Arc<AtomicBool>) {
        let sent = Arc::new(StdMutex::new(Vec::new()));
        let closed = Arc::new(AtomicBool::new(false));
        let transport = Self {
            incoming: VecDeque::from(incoming),
            sent: Arc::clone(&sent),
            closed: Arc::clone(&closed),
        };
        (transport, sent, closed)
    }

    /// Shorthand for a script made only of successful frames.
    pub fn frames(
        frames: Vec<String>,
    ) -> (Self, Arc<StdMutex<Vec<String>>>, Arc<AtomicBool>) {
        Self::new(frames.into_iter().map(|f| Some(Ok(f))).collect())
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn send(&mut self, frame: String) -> Result<(), PartyClientError> {
        self.sent.lock().unwrap().push(frame);
        Ok(())
    }

    async fn recv(&mut self) -> Option<Result<String, PartyClientError>> {
        if let Some(item) = self.incoming.pop_front() {
            item
        } else {
            // Script exhausted: stay open until the socket shuts down.
            std::future::pending().await
        }
    }

    async fn close(&mut self) -> Result<(), PartyClientError> {
        self.closed.store(true, Ordering::Relaxed);
        Ok(())
    }
}

// ── ChannelTransport ────────────────────────────────────────────────

/// Transport whose other end is driven by the test.
pub struct ChannelTransport {
    to_server: mpsc::UnboundedSender<String>,
    from_server: mpsc::UnboundedReceiver<String>,
}

/// The test's end of a [`ChannelTransport`].
pub struct ServerEnd {
    to_client: Option<mpsc::UnboundedSender<String>>,
    from_client: mpsc::UnboundedReceiver<String>,
}

impl ChannelTransport {
    pub fn pair() -> (Self, ServerEnd) {
        let (to_server, from_client) = mpsc::unbounded_channel();
        let (to_client, from_server) = mpsc::unbounded_channel();
        (
            Self {
                to_server,
                from_server,
            },
            ServerEnd {
                to_client: Some(to_client),
                from_client,
            },
        )
    }
}

#[async_trait]
impl Transport for ChannelTransport {
    async fn send(&mut self, frame: String) -> Result<(), PartyClientError> {
        self.to_server
            .send(frame)
            .map_err(|e| PartyClientError::TransportSend(e.to_string()))
    }

    async fn recv(&mut self) -> Option<Result<String, PartyClientError>> {
        self.from_server.recv().await.map(Ok)
    }

    async fn close(&mut self) -> Result<(), PartyClientError> {
        self.from_server.close();
        Ok(())
    }
}

impl ServerEnd {
    /// Push a frame to the client.
    pub fn push(&self, frame: impl Into<String>) {
        if let Some(tx) = &self.to_client {
            tx.send(frame.into()).expect("client transport dropped");
        }
    }

    /// Next frame the client sent, within one second.
    pub async fn next_frame(&mut self) -> String {
        tokio::time::timeout(Duration::from_secs(1), self.from_client.recv())
            .await
            .expect("timed out waiting for client frame")
            .expect("client transport dropped")
    }

    /// Run the Engine.IO and Socket.IO handshake from the server side.
    pub async fn handshake(&mut self) {
        self.push(open_frame());
        assert_eq!(self.next_frame().await, "40");
        self.push(connect_ack());
    }

    /// Close the server side; the client sees the transport end.
    pub fn hang_up(&mut self) {
        self.to_client = None;
    }
}

// ── MockApi ─────────────────────────────────────────────────────────

/// In-memory backend with the REST API's observable behavior.
#[derive(Default)]
pub struct MockApi {
    users: StdMutex<HashMap<String, UserRecord>>,
    admins: StdMutex<HashSet<String>>,
    outage: StdMutex<Option<u16>>,
    /// Names of the calls made, in order.
    pub calls: StdMutex<Vec<String>>,
}

impl MockApi {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a user with the given balance.
    pub fn with_user(self, user_id: &str, nickname: &str, balance: i64) -> Self {
        self.users.lock().unwrap().insert(
            user_id.to_string(),
            UserRecord {
                user_id: user_id.to_string(),
                nickname: nickname.to_string(),
                balance: Some(balance),
            },
        );
        self
    }

    pub fn with_admin(self, user_id: &str) -> Self {
        self.admins.lock().unwrap().insert(user_id.to_string());
        self
    }

    /// Make every call fail with `status`.
    pub fn failing(self, status: u16) -> Self {
        *self.outage.lock().unwrap() = Some(status);
        self
    }

    pub fn user(&self, user_id: &str) -> Option<UserRecord> {
        self.users.lock().unwrap().get(user_id).cloned()
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    fn enter(&self, call: &str) -> Result<(), PartyClientError> {
        self.calls.lock().unwrap().push(call.to_string());
        match *self.outage.lock().unwrap() {
            Some(status) => Err(PartyClientError::Api {
                status,
                message: "service unavailable".into(),
            }),
            None => Ok(()),
        }
    }

    fn not_found() -> PartyClientError {
        PartyClientError::Api {
            status: 404,
            message: "User not found".into(),
        }
    }

    fn adjust(&self, user_id: &str, delta: i64) -> Result<i64, PartyClientError> {
        let mut users = self.users.lock().unwrap();
        let user = users.get_mut(user_id).ok_or_else(Self::not_found)?;
        let balance = user.balance.unwrap_or_default() + delta;
        if balance < 0 {
            return Err(PartyClientError::Api {
                status: 400,
                message: "Insufficient balance".into(),
            });
        }
        user.balance = Some(balance);
        Ok(balance)
    }
}

#[async_trait]
impl GameApi for MockApi {
    async fn fetch_user(&self, user_id: &str) -> Result<UserRecord, PartyClientError> {
        self.enter("fetch_user")?;
        self.user(user_id).ok_or_else(Self::not_found)
    }

    async fn register_user(
        &self,
        user_id: &str,
        nickname: &str,
    ) -> Result<Registration, PartyClientError> {
        self.enter("register_user")?;
        let mut users = self.users.lock().unwrap();
        if users.contains_key(user_id) {
            return Err(PartyClientError::Api {
                status: 400,
                message: "User ID already exists".into(),
            });
        }
        users.insert(
            user_id.to_string(),
            UserRecord {
                user_id: user_id.to_string(),
                nickname: nickname.to_string(),
                balance: Some(10),
            },
        );
        Ok(Registration {
            message: "User registered successfully".into(),
            is_admin: self.admins.lock().unwrap().contains(user_id),
        })
    }

    async fn check_admin(&self, user_id: &str) -> Result<AdminStatus, PartyClientError> {
        self.enter("check_admin")?;
        if self.user(user_id).is_none() {
            return Err(Self::not_found());
        }
        Ok(AdminStatus {
            user_id: user_id.to_string(),
            is_admin: self.admins.lock().unwrap().contains(user_id),
        })
    }

    async fn balance(&self, user_id: &str) -> Result<i64, PartyClientError> {
        self.enter("balance")?;
        self.user(user_id)
            .map(|u| u.balance.unwrap_or_default())
            .ok_or_else(Self::not_found)
    }

    async fn add_coins(&self, user_id: &str, amount: i64) -> Result<CoinUpdate, PartyClientError> {
        self.enter("add_coins")?;
        let balance = self.adjust(user_id, amount)?;
        Ok(CoinUpdate {
            balance,
            message: Some("Coins added successfully".into()),
            added: Some(amount),
            deducted: None,
        })
    }

    async fn deduct_coins(
        &self,
        user_id: &str,
        amount: i64,
    ) -> Result<CoinUpdate, PartyClientError> {
        self.enter("deduct_coins")?;
        let balance = self.adjust(user_id, -amount)?;
        Ok(CoinUpdate {
            balance,
            message: Some("Coins deducted successfully".into()),
            added: None,
            deducted: Some(amount),
        })
    }

    async fn fetch_data(&self) -> Result<Value, PartyClientError> {
        self.enter("fetch_data")?;
        Ok(json!({ "message": "hello world" }))
    }
}

// ── Frame helpers ───────────────────────────────────────────────────

/// Engine.IO open packet.
pub fn open_frame() -> String {
    r#"0{"sid":"eio-test","upgrades":[],"pingInterval":25000,"pingTimeout":20000,"maxPayload":1000000}"#
        .to_string()
}

/// Socket.IO connect acknowledgement for the default namespace.
pub fn connect_ack() -> String {
    r#"40{"sid":"sio-test"}"#.to_string()
}

/// Socket.IO event frame carrying `data`.
pub fn event_frame(name: &str, data: Value) -> String {
    format!("42{}", json!([name, data]))
}

/// Open, acknowledge, then the given frames.
pub fn session_script(frames: &[String]) -> Vec<String> {
    let mut script = vec![open_frame(), connect_ack()];
    script.extend_from_slice(frames);
    script
}

// ── Socket helpers ──────────────────────────────────────────────────

pub fn test_socket() -> GameSocket {
    GameSocket::new(
        SocketConfig::new("ws://127.0.0.1:9/socket.io/?EIO=4&transport=websocket")
            .with_shutdown_timeout(Duration::from_millis(200)),
    )
}

/// Collect every event named `name` into a channel.
pub fn watch(
    socket: &GameSocket,
    name: party_game_client::EventName,
) -> mpsc::UnboundedReceiver<GameEvent> {
    let (tx, rx) = mpsc::unbounded_channel();
    let _ = socket.subscribe(name, move |event| {
        let _ = tx.send(event.clone());
    });
    rx
}

/// Next collected event, within one second.
pub async fn next_event(rx: &mut mpsc::UnboundedReceiver<GameEvent>) -> GameEvent {
    tokio::time::timeout(Duration::from_secs(1), rx.recv())
        .await
        .expect("timed out waiting for event")
        .expect("event channel closed")
}
