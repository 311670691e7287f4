//! # Loopback Game Example
//!
//! Plays a short scripted game against an in-process fake server by
//! implementing the [`Transport`] trait over channels. Useful for:
//!
//! - **Testing** — exercise UI logic without a backend
//! - **Custom backends** — adapt any I/O layer that carries text frames
//!
//! ## Running
//!
//! ```sh
//! cargo run --example loopback_game
//! ```

use std::time::Duration;

use async_trait::async_trait;
use party_game_client::{
    EventName, GameEvent, GameSocket, PartyClientError, SocketConfig, Transport,
};
use serde_json::json;
use tokio::sync::mpsc;

// ─────────────────────────────────────────────────────────────────────
// Step 1: A channel-based loopback transport
// ─────────────────────────────────────────────────────────────────────

/// Client half: handed to [`GameSocket::connect`].
struct LoopbackTransport {
    tx: mpsc::UnboundedSender<String>,
    rx: mpsc::UnboundedReceiver<String>,
}

/// Server half: drives the conversation.
struct LoopbackServer {
    rx: mpsc::UnboundedReceiver<String>,
    tx: mpsc::UnboundedSender<String>,
}

fn loopback_pair() -> (LoopbackTransport, LoopbackServer) {
    let (client_tx, server_rx) = mpsc::unbounded_channel();
    let (server_tx, client_rx) = mpsc::unbounded_channel();
    (
        LoopbackTransport {
            tx: client_tx,
            rx: client_rx,
        },
        LoopbackServer {
            rx: server_rx,
            tx: server_tx,
        },
    )
}

#[async_trait]
impl Transport for LoopbackTransport {
    async fn send(&mut self, frame: String) -> Result<(), PartyClientError> {
        self.tx
            .send(frame)
            .map_err(|e| PartyClientError::TransportSend(e.to_string()))
    }

    /// Cancel-safe: `UnboundedReceiver::recv` is.
    async fn recv(&mut self) -> Option<Result<String, PartyClientError>> {
        self.rx.recv().await.map(Ok)
    }

    async fn close(&mut self) -> Result<(), PartyClientError> {
        Ok(())
    }
}

impl LoopbackServer {
    fn event(&self, name: &str, data: serde_json::Value) -> Result<(), Box<dyn std::error::Error>> {
        self.tx.send(format!("42{}", json!([name, data])))?;
        Ok(())
    }
}

// ─────────────────────────────────────────────────────────────────────
// Step 2: Play a game
// ─────────────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let mut socket = GameSocket::new(SocketConfig::new("loopback://game"));
    let (done_tx, mut done_rx) = mpsc::unbounded_channel();
    let _finished = socket.subscribe(EventName::GameFinished, move |event| {
        if let GameEvent::GameFinished(finished) = event {
            let _ = done_tx.send(finished.winner_id.clone());
        }
    });
    let _rounds = socket.subscribe(EventName::RoundUpdated, |event| {
        if let GameEvent::RoundUpdated(round) = event {
            tracing::info!("Round {:?} of {:?}", round.current_round, round.total_rounds);
        }
    });

    let (transport, mut server) = loopback_pair();
    socket.connect(transport);

    // ── Fake server: handshake ──────────────────────────────────────
    server.tx.send(
        r#"0{"sid":"loop","upgrades":[],"pingInterval":25000,"pingTimeout":20000}"#.to_string(),
    )?;
    let Some(connect) = server.rx.recv().await else {
        return Err("client hung up before connecting".into());
    };
    tracing::info!("Server received: {connect}");
    server.tx.send(r#"40{"sid":"loop-sio"}"#.to_string())?;

    // Give the ack a moment to land before emitting.
    tokio::time::sleep(Duration::from_millis(20)).await;
    socket.join_lobby("u1", "main");
    if let Some(join) = server.rx.recv().await {
        tracing::info!("Server received: {join}");
    }

    // ── Fake server: a two-round game ───────────────────────────────
    server.event("game_started", json!({"game_session": {"id": 1, "total_rounds": 2}}))?;
    server.event("game_timer_start", json!({"time": 15}))?;
    server.event("choice_phase_started", json!({"round_number": 1, "active_players": ["u1", "u2"]}))?;
    server.event("players_eliminated", json!({"eliminated_players": ["u2"], "round_number": 1}))?;
    server.event("round_updated", json!({"current_round": 2, "total_rounds": 2}))?;
    server.event("game_result", json!({"winner_id": "u1", "game_finished": true}))?;

    let winner = tokio::time::timeout(Duration::from_secs(1), done_rx.recv()).await?;
    let mirror = socket.mirror().await;
    tracing::info!(
        "Winner: {:?}; eliminated: {:?}; round {}/{}",
        winner.flatten(),
        mirror.eliminated_players,
        mirror.current_round,
        mirror.total_rounds
    );

    socket.disconnect().await;
    Ok(())
}
