//! # Lobby Watch Example
//!
//! Connects to a running game server and logs the live lobby and game feed:
//!
//! 1. Restore the signed-in user from a local state file
//! 2. Connect to the Socket.IO endpoint over WebSocket
//! 3. Join the lobby and ask for the roster and countdown
//! 4. Log timers, eliminations and results as they arrive
//! 5. Disconnect gracefully on Ctrl+C
//!
//! ## Running
//!
//! ```sh
//! # Start the game backend on localhost:5000, then:
//! cargo run --example lobby_watch
//!
//! # Point at another deployment and lobby:
//! SOCKET_URL=https://party.example LOBBY_ID=main cargo run --example lobby_watch
//! ```

use std::sync::Arc;

use party_game_client::{
    ClientConfig, EventName, FileStorage, GameEvent, GameSocket, HttpApi, SessionStore,
    StoredSessionProvider,
};

/// Lobby joined when `LOBBY_ID` is not set.
const DEFAULT_LOBBY: &str = "main";

/// State file used when `PARTY_STATE_FILE` is not set.
const DEFAULT_STATE_FILE: &str = "party-state.json";

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // ── Logging ─────────────────────────────────────────────────────
    // Set `RUST_LOG=debug` for frame-level output.
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    // ── Configuration ───────────────────────────────────────────────
    let config = ClientConfig::from_env();
    let lobby_id = std::env::var("LOBBY_ID").unwrap_or_else(|_| DEFAULT_LOBBY.to_string());
    let state_file =
        std::env::var("PARTY_STATE_FILE").unwrap_or_else(|_| DEFAULT_STATE_FILE.to_string());

    // ── Session ─────────────────────────────────────────────────────
    let storage = Arc::new(FileStorage::open(state_file)?);
    let api = HttpApi::from_config(&config);
    let mut session = SessionStore::restore(storage);
    if session.is_authenticated() && !session.sign_in(&StoredSessionProvider, &api).await {
        tracing::warn!("stored session could not be refreshed");
    }
    let user_id = session.user().map(|u| u.user_id.clone());
    match &user_id {
        Some(id) => tracing::info!("Watching as {id}"),
        None => tracing::info!("No stored session; watching without joining"),
    }

    // ── Subscriptions ───────────────────────────────────────────────
    let mut socket = GameSocket::new(config.socket_config());

    let _timer = socket.subscribe(EventName::TimerUpdate, |event| {
        if let GameEvent::TimerUpdate(timer) = event {
            tracing::info!("Lobby countdown: {}s", timer.time);
        }
    });
    let _lobby = socket.subscribe(EventName::LobbyUpdate, |event| {
        if let GameEvent::LobbyUpdate(lobby) = event {
            let names: Vec<&str> = lobby.players.iter().map(|p| p.nickname.as_str()).collect();
            tracing::info!("Lobby ({}): {}", lobby.count, names.join(", "));
        }
    });
    let _eliminated = socket.subscribe(EventName::PlayersEliminated, |event| {
        if let GameEvent::PlayersEliminated(out) = event {
            tracing::info!("Eliminated: {:?}", out.eliminated_players);
        }
    });
    let _finished = socket.subscribe(EventName::GameFinished, |event| {
        if let GameEvent::GameFinished(done) = event {
            match &done.winner_id {
                Some(winner) => tracing::info!("Game over, winner {winner}"),
                None => tracing::info!("Game over, no single winner"),
            }
        }
    });

    // ── Connect and join ────────────────────────────────────────────
    let (ready_tx, mut ready_rx) = tokio::sync::mpsc::unbounded_channel();
    let _connected = socket.subscribe(EventName::Connect, move |_| {
        let _ = ready_tx.send(());
    });

    tracing::info!("Connecting to {}", socket.config().url);
    if !socket.connect_websocket().await {
        return Err("could not connect to the game server".into());
    }
    if ready_rx.recv().await.is_some() {
        if let Some(id) = &user_id {
            socket.join_lobby(id, &lobby_id);
        }
        socket.request_lobby();
        socket.request_timer();
    }

    // ── Wait for Ctrl+C ─────────────────────────────────────────────
    tokio::signal::ctrl_c().await?;
    let mirror = socket.mirror().await;
    tracing::info!(
        "Round {}/{}, finished: {}",
        mirror.current_round,
        mirror.total_rounds,
        mirror.game_finished
    );
    socket.disconnect().await;
    Ok(())
}
