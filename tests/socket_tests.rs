//! Integration tests for `GameSocket`.
//!
//! Uses the scripted `MockTransport` and the interactive `ChannelTransport`
//! from `tests/common` to drive the Socket.IO handshake, server events and
//! client emits, and checks the mirror and callbacks they produce.

mod common;

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex as StdMutex};
use std::time::Duration;

use party_game_client::event::LobbyPlayer;
use party_game_client::{EventName, GameEvent, GameMirror, PartyClientError};
use serde_json::json;

use common::{
    event_frame, next_event, session_script, test_socket, watch, ChannelTransport, MockTransport,
};

// ════════════════════════════════════════════════════════════════════
// Mirror updates
// ════════════════════════════════════════════════════════════════════

/// Run `frames` after the handshake and return the mirror once the event
/// named `last` has been delivered.
async fn mirror_after(frames: Vec<String>, last: EventName) -> GameMirror {
    let mut socket = test_socket();
    let mut done = watch(&socket, last);
    let (transport, _sent, _closed) = MockTransport::frames(session_script(&frames));
    socket.connect(transport);
    next_event(&mut done).await;
    let mirror = socket.mirror().await;
    socket.disconnect().await;
    mirror
}

#[tokio::test]
async fn lobby_timer_updates_global_timer_only() {
    let mirror = mirror_after(
        vec![event_frame("timer_update", json!({"time": 4}))],
        EventName::TimerUpdate,
    )
    .await;
    assert_eq!(
        mirror,
        GameMirror {
            global_timer: 4,
            ..GameMirror::default()
        }
    );
}

#[tokio::test]
async fn round_timer_tracks_running_flag() {
    let running = mirror_after(
        vec![event_frame("game_timer_update", json!({"time": 7}))],
        EventName::GameTimerUpdate,
    )
    .await;
    assert_eq!(running.round_timer, 7);
    assert!(running.game_timer_running);

    let stopped = mirror_after(
        vec![
            event_frame("game_timer_update", json!({"time": 7})),
            event_frame("game_timer_update", json!({"time": 0})),
            // Marker: delivered after both timer updates.
            event_frame("timer_update", json!({"time": 1})),
        ],
        EventName::TimerUpdate,
    )
    .await;
    assert_eq!(stopped.round_timer, 0);
    assert!(!stopped.game_timer_running);
}

#[tokio::test]
async fn choice_phase_sequence() {
    let mirror = mirror_after(
        vec![
            event_frame("game_timer_start", json!({"time": 15})),
            event_frame(
                "choice_phase_started",
                json!({"round_number": 2, "active_players": ["u1", "u2"], "choice_timeout": 10, "bank": 30}),
            ),
            event_frame("choice_timer_start", json!({"time": 10})),
            event_frame("choice_timer_update", json!({"time": 6})),
        ],
        EventName::ChoiceTimerUpdate,
    )
    .await;

    assert!(mirror.choice_phase_active);
    assert!(!mirror.game_timer_running);
    assert_eq!(mirror.choice_timer, 6);
    assert_eq!(mirror.round_timer, 15);
    let phase = mirror.choice_phase_data.unwrap();
    assert_eq!(phase.active_players, vec!["u1", "u2"]);
    assert_eq!(phase.choice_timeout, Some(10));
    assert_eq!(phase.extra.get("bank"), Some(&json!(30)));
}

#[tokio::test]
async fn rounds_eliminations_and_statuses() {
    let mirror = mirror_after(
        vec![
            event_frame(
                "game_started",
                json!({"game_session": {"id": 1, "total_rounds": 5}, "players": []}),
            ),
            event_frame("round_updated", json!({"current_round": 3, "total_rounds": 5})),
            event_frame(
                "players_eliminated",
                json!({"eliminated_players": ["u2"], "round_number": 3, "remaining_count": 2}),
            ),
            event_frame(
                "player_status_update",
                json!({"statuses": [{"user_id": "u2", "status": "eliminated", "eliminated_in_round": 3}]}),
            ),
        ],
        EventName::PlayerStatusUpdate,
    )
    .await;

    assert_eq!(mirror.current_round, 3);
    assert_eq!(mirror.total_rounds, 5);
    assert_eq!(mirror.eliminated_players, vec!["u2"]);
    assert_eq!(mirror.player_statuses.len(), 1);
    assert_eq!(mirror.player_statuses[0].status, "eliminated");
    assert_eq!(mirror.player_statuses[0].eliminated_in_round, Some(3));
}

#[tokio::test]
async fn lobby_rosters_are_mirrored() {
    let mirror = mirror_after(
        vec![
            event_frame(
                "lobby_update",
                json!({"players": [{"user_id": "u1", "nickname": "ann", "is_active": true}], "count": 1}),
            ),
            event_frame(
                "admin_lobby_update",
                json!({"lobbies": [{"lobby_id": "main", "player_count": 1, "status": "waiting"}], "total_count": 1}),
            ),
        ],
        EventName::AdminLobbyUpdate,
    )
    .await;

    assert_eq!(
        mirror.lobby_players,
        vec![LobbyPlayer {
            user_id: "u1".into(),
            nickname: "ann".into(),
            is_active: true,
            ..LobbyPlayer::default()
        }]
    );
    assert_eq!(mirror.admin_lobbies[0].lobby_id, "main");
}

#[tokio::test]
async fn malformed_payload_falls_back_to_defaults() {
    let mut socket = test_socket();
    let mut ticks = watch(&socket, EventName::TimerUpdate);
    let (transport, _sent, _closed) = MockTransport::frames(session_script(&[
        event_frame("timer_update", json!({"time": 9})),
        event_frame("timer_update", json!({"time": "soon"})),
    ]));
    socket.connect(transport);
    next_event(&mut ticks).await;
    let GameEvent::TimerUpdate(fallback) = next_event(&mut ticks).await else {
        panic!("expected TimerUpdate");
    };
    assert_eq!(fallback.time, 0);
    assert_eq!(socket.mirror().await.global_timer, 0);
    socket.disconnect().await;
}

#[tokio::test]
async fn bad_sibling_field_keeps_round_timer_running() {
    let mirror = mirror_after(
        vec![event_frame(
            "game_timer_update",
            json!({"time": 7, "round_number": -1}),
        )],
        EventName::GameTimerUpdate,
    )
    .await;
    assert_eq!(mirror.round_timer, 7);
    assert!(mirror.game_timer_running);
}

// ════════════════════════════════════════════════════════════════════
// Callbacks
// ════════════════════════════════════════════════════════════════════

#[tokio::test]
async fn callbacks_run_in_registration_order_per_event() {
    let mut socket = test_socket();
    let log = Arc::new(StdMutex::new(Vec::new()));
    for label in ["a", "b", "c"] {
        let log = Arc::clone(&log);
        let _ = socket.subscribe(EventName::RoundUpdated, move |_| {
            log.lock().unwrap().push(label);
        });
    }
    let mut done = watch(&socket, EventName::RoundUpdated);

    let (transport, _sent, _closed) = MockTransport::frames(session_script(&[event_frame(
        "round_updated",
        json!({"current_round": 2, "total_rounds": 3}),
    )]));
    socket.connect(transport);
    next_event(&mut done).await;

    assert_eq!(*log.lock().unwrap(), vec!["a", "b", "c"]);
    socket.disconnect().await;
}

#[tokio::test]
async fn unsubscribed_callback_is_not_invoked() {
    let mut socket = test_socket();
    let hits = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&hits);
    let sub = socket.subscribe(EventName::TimerUpdate, move |_| {
        counter.fetch_add(1, Ordering::SeqCst);
    });
    let mut ticks = watch(&socket, EventName::TimerUpdate);
    let (transport, mut server) = ChannelTransport::pair();
    socket.connect(transport);
    server.handshake().await;

    server.push(event_frame("timer_update", json!({"time": 5})));
    next_event(&mut ticks).await;
    assert_eq!(hits.load(Ordering::SeqCst), 1);

    assert!(sub.unsubscribe());
    server.push(event_frame("timer_update", json!({"time": 4})));
    next_event(&mut ticks).await;
    assert_eq!(hits.load(Ordering::SeqCst), 1);

    socket.disconnect().await;
}

#[tokio::test]
async fn callbacks_survive_reconnect() {
    let mut socket = test_socket();
    let mut ticks = watch(&socket, EventName::TimerUpdate);

    let (first, mut first_server) = ChannelTransport::pair();
    socket.connect(first);
    first_server.handshake().await;
    first_server.push(event_frame("timer_update", json!({"time": 3})));
    next_event(&mut ticks).await;
    socket.disconnect().await;

    let (second, mut second_server) = ChannelTransport::pair();
    assert!(socket.connect(second));
    second_server.handshake().await;
    second_server.push(event_frame("timer_update", json!({"time": 2})));
    let GameEvent::TimerUpdate(timer) = next_event(&mut ticks).await else {
        panic!("expected TimerUpdate");
    };
    assert_eq!(timer.time, 2);

    socket.disconnect().await;
}

#[tokio::test]
async fn game_result_fans_out_to_finished_listeners() {
    let mut socket = test_socket();
    let mut results = watch(&socket, EventName::GameResult);
    let mut finished = watch(&socket, EventName::GameFinished);
    let (transport, _sent, _closed) = MockTransport::frames(session_script(&[event_frame(
        "game_result",
        json!({
            "winner_id": null,
            "game_finished": true,
            "no_winner": false,
            "split_bank": true,
            "split_winners": ["u1", "u2"],
            "coins_per_winner": 5,
            "bank_remainder": 1
        }),
    )]));
    socket.connect(transport);

    let GameEvent::GameResult(result) = next_event(&mut results).await else {
        panic!("expected GameResult");
    };
    assert_eq!(result.split_winners, vec!["u1", "u2"]);
    let GameEvent::GameFinished(done) = next_event(&mut finished).await else {
        panic!("expected GameFinished");
    };
    assert!(done.split_bank);
    assert_eq!(done.winner_id, None);

    let mirror = socket.mirror().await;
    assert!(mirror.game_finished);
    assert_eq!(mirror.game_result.unwrap().coins_per_winner, Some(5));
    socket.disconnect().await;
}

// ════════════════════════════════════════════════════════════════════
// Emits
// ════════════════════════════════════════════════════════════════════

#[tokio::test]
async fn emit_helpers_produce_socket_io_events() {
    let mut socket = test_socket();
    let mut connects = watch(&socket, EventName::Connect);
    let (transport, mut server) = ChannelTransport::pair();
    socket.connect(transport);
    server.handshake().await;
    next_event(&mut connects).await;

    assert!(socket.join_lobby("u1", "main"));
    assert_eq!(
        server.next_frame().await,
        r#"42["join_lobby",{"lobby_id":"main","user_id":"u1"}]"#
    );
    assert!(socket.leave_lobby("u1"));
    assert_eq!(server.next_frame().await, r#"42["leave_lobby",{"user_id":"u1"}]"#);
    assert!(socket.request_lobby());
    assert_eq!(server.next_frame().await, r#"42["request_lobby"]"#);
    assert!(socket.request_timer());
    assert_eq!(server.next_frame().await, r#"42["request_timer"]"#);
    assert!(socket.start_game("main"));
    assert_eq!(server.next_frame().await, r#"42["start_game",{"lobby_id":"main"}]"#);
    assert!(socket.emit("player_choice", Some(json!({"choice": "left"}))));
    assert_eq!(server.next_frame().await, r#"42["player_choice",{"choice":"left"}]"#);

    socket.disconnect().await;
    assert_eq!(server.next_frame().await, "41");
}

#[tokio::test]
async fn panicking_callback_keeps_the_connection_usable() {
    let mut socket = test_socket();
    let mut connects = watch(&socket, EventName::Connect);
    let _ = socket.subscribe(EventName::TimerUpdate, |_| panic!("subscriber bug"));
    let mut ticks = watch(&socket, EventName::TimerUpdate);
    let (transport, mut server) = ChannelTransport::pair();
    socket.connect(transport);
    server.handshake().await;
    next_event(&mut connects).await;

    server.push(event_frame("timer_update", json!({"time": 6})));
    next_event(&mut ticks).await;
    server.push(event_frame("timer_update", json!({"time": 5})));
    next_event(&mut ticks).await;

    assert!(socket.is_connected());
    assert_eq!(socket.mirror().await.global_timer, 5);
    assert!(socket.request_timer());
    assert_eq!(server.next_frame().await, r#"42["request_timer"]"#);

    socket.disconnect().await;
    assert_eq!(server.next_frame().await, "41");
    assert!(!socket.is_connected());

    // A fresh connection is accepted after the panic.
    let (transport, mut server) = ChannelTransport::pair();
    assert!(socket.connect(transport));
    server.handshake().await;
    next_event(&mut connects).await;
    assert!(socket.is_connected());
    socket.disconnect().await;
}

#[tokio::test]
async fn emit_while_disconnected_never_reaches_transport() {
    let socket = test_socket();
    assert!(!socket.emit("request_lobby", None));
    assert!(!socket.join_lobby("u1", "main"));
    assert!(!socket.is_connected());
}

#[tokio::test]
async fn server_answers_heartbeat_with_pong() {
    let mut socket = test_socket();
    let (transport, mut server) = ChannelTransport::pair();
    socket.connect(transport);
    server.handshake().await;

    server.push("2");
    assert_eq!(server.next_frame().await, "3");

    socket.disconnect().await;
}

// ════════════════════════════════════════════════════════════════════
// Connection lifecycle
// ════════════════════════════════════════════════════════════════════

#[tokio::test]
async fn connect_twice_while_connected_is_a_no_op() {
    let mut socket = test_socket();
    let mut connects = watch(&socket, EventName::Connect);
    let (transport, mut server) = ChannelTransport::pair();
    assert!(socket.connect(transport));
    server.handshake().await;
    next_event(&mut connects).await;

    let (other, _other_sent, _closed) = MockTransport::frames(session_script(&[]));
    assert!(!socket.connect(other));
    assert!(socket.is_connected());

    // The original connection still carries emits.
    assert!(socket.request_timer());
    assert_eq!(server.next_frame().await, r#"42["request_timer"]"#);

    socket.disconnect().await;
}

#[tokio::test]
async fn server_hang_up_reports_transport_close() {
    let mut socket = test_socket();
    let mut connects = watch(&socket, EventName::Connect);
    let mut disconnects = watch(&socket, EventName::Disconnect);
    let (transport, mut server) = ChannelTransport::pair();
    socket.connect(transport);
    server.handshake().await;
    next_event(&mut connects).await;

    server.hang_up();

    assert_eq!(
        next_event(&mut disconnects).await,
        GameEvent::Disconnected {
            reason: Some("transport close".into())
        }
    );
    assert!(!socket.is_connected());
    assert!(!socket.request_lobby());
}

#[tokio::test]
async fn lifecycle_names_sent_as_events_are_ignored() {
    let mut socket = test_socket();
    let mut connects = watch(&socket, EventName::Connect);
    let mut disconnects = watch(&socket, EventName::Disconnect);
    let mut ticks = watch(&socket, EventName::TimerUpdate);
    let (transport, mut server) = ChannelTransport::pair();
    socket.connect(transport);
    server.handshake().await;
    next_event(&mut connects).await;

    server.push(r#"42["disconnect","server namespace disconnect"]"#);
    server.push(r#"42["connect"]"#);
    server.push(event_frame("timer_update", json!({"time": 3})));
    next_event(&mut ticks).await;

    assert!(disconnects.try_recv().is_err());
    assert!(connects.try_recv().is_err());
    assert!(socket.is_connected());
    socket.disconnect().await;
}

#[tokio::test]
async fn transport_error_before_ack_is_a_connect_error() {
    let mut socket = test_socket();
    let mut errors = watch(&socket, EventName::ConnectError);
    let (transport, _sent, closed) = MockTransport::new(vec![
        Some(Ok(common::open_frame())),
        Some(Err(PartyClientError::TransportReceive("reset by peer".into()))),
    ]);
    socket.connect(transport);

    let GameEvent::ConnectError { message } = next_event(&mut errors).await else {
        panic!("expected ConnectError");
    };
    assert!(message.contains("reset by peer"), "got {message}");
    assert!(!socket.is_connected());
    assert!(!closed.load(Ordering::Relaxed));
}

#[tokio::test]
async fn server_error_event_is_reported_as_connect_error() {
    let mut socket = test_socket();
    let mut errors = watch(&socket, EventName::ConnectError);
    let (transport, _sent, _closed) = MockTransport::frames(session_script(&[event_frame(
        "error",
        json!({"message": "Lobby is full"}),
    )]));
    socket.connect(transport);

    assert_eq!(
        next_event(&mut errors).await,
        GameEvent::ConnectError {
            message: "Lobby is full".into()
        }
    );
    // An error event does not end the connection.
    tokio::time::sleep(Duration::from_millis(20)).await;
    assert!(socket.is_connected());
    socket.disconnect().await;
}

#[cfg(feature = "transport-websocket")]
#[tokio::test]
async fn connect_websocket_failure_is_reported() {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let mut socket = party_game_client::GameSocket::new(
        party_game_client::SocketConfig::new(format!(
            "ws://{addr}/socket.io/?EIO=4&transport=websocket"
        ))
        .with_connect_timeout(Duration::from_millis(500)),
    );
    let mut errors = watch(&socket, EventName::ConnectError);

    assert!(!socket.connect_websocket().await);
    assert!(matches!(
        next_event(&mut errors).await,
        GameEvent::ConnectError { .. }
    ));
    assert!(!socket.is_connected());
}
