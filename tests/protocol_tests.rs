#![allow(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::panic,
    clippy::todo,
    clippy::unimplemented,
    clippy::indexing_slicing
)]
//! Wire-format tests for the party game client.
//!
//! Feeds frames shaped like the game server's real output through the
//! frame decoder and the event model, and checks client frames against
//! what a Socket.IO v5 server expects.

use party_game_client::event::{EventName, GameEvent};
use party_game_client::protocol::{decode, EnginePacket, SocketPacket};
use serde_json::json;

/// Decode a full `42[...]` frame into a game event.
fn event_from_frame(frame: &str) -> GameEvent {
    let EnginePacket::Message(SocketPacket::Event { name, data, .. }) = decode(frame).unwrap()
    else {
        panic!("not an event frame: {frame}");
    };
    GameEvent::from_wire(&name, data).unwrap()
}

// ════════════════════════════════════════════════════════════════════
// Server fixtures
// ════════════════════════════════════════════════════════════════════

#[test]
fn game_started_fixture() {
    let frame = r#"42["game_started",{"game_session":{"id":12,"lobby_id":"main","status":"active","current_round":1,"total_rounds":3,"started_at":"2025-05-01T10:00:00","finished_at":null,"winner_id":null,"initial_bank":40},"players":[{"lobby_id":"main","user_id":"u1","nickname":"ann","joined_at":"2025-05-01T09:58:12","is_active":true,"is_admin":false,"is_observer":false}]}]"#;

    let GameEvent::GameStarted(started) = event_from_frame(frame) else {
        panic!("expected GameStarted");
    };
    let session = started.game_session.unwrap();
    assert_eq!(session.id, 12);
    assert_eq!(session.total_rounds, 3);
    assert_eq!(session.finished_at, None);
    assert_eq!(session.initial_bank, 40);
    assert_eq!(started.players[0].nickname, "ann");
    assert!(!started.players[0].is_ready);
}

#[test]
fn game_result_fixture_with_statistics() {
    let frame = r#"42["game_result",{"winner_id":"u1","game_session":{"id":12,"lobby_id":"main","status":"finished","current_round":3,"total_rounds":3,"started_at":"2025-05-01T10:00:00","finished_at":"2025-05-01T10:03:00","winner_id":"u1","initial_bank":40},"player_statistics":[{"id":1,"game_session_id":12,"user_id":"u1","status":"winner","eliminated_in_round":null,"quit_in_round":null,"total_coins_earned":40,"created_at":"2025-05-01T10:00:00"},{"id":2,"game_session_id":12,"user_id":"u2","status":"eliminated","eliminated_in_round":2,"quit_in_round":null,"total_coins_earned":0,"created_at":"2025-05-01T10:00:00"}],"game_finished":true}]"#;

    let GameEvent::GameResult(result) = event_from_frame(frame) else {
        panic!("expected GameResult");
    };
    assert_eq!(result.winner_id.as_deref(), Some("u1"));
    assert!(result.game_finished);
    assert!(!result.split_bank);
    assert_eq!(result.player_statistics.len(), 2);
    assert_eq!(result.player_statistics[0].total_coins_earned, 40);
    assert_eq!(result.player_statistics[1].eliminated_in_round, Some(2));
}

#[test]
fn split_bank_game_finished_fixture() {
    let event = event_from_frame(r#"42["game_finished",{"winner_id":null,"split_bank":true}]"#);
    let GameEvent::GameFinished(finished) = event else {
        panic!("expected GameFinished");
    };
    assert_eq!(finished.winner_id, None);
    assert!(finished.split_bank);
    assert!(!finished.no_winner);
}

#[test]
fn timer_fixtures_carry_round_context() {
    let event = event_from_frame(
        r#"42["game_timer_update",{"time":11,"game_session_id":12,"round_number":2}]"#,
    );
    let GameEvent::GameTimerUpdate(timer) = event else {
        panic!("expected GameTimerUpdate");
    };
    assert_eq!(timer.time, 11);
    assert_eq!(timer.game_session_id, Some(12));
    assert_eq!(timer.round_number, Some(2));

    let event = event_from_frame(r#"42["timer_update",{"time":10}]"#);
    assert_eq!(event.name(), EventName::TimerUpdate);
}

#[test]
fn namespaced_and_acked_events_decode() {
    let event = event_from_frame(r#"42/game,7["round_updated",{"current_round":2,"total_rounds":3}]"#);
    let GameEvent::RoundUpdated(round) = event else {
        panic!("expected RoundUpdated");
    };
    assert_eq!(round.current_round, Some(2));
}

#[test]
fn unknown_event_names_are_not_game_events() {
    let EnginePacket::Message(SocketPacket::Event { name, data, .. }) =
        decode(r#"42["chat_message",{"text":"hi"}]"#).unwrap()
    else {
        panic!("expected event");
    };
    assert_eq!(GameEvent::from_wire(&name, data), None);
}

#[test]
fn every_event_name_maps_back_to_itself() {
    for name in EventName::ALL {
        assert_eq!(EventName::from_wire(name.as_str()), Some(name), "{name}");
    }
    assert_eq!(EventName::from_wire("error"), Some(EventName::ConnectError));
}

// ════════════════════════════════════════════════════════════════════
// Client frames
// ════════════════════════════════════════════════════════════════════

#[test]
fn client_event_frames_match_socket_io_format() {
    let frame = EnginePacket::event("start_game", Some(json!({"lobby_id": "main"})))
        .encode()
        .unwrap();
    assert_eq!(frame, r#"42["start_game",{"lobby_id":"main"}]"#);

    let frame = EnginePacket::event("request_timer", None).encode().unwrap();
    assert_eq!(frame, r#"42["request_timer"]"#);
}

#[test]
fn binary_packets_are_rejected() {
    assert!(decode(r#"451-["upload",{"_placeholder":true,"num":0}]"#).is_err());
    assert!(decode("b4AQID").is_err());
}
