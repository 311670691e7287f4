//! Typed server events and their payloads.
//!
//! The server pushes a fixed set of named Socket.IO events. [`EventName`]
//! enumerates them and [`GameEvent`] carries each one with a typed payload.
//! Every payload field is defaulted, so a missing list decodes as empty and
//! a missing number as zero. A field of the wrong shape decodes as its own
//! default without disturbing its siblings, and a payload that is not an
//! object at all decodes as the all-default value instead of being rejected.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

// ── Event names ─────────────────────────────────────────────────────

/// The events the client reacts to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum EventName {
    /// The Socket.IO namespace connection was acknowledged.
    Connect,
    /// The connection was lost or closed.
    Disconnect,
    /// The connection attempt failed or the server reported an error.
    ConnectError,
    /// Lobby countdown tick (`timer_update`).
    TimerUpdate,
    /// A round timer started (`game_timer_start`).
    GameTimerStart,
    /// Round timer tick (`game_timer_update`).
    GameTimerUpdate,
    ChoicePhaseStarted,
    ChoiceTimerStart,
    ChoiceTimerUpdate,
    PlayersEliminated,
    RoundUpdated,
    GameStarted,
    GameResult,
    GameFinished,
    LobbyUpdate,
    AdminLobbyUpdate,
    PlayerStatusUpdate,
}

impl EventName {
    /// Every event name, in wire-table order.
    pub const ALL: [EventName; 17] = [
        Self::Connect,
        Self::Disconnect,
        Self::ConnectError,
        Self::TimerUpdate,
        Self::GameTimerStart,
        Self::GameTimerUpdate,
        Self::ChoicePhaseStarted,
        Self::ChoiceTimerStart,
        Self::ChoiceTimerUpdate,
        Self::PlayersEliminated,
        Self::RoundUpdated,
        Self::GameStarted,
        Self::GameResult,
        Self::GameFinished,
        Self::LobbyUpdate,
        Self::AdminLobbyUpdate,
        Self::PlayerStatusUpdate,
    ];

    /// The Socket.IO event name.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Connect => "connect",
            Self::Disconnect => "disconnect",
            Self::ConnectError => "connect_error",
            Self::TimerUpdate => "timer_update",
            Self::GameTimerStart => "game_timer_start",
            Self::GameTimerUpdate => "game_timer_update",
            Self::ChoicePhaseStarted => "choice_phase_started",
            Self::ChoiceTimerStart => "choice_timer_start",
            Self::ChoiceTimerUpdate => "choice_timer_update",
            Self::PlayersEliminated => "players_eliminated",
            Self::RoundUpdated => "round_updated",
            Self::GameStarted => "game_started",
            Self::GameResult => "game_result",
            Self::GameFinished => "game_finished",
            Self::LobbyUpdate => "lobby_update",
            Self::AdminLobbyUpdate => "admin_lobby_update",
            Self::PlayerStatusUpdate => "player_status_update",
        }
    }

    /// Look up a Socket.IO event name. The server's generic `error` event
    /// maps to [`EventName::ConnectError`].
    pub fn from_wire(name: &str) -> Option<Self> {
        if name == "error" {
            return Some(Self::ConnectError);
        }
        Self::ALL.into_iter().find(|event| event.as_str() == name)
    }
}

impl std::fmt::Display for EventName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ── Shared records ──────────────────────────────────────────────────

/// A player's row in a lobby, as broadcast by the server.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LobbyPlayer {
    #[serde(deserialize_with = "or_default")]
    pub lobby_id: String,
    #[serde(deserialize_with = "or_default")]
    pub user_id: String,
    #[serde(deserialize_with = "or_default")]
    pub nickname: String,
    #[serde(deserialize_with = "or_default")]
    pub joined_at: String,
    #[serde(deserialize_with = "or_default")]
    pub is_active: bool,
    #[serde(deserialize_with = "or_default")]
    pub is_admin: bool,
    #[serde(deserialize_with = "or_default")]
    pub is_observer: bool,
    #[serde(deserialize_with = "or_default")]
    pub is_ready: bool,
}

/// Per-player standing within a game session.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlayerStatus {
    #[serde(deserialize_with = "or_default")]
    pub id: i64,
    #[serde(deserialize_with = "or_default")]
    pub game_session_id: i64,
    #[serde(deserialize_with = "or_default")]
    pub user_id: String,
    /// `active`, `eliminated`, `quit` or `winner`.
    #[serde(deserialize_with = "or_default")]
    pub status: String,
    #[serde(deserialize_with = "or_default")]
    pub eliminated_in_round: Option<u32>,
    #[serde(deserialize_with = "or_default")]
    pub quit_in_round: Option<u32>,
    #[serde(deserialize_with = "or_default")]
    pub total_coins_earned: i64,
    #[serde(deserialize_with = "or_default")]
    pub created_at: String,
}

/// Summary of a game session.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GameSessionInfo {
    #[serde(deserialize_with = "or_default")]
    pub id: i64,
    #[serde(deserialize_with = "or_default")]
    pub lobby_id: String,
    #[serde(deserialize_with = "or_default")]
    pub status: String,
    #[serde(deserialize_with = "or_default")]
    pub current_round: u32,
    #[serde(deserialize_with = "or_default")]
    pub total_rounds: u32,
    #[serde(deserialize_with = "or_default")]
    pub started_at: Option<String>,
    #[serde(deserialize_with = "or_default")]
    pub finished_at: Option<String>,
    #[serde(deserialize_with = "or_default")]
    pub winner_id: Option<String>,
    #[serde(deserialize_with = "or_default")]
    pub initial_bank: i64,
}

/// One lobby in the admin overview.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LobbySummary {
    #[serde(deserialize_with = "or_default")]
    pub lobby_id: String,
    #[serde(deserialize_with = "or_default")]
    pub player_count: u32,
    #[serde(deserialize_with = "or_default")]
    pub status: String,
}

// ── Payloads ────────────────────────────────────────────────────────

/// Payload of every timer event.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TimerPayload {
    /// Seconds remaining.
    #[serde(deserialize_with = "or_default")]
    pub time: i64,
    #[serde(deserialize_with = "or_default")]
    pub game_session_id: Option<i64>,
    #[serde(deserialize_with = "or_default")]
    pub round_number: Option<u32>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChoicePhasePayload {
    #[serde(deserialize_with = "or_default")]
    pub game_session_id: Option<i64>,
    #[serde(deserialize_with = "or_default")]
    pub round_number: Option<u32>,
    /// Players still in the game who must choose to stay or leave.
    #[serde(deserialize_with = "or_default")]
    pub active_players: Vec<String>,
    /// Seconds allowed for the choice.
    #[serde(deserialize_with = "or_default")]
    pub choice_timeout: Option<i64>,
    /// Fields sent by the server that are not modelled above, kept as-is.
    #[serde(flatten)]
    pub extra: serde_json::Map<String, Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EliminationPayload {
    #[serde(deserialize_with = "or_default")]
    pub eliminated_players: Vec<String>,
    #[serde(deserialize_with = "or_default")]
    pub round_number: Option<u32>,
    #[serde(deserialize_with = "or_default")]
    pub remaining_count: Option<u32>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RoundPayload {
    #[serde(deserialize_with = "or_default")]
    pub game_session_id: Option<i64>,
    #[serde(deserialize_with = "or_default")]
    pub current_round: Option<u32>,
    #[serde(deserialize_with = "or_default")]
    pub total_rounds: Option<u32>,
    #[serde(deserialize_with = "or_default")]
    pub active_players: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GameStartedPayload {
    #[serde(deserialize_with = "or_default")]
    pub game_session: Option<GameSessionInfo>,
    #[serde(deserialize_with = "or_default")]
    pub players: Vec<LobbyPlayer>,
}

/// Final standings. Exactly one of a single winner, a split bank or no
/// winner applies.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GameResultPayload {
    #[serde(deserialize_with = "or_default")]
    pub winner_id: Option<String>,
    #[serde(deserialize_with = "or_default")]
    pub game_session: Option<GameSessionInfo>,
    #[serde(deserialize_with = "or_default")]
    pub player_statistics: Vec<PlayerStatus>,
    #[serde(deserialize_with = "or_default")]
    pub game_finished: bool,
    #[serde(deserialize_with = "or_default")]
    pub no_winner: bool,
    #[serde(deserialize_with = "or_default")]
    pub split_bank: bool,
    /// Players sharing the bank when `split_bank` is set.
    #[serde(deserialize_with = "or_default")]
    pub split_winners: Vec<String>,
    #[serde(deserialize_with = "or_default")]
    pub coins_per_winner: Option<i64>,
    #[serde(deserialize_with = "or_default")]
    pub bank_remainder: Option<i64>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GameFinishedPayload {
    #[serde(deserialize_with = "or_default")]
    pub winner_id: Option<String>,
    #[serde(deserialize_with = "or_default")]
    pub no_winner: bool,
    #[serde(deserialize_with = "or_default")]
    pub split_bank: bool,
}

impl From<&GameResultPayload> for GameFinishedPayload {
    fn from(result: &GameResultPayload) -> Self {
        Self {
            winner_id: result.winner_id.clone(),
            no_winner: result.no_winner,
            split_bank: result.split_bank,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LobbyPayload {
    #[serde(deserialize_with = "or_default")]
    pub players: Vec<LobbyPlayer>,
    #[serde(deserialize_with = "or_default")]
    pub count: u32,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AdminLobbyPayload {
    #[serde(deserialize_with = "or_default")]
    pub lobbies: Vec<LobbySummary>,
    #[serde(deserialize_with = "or_default")]
    pub total_count: u32,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlayerStatusPayload {
    #[serde(deserialize_with = "or_default")]
    pub statuses: Vec<PlayerStatus>,
}

// ── GameEvent ───────────────────────────────────────────────────────

/// A decoded event, delivered to subscribers of its [`EventName`].
#[derive(Debug, Clone, PartialEq)]
pub enum GameEvent {
    Connected,
    Disconnected { reason: Option<String> },
    ConnectError { message: String },
    TimerUpdate(TimerPayload),
    GameTimerStart(TimerPayload),
    GameTimerUpdate(TimerPayload),
    ChoicePhaseStarted(ChoicePhasePayload),
    ChoiceTimerStart(TimerPayload),
    ChoiceTimerUpdate(TimerPayload),
    PlayersEliminated(EliminationPayload),
    RoundUpdated(RoundPayload),
    GameStarted(GameStartedPayload),
    GameResult(GameResultPayload),
    GameFinished(GameFinishedPayload),
    LobbyUpdate(LobbyPayload),
    AdminLobbyUpdate(AdminLobbyPayload),
    PlayerStatusUpdate(PlayerStatusPayload),
}

impl GameEvent {
    /// The name subscribers register under.
    pub fn name(&self) -> EventName {
        match self {
            Self::Connected => EventName::Connect,
            Self::Disconnected { .. } => EventName::Disconnect,
            Self::ConnectError { .. } => EventName::ConnectError,
            Self::TimerUpdate(_) => EventName::TimerUpdate,
            Self::GameTimerStart(_) => EventName::GameTimerStart,
            Self::GameTimerUpdate(_) => EventName::GameTimerUpdate,
            Self::ChoicePhaseStarted(_) => EventName::ChoicePhaseStarted,
            Self::ChoiceTimerStart(_) => EventName::ChoiceTimerStart,
            Self::ChoiceTimerUpdate(_) => EventName::ChoiceTimerUpdate,
            Self::PlayersEliminated(_) => EventName::PlayersEliminated,
            Self::RoundUpdated(_) => EventName::RoundUpdated,
            Self::GameStarted(_) => EventName::GameStarted,
            Self::GameResult(_) => EventName::GameResult,
            Self::GameFinished(_) => EventName::GameFinished,
            Self::LobbyUpdate(_) => EventName::LobbyUpdate,
            Self::AdminLobbyUpdate(_) => EventName::AdminLobbyUpdate,
            Self::PlayerStatusUpdate(_) => EventName::PlayerStatusUpdate,
        }
    }

    /// Build an event from a Socket.IO event name and its payload.
    ///
    /// Returns `None` for names outside the game's event set. Connection
    /// lifecycle names decode to their lifecycle variants; the socket only
    /// reports those from the handshake packets, never from server events.
    pub fn from_wire(name: &str, data: Option<Value>) -> Option<Self> {
        let data = data.unwrap_or(Value::Null);
        let event = match EventName::from_wire(name)? {
            EventName::Connect => Self::Connected,
            EventName::Disconnect => Self::Disconnected {
                reason: data.as_str().map(str::to_owned),
            },
            EventName::ConnectError => Self::ConnectError {
                message: error_message(&data),
            },
            EventName::TimerUpdate => Self::TimerUpdate(lenient(name, data)),
            EventName::GameTimerStart => Self::GameTimerStart(lenient(name, data)),
            EventName::GameTimerUpdate => Self::GameTimerUpdate(lenient(name, data)),
            EventName::ChoicePhaseStarted => Self::ChoicePhaseStarted(lenient(name, data)),
            EventName::ChoiceTimerStart => Self::ChoiceTimerStart(lenient(name, data)),
            EventName::ChoiceTimerUpdate => Self::ChoiceTimerUpdate(lenient(name, data)),
            EventName::PlayersEliminated => Self::PlayersEliminated(lenient(name, data)),
            EventName::RoundUpdated => Self::RoundUpdated(lenient(name, data)),
            EventName::GameStarted => Self::GameStarted(lenient(name, data)),
            EventName::GameResult => Self::GameResult(lenient(name, data)),
            EventName::GameFinished => Self::GameFinished(lenient(name, data)),
            EventName::LobbyUpdate => Self::LobbyUpdate(lenient(name, data)),
            EventName::AdminLobbyUpdate => Self::AdminLobbyUpdate(lenient(name, data)),
            EventName::PlayerStatusUpdate => Self::PlayerStatusUpdate(lenient(name, data)),
        };
        Some(event)
    }
}

/// Decode one field, falling back to its default when the value has the
/// wrong shape. Sibling fields are unaffected.
fn or_default<'de, D, T>(deserializer: D) -> std::result::Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned + Default,
{
    let value = Value::deserialize(deserializer)?;
    Ok(serde_json::from_value(value).unwrap_or_default())
}

/// Decode a payload, falling back to the all-default value when it is not
/// an object.
fn lenient<T: DeserializeOwned + Default>(name: &str, data: Value) -> T {
    match serde_json::from_value(data) {
        Ok(payload) => payload,
        Err(e) => {
            tracing::warn!(event = name, "malformed payload, using defaults: {e}");
            T::default()
        }
    }
}

/// Human-readable text of an error payload (`"msg"` or `{"message": "msg"}`).
pub(crate) fn error_message(data: &Value) -> String {
    match data {
        Value::String(text) => text.clone(),
        Value::Object(map) => map
            .get("message")
            .and_then(Value::as_str)
            .map(str::to_owned)
            .unwrap_or_else(|| data.to_string()),
        Value::Null => "unknown error".to_string(),
        other => other.to_string(),
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
    use serde_json::json;

    #[test]
    fn wire_names_are_unique_and_reversible() {
        for name in EventName::ALL {
            assert_eq!(EventName::from_wire(name.as_str()), Some(name));
        }
        let mut names: Vec<_> = EventName::ALL.iter().map(|n| n.as_str()).collect();
        names.sort_unstable();
        names.dedup();
        assert_eq!(names.len(), EventName::ALL.len());
    }

    #[test]
    fn server_error_event_maps_to_connect_error() {
        let event = GameEvent::from_wire("error", Some(json!({"message": "boom"}))).unwrap();
        assert_eq!(
            event,
            GameEvent::ConnectError {
                message: "boom".into()
            }
        );
    }

    #[test]
    fn unknown_names_are_not_game_events() {
        assert!(GameEvent::from_wire("chat_message", Some(json!({}))).is_none());
    }

    #[test]
    fn missing_fields_fall_back_to_defaults() {
        let event = GameEvent::from_wire("players_eliminated", Some(json!({}))).unwrap();
        let GameEvent::PlayersEliminated(payload) = event else {
            panic!("wrong variant");
        };
        assert!(payload.eliminated_players.is_empty());
        assert_eq!(payload.round_number, None);
    }

    #[test]
    fn malformed_field_only_resets_itself() {
        let event = GameEvent::from_wire(
            "game_timer_update",
            Some(json!({"time": 7, "round_number": -1, "game_session_id": 3})),
        )
        .unwrap();
        assert_eq!(
            event,
            GameEvent::GameTimerUpdate(TimerPayload {
                time: 7,
                game_session_id: Some(3),
                round_number: None,
            })
        );

        let event = GameEvent::from_wire(
            "lobby_update",
            Some(json!({
                "players": [{"user_id": "u1", "nickname": "ann", "is_ready": "yes"}],
                "count": "one"
            })),
        )
        .unwrap();
        let GameEvent::LobbyUpdate(lobby) = event else {
            panic!("wrong variant");
        };
        assert_eq!(lobby.count, 0);
        assert_eq!(lobby.players.len(), 1);
        assert_eq!(lobby.players[0].nickname, "ann");
        assert!(!lobby.players[0].is_ready);
    }

    #[test]
    fn choice_phase_keeps_unmodelled_fields() {
        let event = GameEvent::from_wire(
            "choice_phase_started",
            Some(json!({
                "round_number": 2,
                "active_players": ["u1"],
                "bank": 12,
                "options": ["stay", "leave"]
            })),
        )
        .unwrap();
        let GameEvent::ChoicePhaseStarted(phase) = event else {
            panic!("wrong variant");
        };
        assert_eq!(phase.round_number, Some(2));
        assert_eq!(phase.extra.get("bank"), Some(&json!(12)));
        assert_eq!(phase.extra.get("options"), Some(&json!(["stay", "leave"])));
        assert!(!phase.extra.contains_key("round_number"));
    }

    #[test]
    fn non_object_payload_falls_back_to_defaults() {
        let event = GameEvent::from_wire("game_timer_update", Some(json!("seven"))).unwrap();
        assert_eq!(event, GameEvent::GameTimerUpdate(TimerPayload::default()));

        let event = GameEvent::from_wire("player_status_update", None).unwrap();
        assert_eq!(
            event,
            GameEvent::PlayerStatusUpdate(PlayerStatusPayload::default())
        );
    }

    #[test]
    fn game_result_decodes_split_bank() {
        let event = GameEvent::from_wire(
            "game_result",
            Some(json!({
                "winner_id": null,
                "split_winners": ["a", "b"],
                "coins_per_winner": 3,
                "bank_remainder": 1,
                "game_session": {"id": 5, "lobby_id": "main", "status": "finished", "total_rounds": 3},
                "player_statistics": [{"user_id": "a", "status": "winner", "total_coins_earned": 4}],
                "game_finished": true,
                "split_bank": true
            })),
        )
        .unwrap();
        let GameEvent::GameResult(result) = event else {
            panic!("wrong variant");
        };
        assert!(result.split_bank);
        assert_eq!(result.split_winners, vec!["a", "b"]);
        assert_eq!(result.game_session.unwrap().total_rounds, 3);
        assert_eq!(result.player_statistics[0].total_coins_earned, 4);

        let finished = GameFinishedPayload::from(&GameResultPayload {
            winner_id: Some("w".into()),
            ..Default::default()
        });
        assert_eq!(finished.winner_id.as_deref(), Some("w"));
    }

    #[test]
    fn every_event_reports_its_own_name() {
        for name in EventName::ALL {
            let event = GameEvent::from_wire(name.as_str(), Some(json!({}))).unwrap();
            assert_eq!(event.name(), name);
        }
    }
}
