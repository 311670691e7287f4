//! Live mirror of the server's game state.
//!
//! [`GameMirror`] holds the values the UI observes: timers, the choice
//! phase, eliminations, round counters, player statuses and lobby rosters.
//! [`GameMirror::apply`] folds one [`GameEvent`] into it. Values are
//! overwritten verbatim by each event of their kind; there is no local
//! countdown and no ordering beyond last write wins.

use crate::event::{
    ChoicePhasePayload, GameEvent, GameResultPayload, LobbyPlayer, LobbySummary, PlayerStatus,
};

const DEFAULT_LOBBY_TIMER: i64 = 10;
const DEFAULT_ROUND_TIMER: i64 = 15;
const DEFAULT_CHOICE_TIMER: i64 = 10;

/// Snapshot of the observable game state.
#[derive(Debug, Clone, PartialEq)]
pub struct GameMirror {
    /// Lobby countdown (`timer_update`).
    pub global_timer: i64,
    /// Round countdown, mirrored from the game timer events.
    pub round_timer: i64,
    pub game_timer: i64,
    pub game_timer_running: bool,
    pub choice_timer: i64,
    pub choice_phase_active: bool,
    pub choice_phase_data: Option<ChoicePhasePayload>,
    pub game_finished: bool,
    pub game_winner: Option<String>,
    pub game_result: Option<GameResultPayload>,
    pub eliminated_players: Vec<String>,
    pub current_round: u32,
    pub total_rounds: u32,
    pub player_statuses: Vec<PlayerStatus>,
    pub lobby_players: Vec<LobbyPlayer>,
    pub admin_lobbies: Vec<LobbySummary>,
}

impl Default for GameMirror {
    fn default() -> Self {
        Self {
            global_timer: DEFAULT_LOBBY_TIMER,
            round_timer: DEFAULT_ROUND_TIMER,
            game_timer: DEFAULT_LOBBY_TIMER,
            game_timer_running: false,
            choice_timer: DEFAULT_CHOICE_TIMER,
            choice_phase_active: false,
            choice_phase_data: None,
            game_finished: false,
            game_winner: None,
            game_result: None,
            eliminated_players: Vec::new(),
            current_round: 1,
            total_rounds: 1,
            player_statuses: Vec::new(),
            lobby_players: Vec::new(),
            admin_lobbies: Vec::new(),
        }
    }
}

impl GameMirror {
    /// Fold one event into the mirror.
    ///
    /// Connection lifecycle events leave the mirror untouched; the
    /// connected flag lives on the socket.
    pub fn apply(&mut self, event: &GameEvent) {
        match event {
            GameEvent::Connected
            | GameEvent::Disconnected { .. }
            | GameEvent::ConnectError { .. } => {}
            GameEvent::TimerUpdate(timer) => {
                self.global_timer = timer.time;
            }
            GameEvent::GameTimerStart(timer) => {
                self.round_timer = timer.time;
                self.game_timer = timer.time;
                self.game_timer_running = true;
                self.choice_phase_active = false;
            }
            GameEvent::GameTimerUpdate(timer) => {
                self.round_timer = timer.time;
                self.game_timer = timer.time;
                self.game_timer_running = timer.time > 0;
            }
            GameEvent::ChoicePhaseStarted(phase) => {
                self.choice_phase_active = true;
                self.choice_phase_data = Some(phase.clone());
                self.game_timer_running = false;
            }
            GameEvent::ChoiceTimerStart(timer) => {
                self.choice_timer = timer.time;
                self.choice_phase_active = true;
            }
            GameEvent::ChoiceTimerUpdate(timer) => {
                self.choice_timer = timer.time;
            }
            GameEvent::PlayersEliminated(elimination) => {
                self.eliminated_players = elimination.eliminated_players.clone();
            }
            GameEvent::RoundUpdated(round) => {
                // Zero means "not reported" on the wire.
                self.current_round = round.current_round.filter(|&n| n > 0).unwrap_or(1);
                self.total_rounds = round.total_rounds.filter(|&n| n > 0).unwrap_or(1);
            }
            GameEvent::GameStarted(started) => {
                self.choice_phase_active = false;
                self.eliminated_players.clear();
                self.current_round = 1;
                if let Some(session) = &started.game_session {
                    self.total_rounds = if session.total_rounds > 0 {
                        session.total_rounds
                    } else {
                        1
                    };
                }
            }
            GameEvent::GameResult(result) => {
                self.game_result = Some(result.clone());
                self.finish(result.winner_id.clone());
            }
            GameEvent::GameFinished(finished) => {
                self.finish(finished.winner_id.clone());
            }
            GameEvent::LobbyUpdate(lobby) => {
                self.lobby_players = lobby.players.clone();
            }
            GameEvent::AdminLobbyUpdate(admin) => {
                self.admin_lobbies = admin.lobbies.clone();
            }
            GameEvent::PlayerStatusUpdate(update) => {
                self.player_statuses = update.statuses.clone();
            }
        }
    }

    fn finish(&mut self, winner_id: Option<String>) {
        self.game_finished = true;
        self.game_winner = winner_id;
        self.choice_phase_active = false;
        self.game_timer_running = false;
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
    use crate::event::{
        AdminLobbyPayload, EliminationPayload, GameFinishedPayload, GameSessionInfo,
        GameStartedPayload, LobbyPayload, PlayerStatusPayload, RoundPayload, TimerPayload,
    };

    fn timer(time: i64) -> TimerPayload {
        TimerPayload {
            time,
            ..Default::default()
        }
    }

    /// Apply `event` to a default mirror and return it alongside the default.
    fn applied(event: GameEvent) -> (GameMirror, GameMirror) {
        let before = GameMirror::default();
        let mut after = before.clone();
        after.apply(&event);
        (before, after)
    }

    #[test]
    fn defaults_match_server_initial_values() {
        let mirror = GameMirror::default();
        assert_eq!(mirror.global_timer, 10);
        assert_eq!(mirror.round_timer, 15);
        assert_eq!(mirror.choice_timer, 10);
        assert_eq!(mirror.current_round, 1);
        assert_eq!(mirror.total_rounds, 1);
        assert!(!mirror.game_finished);
    }

    #[test]
    fn lifecycle_events_touch_nothing() {
        for event in [
            GameEvent::Connected,
            GameEvent::Disconnected { reason: None },
            GameEvent::ConnectError {
                message: "refused".into(),
            },
        ] {
            let (before, after) = applied(event);
            assert_eq!(before, after);
        }
    }

    #[test]
    fn timer_update_sets_only_global_timer() {
        let (before, after) = applied(GameEvent::TimerUpdate(timer(4)));
        assert_eq!(
            after,
            GameMirror {
                global_timer: 4,
                ..before
            }
        );
    }

    #[test]
    fn game_timer_update_tracks_running_flag() {
        let mut mirror = GameMirror::default();
        mirror.apply(&GameEvent::GameTimerUpdate(timer(7)));
        assert_eq!(mirror.round_timer, 7);
        assert_eq!(mirror.game_timer, 7);
        assert!(mirror.game_timer_running);

        mirror.apply(&GameEvent::GameTimerUpdate(timer(0)));
        assert_eq!(mirror.round_timer, 0);
        assert!(!mirror.game_timer_running);
    }

    #[test]
    fn game_timer_start_ends_choice_phase() {
        let mut before = GameMirror::default();
        before.choice_phase_active = true;
        let mut after = before.clone();
        after.apply(&GameEvent::GameTimerStart(timer(15)));
        assert_eq!(
            after,
            GameMirror {
                round_timer: 15,
                game_timer: 15,
                game_timer_running: true,
                choice_phase_active: false,
                ..before
            }
        );
    }

    #[test]
    fn choice_phase_started_stops_game_timer() {
        let phase = ChoicePhasePayload {
            round_number: Some(2),
            active_players: vec!["a".into(), "b".into()],
            choice_timeout: Some(10),
            ..Default::default()
        };
        let mut before = GameMirror::default();
        before.game_timer_running = true;
        let mut after = before.clone();
        after.apply(&GameEvent::ChoicePhaseStarted(phase.clone()));
        assert_eq!(
            after,
            GameMirror {
                choice_phase_active: true,
                choice_phase_data: Some(phase),
                game_timer_running: false,
                ..before
            }
        );
    }

    #[test]
    fn choice_timers() {
        let (before, after) = applied(GameEvent::ChoiceTimerStart(timer(10)));
        assert_eq!(
            after,
            GameMirror {
                choice_timer: 10,
                choice_phase_active: true,
                ..before
            }
        );

        let (before, after) = applied(GameEvent::ChoiceTimerUpdate(timer(3)));
        assert_eq!(
            after,
            GameMirror {
                choice_timer: 3,
                ..before
            }
        );
    }

    #[test]
    fn eliminations_replace_list() {
        let (before, after) = applied(GameEvent::PlayersEliminated(EliminationPayload {
            eliminated_players: vec!["x".into()],
            round_number: Some(1),
            remaining_count: Some(3),
        }));
        assert_eq!(
            after,
            GameMirror {
                eliminated_players: vec!["x".into()],
                ..before
            }
        );
    }

    #[test]
    fn round_updated_defaults_missing_or_zero_counters_to_one() {
        let mut mirror = GameMirror::default();
        mirror.apply(&GameEvent::RoundUpdated(RoundPayload {
            current_round: Some(3),
            total_rounds: Some(4),
            ..Default::default()
        }));
        assert_eq!((mirror.current_round, mirror.total_rounds), (3, 4));

        mirror.apply(&GameEvent::RoundUpdated(RoundPayload {
            current_round: Some(0),
            total_rounds: None,
            ..Default::default()
        }));
        assert_eq!((mirror.current_round, mirror.total_rounds), (1, 1));
    }

    #[test]
    fn game_started_resets_round_state() {
        let mut mirror = GameMirror::default();
        mirror.eliminated_players = vec!["gone".into()];
        mirror.current_round = 3;
        mirror.total_rounds = 5;
        mirror.choice_phase_active = true;

        mirror.apply(&GameEvent::GameStarted(GameStartedPayload::default()));
        assert!(mirror.eliminated_players.is_empty());
        assert_eq!(mirror.current_round, 1);
        assert_eq!(mirror.total_rounds, 5, "untouched without a session");
        assert!(!mirror.choice_phase_active);

        mirror.apply(&GameEvent::GameStarted(GameStartedPayload {
            game_session: Some(GameSessionInfo {
                total_rounds: 3,
                ..Default::default()
            }),
            players: vec![],
        }));
        assert_eq!(mirror.total_rounds, 3);
    }

    #[test]
    fn game_result_and_finished_record_winner() {
        let result = GameResultPayload {
            winner_id: Some("alice".into()),
            game_finished: true,
            ..Default::default()
        };
        let mut before = GameMirror::default();
        before.game_timer_running = true;
        before.choice_phase_active = true;
        let mut after = before.clone();
        after.apply(&GameEvent::GameResult(result.clone()));
        assert_eq!(
            after,
            GameMirror {
                game_result: Some(result),
                game_finished: true,
                game_winner: Some("alice".into()),
                choice_phase_active: false,
                game_timer_running: false,
                ..before
            }
        );

        let (before, after) = applied(GameEvent::GameFinished(GameFinishedPayload {
            winner_id: None,
            no_winner: true,
            split_bank: false,
        }));
        assert_eq!(
            after,
            GameMirror {
                game_finished: true,
                ..before
            }
        );
    }

    #[test]
    fn lobby_and_status_lists_are_replaced() {
        let player = LobbyPlayer {
            user_id: "u1".into(),
            nickname: "Uma".into(),
            ..Default::default()
        };
        let (before, after) = applied(GameEvent::LobbyUpdate(LobbyPayload {
            players: vec![player.clone()],
            count: 1,
        }));
        assert_eq!(
            after,
            GameMirror {
                lobby_players: vec![player],
                ..before
            }
        );

        let lobby = LobbySummary {
            lobby_id: "main".into(),
            player_count: 2,
            status: "waiting".into(),
        };
        let (before, after) = applied(GameEvent::AdminLobbyUpdate(AdminLobbyPayload {
            lobbies: vec![lobby.clone()],
            total_count: 1,
        }));
        assert_eq!(
            after,
            GameMirror {
                admin_lobbies: vec![lobby],
                ..before
            }
        );

        let status = PlayerStatus {
            user_id: "u1".into(),
            status: "eliminated".into(),
            eliminated_in_round: Some(1),
            ..Default::default()
        };
        let (before, after) = applied(GameEvent::PlayerStatusUpdate(PlayerStatusPayload {
            statuses: vec![status.clone()],
        }));
        assert_eq!(
            after,
            GameMirror {
                player_statuses: vec![status],
                ..before
            }
        );
    }
}
