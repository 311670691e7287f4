//! Client-side game roster.

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::event::LobbyPlayer;
use crate::player::{avatar_for, random_color};
use crate::session::SessionStore;
use crate::storage::{SharedStorage, IN_GAME_KEY};

/// One entry of the in-game roster.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GamePlayer {
    pub id: String,
    pub name: String,
    pub color: String,
    pub avatar: String,
    pub is_current_user: bool,
    pub is_eliminated: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_admin: Option<bool>,
}

/// Lobby and in-game rosters plus the persisted "in game" flag.
pub struct GameStore {
    storage: SharedStorage,
    players: Vec<GamePlayer>,
    lobby_players: Vec<LobbyPlayer>,
    game_started: bool,
    current_round: u32,
    in_game: bool,
}

impl GameStore {
    /// Empty rosters; the "in game" flag is read back from `storage`.
    pub fn new(storage: SharedStorage) -> Self {
        let in_game = storage.get(IN_GAME_KEY).is_some_and(|v| v == "1");
        Self {
            storage,
            players: Vec::new(),
            lobby_players: Vec::new(),
            game_started: false,
            current_round: 1,
            in_game,
        }
    }

    /// Add the signed-in user to the roster.
    ///
    /// Returns `false` without changes when signed out or already present.
    pub fn add_player_to_game(&mut self, session: &SessionStore) -> bool {
        let Some(user) = session.user() else {
            return false;
        };
        if self.players.iter().any(|p| p.id == user.user_id) {
            return false;
        }
        self.players.push(GamePlayer {
            id: user.user_id.clone(),
            name: user.nickname.clone(),
            color: random_color(),
            avatar: avatar_for(&user.nickname),
            is_current_user: true,
            is_eliminated: false,
            is_admin: user.is_admin,
        });
        debug!(user_id = %user.user_id, "joined game roster");
        self.set_player_in_game(true);
        true
    }

    /// Remove the roster entry with `player_id`, if present.
    pub fn remove_player_from_game(&mut self, player_id: &str) -> bool {
        let before = self.players.len();
        self.players.retain(|p| p.id != player_id);
        before != self.players.len()
    }

    pub fn reset_game(&mut self) {
        self.players.clear();
        self.game_started = false;
        self.current_round = 1;
        self.set_player_in_game(false);
    }

    pub fn players(&self) -> &[GamePlayer] {
        &self.players
    }

    pub fn player_count(&self) -> usize {
        self.players.len()
    }

    pub fn active_players(&self) -> impl Iterator<Item = &GamePlayer> {
        self.players.iter().filter(|p| !p.is_eliminated)
    }

    pub fn active_player_count(&self) -> usize {
        self.active_players().count()
    }

    /// Flag roster entries whose ids appear in `ids` as eliminated.
    ///
    /// Returns how many entries changed.
    pub fn mark_eliminated(&mut self, ids: &[String]) -> usize {
        let mut changed = 0;
        for player in self.players.iter_mut().filter(|p| !p.is_eliminated) {
            if ids.contains(&player.id) {
                player.is_eliminated = true;
                changed += 1;
            }
        }
        changed
    }

    pub fn lobby_players(&self) -> &[LobbyPlayer] {
        &self.lobby_players
    }

    pub fn set_lobby_players(&mut self, players: Vec<LobbyPlayer>) {
        self.lobby_players = players;
    }

    pub fn game_started(&self) -> bool {
        self.game_started
    }

    pub fn set_game_started(&mut self, started: bool) {
        self.game_started = started;
    }

    pub fn current_round(&self) -> u32 {
        self.current_round
    }

    pub fn set_current_round(&mut self, round: u32) {
        self.current_round = round;
    }

    pub fn is_player_in_game(&self) -> bool {
        self.in_game
    }

    /// Set the "in game" flag and persist it.
    pub fn set_player_in_game(&mut self, in_game: bool) {
        self.in_game = in_game;
        let value = if in_game { "1" } else { "0" };
        if let Err(e) = self.storage.set(IN_GAME_KEY, value) {
            warn!("failed to persist in-game flag: {e}");
        }
    }
}

impl std::fmt::Debug for GameStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GameStore")
            .field("players", &self.players)
            .field("lobby_players", &self.lobby_players.len())
            .field("game_started", &self.game_started)
            .field("current_round", &self.current_round)
            .field("in_game", &self.in_game)
            .finish()
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
    use crate::player::PALETTE;
    use crate::session::Session;
    use crate::storage::{MemoryStorage, Storage};

    fn signed_in(storage: &SharedStorage, id: &str, nickname: &str) -> SessionStore {
        let mut session = SessionStore::restore(storage.clone());
        session.login(Session::new(id, nickname));
        session
    }

    #[test]
    fn adding_requires_session() {
        let storage = MemoryStorage::shared();
        let mut game = GameStore::new(storage.clone());
        let session = SessionStore::restore(storage.clone());
        assert!(!game.add_player_to_game(&session));
        assert_eq!(game.player_count(), 0);
        assert_eq!(storage.get(IN_GAME_KEY), None);
    }

    #[test]
    fn adding_twice_keeps_one_entry() {
        let storage = MemoryStorage::shared();
        let mut game = GameStore::new(storage.clone());
        let session = signed_in(&storage, "u1", "ann");

        assert!(game.add_player_to_game(&session));
        assert!(!game.add_player_to_game(&session));
        assert_eq!(game.player_count(), 1);

        let entry = &game.players()[0];
        assert_eq!(entry.avatar, "A");
        assert!(entry.is_current_user);
        assert!(PALETTE.contains(&entry.color.as_str()));
        assert!(game.is_player_in_game());
        assert_eq!(storage.get(IN_GAME_KEY).as_deref(), Some("1"));
    }

    #[test]
    fn in_game_flag_is_restored() {
        let storage = MemoryStorage::shared();
        storage.set(IN_GAME_KEY, "1").unwrap();
        assert!(GameStore::new(storage.clone()).is_player_in_game());
        storage.set(IN_GAME_KEY, "0").unwrap();
        assert!(!GameStore::new(storage).is_player_in_game());
    }

    #[test]
    fn reset_clears_roster_and_flag() {
        let storage = MemoryStorage::shared();
        let mut game = GameStore::new(storage.clone());
        let session = signed_in(&storage, "u1", "ann");
        game.add_player_to_game(&session);
        game.set_game_started(true);
        game.set_current_round(3);

        game.reset_game();

        assert_eq!(game.player_count(), 0);
        assert!(!game.game_started());
        assert_eq!(game.current_round(), 1);
        assert_eq!(storage.get(IN_GAME_KEY).as_deref(), Some("0"));
    }

    #[test]
    fn eliminations_shrink_active_roster() {
        let storage = MemoryStorage::shared();
        let mut game = GameStore::new(storage.clone());
        game.add_player_to_game(&signed_in(&storage, "u1", "ann"));
        game.add_player_to_game(&signed_in(&storage, "u2", "bob"));

        assert_eq!(game.mark_eliminated(&["u2".to_string(), "ghost".to_string()]), 1);
        assert_eq!(game.mark_eliminated(&["u2".to_string()]), 0);
        assert_eq!(game.player_count(), 2);
        assert_eq!(game.active_player_count(), 1);
        assert_eq!(game.active_players().next().unwrap().id, "u1");

        assert!(game.remove_player_from_game("u1"));
        assert!(!game.remove_player_from_game("u1"));
        assert_eq!(game.active_player_count(), 0);
    }
}
