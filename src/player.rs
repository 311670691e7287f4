//! The local player: cosmetics and coin balance.

use rand::seq::IndexedRandom;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::api::GameApi;
use crate::session::SessionStore;

/// Colors handed out to players.
pub const PALETTE: [&str; 15] = [
    "#FF6B6B", "#4ECDC4", "#45B7D1", "#96CEB4", "#FFEAA7", "#DDA0DD", "#98D8C8", "#F7DC6F",
    "#BB8FCE", "#85C1E9", "#F8C471", "#82E0AA", "#F1948A", "#85C1E9", "#D7BDE2",
];

/// Color shown when the player has none.
pub const DEFAULT_COLOR: &str = "#666";

/// Avatar shown when there is no name to take it from.
pub const DEFAULT_AVATAR: &str = "P";

/// A color picked uniformly from [`PALETTE`].
pub fn random_color() -> String {
    PALETTE
        .choose(&mut rand::rng())
        .copied()
        .unwrap_or(DEFAULT_COLOR)
        .to_string()
}

/// First character of `name`, uppercased; [`DEFAULT_AVATAR`] for an empty name.
pub fn avatar_for(name: &str) -> String {
    name.chars()
        .next()
        .map(|c| c.to_uppercase().collect())
        .unwrap_or_else(|| DEFAULT_AVATAR.to_string())
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Player {
    pub id: String,
    pub name: String,
    pub color: String,
    pub balance: i64,
    pub avatar: String,
}

/// Holds the current player.
///
/// Coin operations need a signed-in session; a successful one updates the
/// balance both here and in the session.
#[derive(Debug, Clone)]
pub struct PlayerStore {
    player: Player,
}

impl Default for PlayerStore {
    fn default() -> Self {
        Self::new()
    }
}

impl PlayerStore {
    /// An anonymous player with a random color and zero balance.
    pub fn new() -> Self {
        Self {
            player: Player {
                color: random_color(),
                ..Player::default()
            },
        }
    }

    pub fn player(&self) -> &Player {
        &self.player
    }

    /// Spend one coin to enter a game.
    pub async fn deduct_coin(&mut self, session: &mut SessionStore, api: &dyn GameApi) -> bool {
        let Some(user_id) = session.user().map(|u| u.user_id.clone()) else {
            return false;
        };
        match api.deduct_coins(&user_id, 1).await {
            Ok(update) => {
                debug!(%user_id, balance = update.balance, "coin deducted");
                self.adopt_balance(session, update.balance);
                true
            }
            Err(e) => {
                warn!(%user_id, "coin deduction failed: {e}");
                false
            }
        }
    }

    pub async fn add_coins(
        &mut self,
        session: &mut SessionStore,
        api: &dyn GameApi,
        amount: i64,
    ) -> bool {
        let Some(user_id) = session.user().map(|u| u.user_id.clone()) else {
            return false;
        };
        match api.add_coins(&user_id, amount).await {
            Ok(update) => {
                debug!(%user_id, amount, balance = update.balance, "coins added");
                self.adopt_balance(session, update.balance);
                true
            }
            Err(e) => {
                warn!(%user_id, amount, "adding coins failed: {e}");
                false
            }
        }
    }

    /// Take identity from the session and the balance from the backend.
    ///
    /// Does nothing when signed out or when the lookup fails.
    pub async fn load_balance(&mut self, session: &SessionStore, api: &dyn GameApi) {
        let Some(user) = session.user() else {
            return;
        };
        match api.balance(&user.user_id).await {
            Ok(balance) => {
                self.player.balance = balance;
                self.player.id = user.user_id.clone();
                self.player.name = user.nickname.clone();
                self.player.avatar = avatar_for(&user.nickname);
            }
            Err(e) => warn!(user_id = %user.user_id, "balance lookup failed: {e}"),
        }
    }

    /// The session nickname when signed in, else the player's own name.
    pub fn player_name(&self, session: &SessionStore) -> String {
        match session.user() {
            Some(user) => user.nickname.clone(),
            None => self.player.name.clone(),
        }
    }

    pub fn balance(&self) -> i64 {
        self.player.balance
    }

    pub fn color(&self) -> &str {
        if self.player.color.is_empty() {
            DEFAULT_COLOR
        } else {
            &self.player.color
        }
    }

    pub fn avatar(&self, session: &SessionStore) -> String {
        match session.user() {
            Some(user) => avatar_for(&user.nickname),
            None if self.player.avatar.is_empty() => DEFAULT_AVATAR.to_string(),
            None => self.player.avatar.clone(),
        }
    }

    /// A game costs a coin.
    pub fn can_join_game(&self) -> bool {
        self.player.balance > 0
    }

    fn adopt_balance(&mut self, session: &mut SessionStore, balance: i64) {
        self.player.balance = balance;
        session.update_balance(balance);
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
    use crate::storage::MemoryStorage;

    #[test]
    fn random_color_comes_from_palette() {
        for _ in 0..50 {
            assert!(PALETTE.contains(&random_color().as_str()));
        }
    }

    #[test]
    fn avatar_is_uppercased_initial() {
        assert_eq!(avatar_for("ann"), "A");
        assert_eq!(avatar_for("ßeta"), "SS");
        assert_eq!(avatar_for(""), DEFAULT_AVATAR);
    }

    #[test]
    fn anonymous_player_defaults() {
        let store = PlayerStore::new();
        let session = SessionStore::restore(MemoryStorage::shared());
        assert_eq!(store.balance(), 0);
        assert!(!store.can_join_game());
        assert_eq!(store.avatar(&session), DEFAULT_AVATAR);
        assert_eq!(store.player_name(&session), "");
        assert!(PALETTE.contains(&store.color()));
    }

    #[test]
    fn signed_in_session_drives_name_and_avatar() {
        let store = PlayerStore::new();
        let mut session = SessionStore::restore(MemoryStorage::shared());
        session.register("u1", "zed");
        assert_eq!(store.player_name(&session), "zed");
        assert_eq!(store.avatar(&session), "Z");
    }

    #[test]
    fn empty_color_falls_back() {
        let store = PlayerStore {
            player: Player::default(),
        };
        assert_eq!(store.color(), DEFAULT_COLOR);
    }
}
