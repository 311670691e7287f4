//! Authenticated user session.
//!
//! [`SessionStore`] owns the current [`Session`] and persists it under the
//! [`USER_KEY`] storage key. Failures never escape its public operations:
//! they are logged and reported as `false` or unchanged state.
//!
//! Identity can come from the stored record or from the messaging
//! platform's web-app launch payload; both are [`IdentityProvider`]s
//! passed to [`SessionStore::sign_in`].

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::api::{GameApi, UserRecord};
use crate::error::{PartyClientError, Result};
use crate::storage::{SharedStorage, USER_KEY};

/// The signed-in user.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    pub user_id: String,
    pub nickname: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub balance: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_admin: Option<bool>,
}

impl Session {
    pub fn new(user_id: impl Into<String>, nickname: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            nickname: nickname.into(),
            balance: None,
            is_admin: None,
        }
    }

    #[must_use]
    pub fn with_balance(mut self, balance: i64) -> Self {
        self.balance = Some(balance);
        self
    }
}

impl From<UserRecord> for Session {
    fn from(user: UserRecord) -> Self {
        Self {
            user_id: user.user_id,
            nickname: user.nickname,
            balance: user.balance,
            is_admin: None,
        }
    }
}

// ── Store ───────────────────────────────────────────────────────────

/// Holds the current session and keeps storage in step with it.
pub struct SessionStore {
    storage: SharedStorage,
    user: Option<Session>,
}

impl SessionStore {
    /// Load the persisted session, if any.
    ///
    /// A stored record that does not parse is removed from storage and the
    /// store starts signed out.
    pub fn restore(storage: SharedStorage) -> Self {
        let user = storage
            .get(USER_KEY)
            .and_then(|raw| match serde_json::from_str::<Session>(&raw) {
                Ok(session) => Some(session),
                Err(e) => {
                    warn!("discarding malformed stored session: {e}");
                    if let Err(e) = storage.remove(USER_KEY) {
                        warn!("failed to remove stored session: {e}");
                    }
                    None
                }
            });
        if let Some(session) = &user {
            debug!(user_id = %session.user_id, "session restored");
        }
        Self { storage, user }
    }

    pub fn user(&self) -> Option<&Session> {
        self.user.as_ref()
    }

    pub fn is_authenticated(&self) -> bool {
        self.user.is_some()
    }

    /// Make `session` current and persist it.
    pub fn login(&mut self, session: Session) {
        info!(user_id = %session.user_id, "signed in");
        self.user = Some(session);
        self.persist();
    }

    /// Sign in a freshly created user with no known balance.
    pub fn register(&mut self, user_id: impl Into<String>, nickname: impl Into<String>) {
        self.login(Session::new(user_id, nickname));
    }

    /// Forget the session, in memory and in storage.
    pub fn logout(&mut self) {
        if let Some(session) = self.user.take() {
            info!(user_id = %session.user_id, "signed out");
        }
        if let Err(e) = self.storage.remove(USER_KEY) {
            warn!("failed to remove stored session: {e}");
        }
    }

    /// Replace the balance and persist. Ignored while signed out.
    pub fn update_balance(&mut self, balance: i64) {
        let Some(session) = self.user.as_mut() else {
            return;
        };
        session.balance = Some(balance);
        self.persist();
    }

    /// Look `user_id` up on the backend and sign in as that user.
    ///
    /// Returns `false`, leaving the store unchanged, on any failure.
    pub async fn fetch_user_data(&mut self, api: &dyn GameApi, user_id: &str) -> bool {
        match api.fetch_user(user_id).await {
            Ok(user) => {
                self.login(user.into());
                true
            }
            Err(e) => {
                warn!(user_id, "user lookup failed: {e}");
                false
            }
        }
    }

    /// Resolve an identity through `provider` and sign in with it.
    ///
    /// A provider that determines there is no valid identity signs the
    /// store out. A provider error leaves the store unchanged.
    pub async fn sign_in(&mut self, provider: &dyn IdentityProvider, api: &dyn GameApi) -> bool {
        let resolved = provider.resolve(self.user.as_ref(), api).await;
        match resolved {
            Ok(Some(session)) => {
                self.login(session);
                true
            }
            Ok(None) => {
                debug!(provider = provider.name(), "no identity resolved");
                self.logout();
                false
            }
            Err(e) => {
                warn!(provider = provider.name(), "sign-in failed: {e}");
                false
            }
        }
    }

    fn persist(&self) {
        let Some(session) = &self.user else {
            return;
        };
        let stored = serde_json::to_string(session)
            .map_err(PartyClientError::from)
            .and_then(|json| self.storage.set(USER_KEY, &json));
        if let Err(e) = stored {
            warn!("failed to persist session: {e}");
        }
    }
}

impl std::fmt::Debug for SessionStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionStore").field("user", &self.user).finish()
    }
}

// ── Identity providers ──────────────────────────────────────────────

/// Source of the user's identity at sign-in.
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// Short name for logs.
    fn name(&self) -> &'static str;

    /// Work out who the user is.
    ///
    /// `Ok(None)` means there is positively no valid identity (the store
    /// signs out); `Err` means the answer is unknown (the store is left
    /// as is).
    async fn resolve(
        &self,
        current: Option<&Session>,
        api: &dyn GameApi,
    ) -> Result<Option<Session>>;
}

fn is_unknown_user(err: &PartyClientError) -> bool {
    matches!(err, PartyClientError::Api { status: 404, .. })
}

/// Re-validates the stored session against the backend.
///
/// The refreshed record (nickname, balance) replaces the stored one; a
/// user the backend no longer knows is signed out.
#[derive(Debug, Clone, Copy, Default)]
pub struct StoredSessionProvider;

#[async_trait]
impl IdentityProvider for StoredSessionProvider {
    fn name(&self) -> &'static str {
        "stored-session"
    }

    async fn resolve(
        &self,
        current: Option<&Session>,
        api: &dyn GameApi,
    ) -> Result<Option<Session>> {
        let Some(current) = current else {
            return Ok(None);
        };
        match api.fetch_user(&current.user_id).await {
            Ok(user) => Ok(Some(Session {
                is_admin: current.is_admin,
                ..Session::from(user)
            })),
            Err(e) if is_unknown_user(&e) => {
                info!(user_id = %current.user_id, "stored user no longer exists");
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }
}

/// The `user` object of the web-app launch payload.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WebAppUser {
    pub id: i64,
    #[serde(default)]
    pub first_name: String,
    #[serde(default)]
    pub last_name: Option<String>,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub language_code: Option<String>,
}

impl WebAppUser {
    /// Display name: the username, else first and last name.
    pub fn nickname(&self) -> String {
        match self.username.as_deref().filter(|u| !u.is_empty()) {
            Some(username) => username.to_string(),
            None => format!(
                "{} {}",
                self.first_name,
                self.last_name.as_deref().unwrap_or_default()
            )
            .trim()
            .to_string(),
        }
    }
}

/// The web-app launch payload (`initDataUnsafe`).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WebAppInitData {
    pub user: Option<WebAppUser>,
    pub chat_instance: Option<String>,
    pub chat_type: Option<String>,
    pub start_param: Option<String>,
}

/// Signs in the user who launched the messaging platform's web app.
///
/// Unknown users are registered first. The admin flag is then queried
/// from the backend.
#[derive(Debug, Clone, Default)]
pub struct TelegramWebAppProvider {
    init_data: WebAppInitData,
}

impl TelegramWebAppProvider {
    pub fn new(init_data: WebAppInitData) -> Self {
        Self { init_data }
    }

    /// Parse the launch payload from its JSON form.
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(Self::new(serde_json::from_str(json)?))
    }

    pub fn init_data(&self) -> &WebAppInitData {
        &self.init_data
    }
}

#[async_trait]
impl IdentityProvider for TelegramWebAppProvider {
    fn name(&self) -> &'static str {
        "telegram-web-app"
    }

    async fn resolve(
        &self,
        _current: Option<&Session>,
        api: &dyn GameApi,
    ) -> Result<Option<Session>> {
        let Some(web_user) = &self.init_data.user else {
            return Err(PartyClientError::NotAuthenticated);
        };
        let user_id = web_user.id.to_string();

        let mut session = match api.fetch_user(&user_id).await {
            Ok(user) => Session::from(user),
            Err(e) if is_unknown_user(&e) => {
                let nickname = web_user.nickname();
                let registration = api.register_user(&user_id, &nickname).await?;
                info!(%user_id, %nickname, "registered web-app user");
                Session {
                    is_admin: Some(registration.is_admin),
                    ..Session::new(user_id.clone(), nickname)
                }
            }
            Err(e) => return Err(e),
        };

        match api.check_admin(&user_id).await {
            Ok(status) => session.is_admin = Some(status.is_admin),
            Err(e) => warn!(%user_id, "admin check failed: {e}"),
        }
        Ok(Some(session))
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
    use crate::storage::{MemoryStorage, Storage};

    #[test]
    fn session_json_omits_absent_optionals() {
        let json = serde_json::to_string(&Session::new("u1", "Ann")).unwrap();
        assert_eq!(json, r#"{"user_id":"u1","nickname":"Ann"}"#);
        let json = serde_json::to_string(&Session::new("u1", "Ann").with_balance(3)).unwrap();
        assert_eq!(json, r#"{"user_id":"u1","nickname":"Ann","balance":3}"#);
    }

    #[test]
    fn login_then_restore_round_trips() {
        let storage = MemoryStorage::shared();
        let mut store = SessionStore::restore(storage.clone());
        assert!(!store.is_authenticated());
        store.login(Session::new("u1", "Ann").with_balance(5));

        let restored = SessionStore::restore(storage);
        assert_eq!(restored.user(), store.user());
    }

    #[test]
    fn malformed_record_is_removed() {
        let storage = MemoryStorage::shared();
        storage.set(USER_KEY, "{not json").unwrap();
        let store = SessionStore::restore(storage.clone());
        assert!(!store.is_authenticated());
        assert_eq!(storage.get(USER_KEY), None);
    }

    #[test]
    fn update_balance_requires_session() {
        let storage = MemoryStorage::shared();
        let mut store = SessionStore::restore(storage.clone());
        store.update_balance(9);
        assert_eq!(storage.get(USER_KEY), None);

        store.register("u1", "Ann");
        store.update_balance(9);
        assert_eq!(store.user().unwrap().balance, Some(9));
        assert_eq!(
            storage.get(USER_KEY).as_deref(),
            Some(r#"{"user_id":"u1","nickname":"Ann","balance":9}"#)
        );
    }

    #[test]
    fn logout_clears_storage() {
        let storage = MemoryStorage::shared();
        let mut store = SessionStore::restore(storage.clone());
        store.register("u1", "Ann");
        store.logout();
        assert!(store.user().is_none());
        assert_eq!(storage.get(USER_KEY), None);
    }

    #[test]
    fn web_app_nickname_prefers_username() {
        let mut user = WebAppUser {
            id: 7,
            first_name: "Ann".into(),
            last_name: Some("Lee".into()),
            username: Some("annlee".into()),
            language_code: None,
        };
        assert_eq!(user.nickname(), "annlee");
        user.username = None;
        assert_eq!(user.nickname(), "Ann Lee");
        user.last_name = None;
        assert_eq!(user.nickname(), "Ann");
    }

    #[test]
    fn launch_payload_parses() {
        let provider = TelegramWebAppProvider::from_json(
            r#"{"user":{"id":42,"first_name":"Ann","language_code":"en"},"chat_type":"private"}"#,
        )
        .unwrap();
        let user = provider.init_data().user.as_ref().unwrap();
        assert_eq!(user.id, 42);
        assert_eq!(provider.init_data().chat_type.as_deref(), Some("private"));
    }
}
