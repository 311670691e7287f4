//! REST API of the game backend.
//!
//! [`GameApi`] is the seam the stores call through; [`HttpApi`] is the
//! `reqwest` implementation. Tests substitute their own implementation.

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use crate::config::ClientConfig;
use crate::error::{PartyClientError, Result};

/// A user as returned by the user lookup.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserRecord {
    pub user_id: String,
    pub nickname: String,
    #[serde(default)]
    pub balance: Option<i64>,
}

/// Response to a registration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct Registration {
    pub message: String,
    pub is_admin: bool,
}

/// Response to an admin check.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct AdminStatus {
    pub user_id: String,
    pub is_admin: bool,
}

/// Response to a coin adjustment.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct CoinUpdate {
    /// Balance after the adjustment.
    pub balance: i64,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub added: Option<i64>,
    #[serde(default)]
    pub deducted: Option<i64>,
}

#[derive(Deserialize)]
struct BalanceResponse {
    balance: i64,
}

#[derive(Serialize)]
struct CoinRequest<'a> {
    user_id: &'a str,
    amount: i64,
}

#[derive(Serialize)]
struct RegisterRequest<'a> {
    user_id: &'a str,
    nickname: &'a str,
}

/// Backend operations used by the stores.
///
/// Every call is a single request/response round trip. Non-success
/// statuses surface as [`PartyClientError::Api`].
#[async_trait]
pub trait GameApi: Send + Sync {
    /// Look up a user by id.
    async fn fetch_user(&self, user_id: &str) -> Result<UserRecord>;

    /// Create a user.
    async fn register_user(&self, user_id: &str, nickname: &str) -> Result<Registration>;

    /// Whether the user has admin rights.
    async fn check_admin(&self, user_id: &str) -> Result<AdminStatus>;

    /// Current coin balance.
    async fn balance(&self, user_id: &str) -> Result<i64>;

    async fn add_coins(&self, user_id: &str, amount: i64) -> Result<CoinUpdate>;

    async fn deduct_coins(&self, user_id: &str, amount: i64) -> Result<CoinUpdate>;

    /// Generic data endpoint.
    async fn fetch_data(&self) -> Result<Value>;
}

/// [`GameApi`] over HTTP.
///
/// # Example
///
/// ```
/// use party_game_client::api::HttpApi;
///
/// let api = HttpApi::new("http://localhost:5000/api/");
/// assert_eq!(api.base_url(), "http://localhost:5000/api");
/// ```
#[derive(Debug, Clone)]
pub struct HttpApi {
    client: reqwest::Client,
    base_url: String,
}

impl HttpApi {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self::with_client(reqwest::Client::new(), base_url)
    }

    /// Use an existing `reqwest` client (shared pool, custom timeouts).
    pub fn with_client(client: reqwest::Client, base_url: impl Into<String>) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Self { client, base_url }
    }

    /// Client for the configured backend.
    pub fn from_config(config: &ClientConfig) -> Self {
        Self::new(config.backend_url.clone())
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    async fn get<T: DeserializeOwned>(&self, path: &str, query: &[(&str, &str)]) -> Result<T> {
        let url = self.url(path);
        debug!(%url, "GET");
        let response = self.client.get(&url).query(query).send().await?;
        read_json(response).await
    }

    async fn post<B, T>(&self, path: &str, body: &B) -> Result<T>
    where
        B: Serialize + Sync,
        T: DeserializeOwned,
    {
        let url = self.url(path);
        debug!(%url, "POST");
        let response = self.client.post(&url).json(body).send().await?;
        read_json(response).await
    }
}

/// Decode a success body, or turn an error status into
/// [`PartyClientError::Api`] carrying the body's `error` text.
async fn read_json<T: DeserializeOwned>(response: reqwest::Response) -> Result<T> {
    let status = response.status();
    if status.is_success() {
        return Ok(response.json::<T>().await?);
    }
    let body = response.text().await.unwrap_or_default();
    let message = serde_json::from_str::<Value>(&body)
        .ok()
        .and_then(|v| v.get("error").and_then(Value::as_str).map(str::to_owned))
        .unwrap_or_else(|| status.canonical_reason().unwrap_or("request failed").to_string());
    Err(PartyClientError::Api {
        status: status.as_u16(),
        message,
    })
}

#[async_trait]
impl GameApi for HttpApi {
    async fn fetch_user(&self, user_id: &str) -> Result<UserRecord> {
        self.get("user", &[("user_id", user_id)]).await
    }

    async fn register_user(&self, user_id: &str, nickname: &str) -> Result<Registration> {
        self.post("register", &RegisterRequest { user_id, nickname })
            .await
    }

    async fn check_admin(&self, user_id: &str) -> Result<AdminStatus> {
        self.get("admin/check", &[("user_id", user_id)]).await
    }

    async fn balance(&self, user_id: &str) -> Result<i64> {
        let response: BalanceResponse = self.get("coins/balance", &[("user_id", user_id)]).await?;
        Ok(response.balance)
    }

    async fn add_coins(&self, user_id: &str, amount: i64) -> Result<CoinUpdate> {
        self.post("coins/add", &CoinRequest { user_id, amount }).await
    }

    async fn deduct_coins(&self, user_id: &str, amount: i64) -> Result<CoinUpdate> {
        self.post("coins/deduct", &CoinRequest { user_id, amount })
            .await
    }

    async fn fetch_data(&self) -> Result<Value> {
        self.get("data", &[]).await
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

    #[test]
    fn urls_join_without_double_slashes() {
        let api = HttpApi::new("http://localhost:5000/api/");
        assert_eq!(api.url("coins/add"), "http://localhost:5000/api/coins/add");
        assert_eq!(api.url("/user"), "http://localhost:5000/api/user");
    }

    #[test]
    fn from_config_uses_backend_url() {
        let config = ClientConfig::default().with_backend_url("https://party.example/api");
        assert_eq!(HttpApi::from_config(&config).base_url(), "https://party.example/api");
    }

    #[test]
    fn user_record_balance_is_optional() {
        let user: UserRecord =
            serde_json::from_str(r#"{"user_id":"u1","nickname":"Ann"}"#).unwrap();
        assert_eq!(user.balance, None);
    }

    #[test]
    fn coin_update_ignores_extra_fields() {
        let update: CoinUpdate = serde_json::from_str(
            r#"{"message":"Coins deducted successfully","balance":4,"deducted":1,"extra":true}"#,
        )
        .unwrap();
        assert_eq!(update.balance, 4);
        assert_eq!(update.deducted, Some(1));
    }
}
