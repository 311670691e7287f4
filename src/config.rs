//! Deployment configuration.
//!
//! The browser build substitutes these values at build time; here they are
//! read from the process environment, each falling back to the local
//! development default.
//!
//! | Variable        | Default                     |
//! |-----------------|-----------------------------|
//! | `DOMAIN`        | `localhost`                 |
//! | `FRONTEND_URL`  | `http://localhost:8080`     |
//! | `BACKEND_URL`   | `http://localhost:5000/api` |
//! | `SOCKET_URL`    | `http://localhost:5000`     |
//! | `FRONTEND_PORT` | `8080`                      |

use crate::client::SocketConfig;

const DEFAULT_DOMAIN: &str = "localhost";
const DEFAULT_FRONTEND_URL: &str = "http://localhost:8080";
const DEFAULT_BACKEND_URL: &str = "http://localhost:5000/api";
const DEFAULT_SOCKET_URL: &str = "http://localhost:5000";
const DEFAULT_FRONTEND_PORT: u16 = 8080;

/// Path and query of the Socket.IO WebSocket endpoint.
const SOCKET_IO_PATH: &str = "/socket.io/?EIO=4&transport=websocket";

/// Where the client finds the game server.
///
/// # Example
///
/// ```
/// use party_game_client::config::ClientConfig;
///
/// let config = ClientConfig::default().with_socket_url("https://game.example");
/// assert_eq!(
///     config.socket_endpoint(),
///     "wss://game.example/socket.io/?EIO=4&transport=websocket"
/// );
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    pub domain: String,
    pub frontend_url: String,
    /// Base URL of the REST API, including the `/api` prefix.
    pub backend_url: String,
    /// Origin of the Socket.IO server (`http(s)://` or `ws(s)://`).
    pub socket_url: String,
    pub frontend_port: u16,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            domain: DEFAULT_DOMAIN.to_string(),
            frontend_url: DEFAULT_FRONTEND_URL.to_string(),
            backend_url: DEFAULT_BACKEND_URL.to_string(),
            socket_url: DEFAULT_SOCKET_URL.to_string(),
            frontend_port: DEFAULT_FRONTEND_PORT,
        }
    }
}

impl ClientConfig {
    /// Read the configuration from the process environment.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Read the configuration through `lookup`. Unset, empty or unparsable
    /// values fall back to their defaults.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str, default: &str| {
            lookup(key)
                .filter(|value| !value.trim().is_empty())
                .unwrap_or_else(|| default.to_string())
        };
        let frontend_port = match lookup("FRONTEND_PORT") {
            Some(raw) => raw.trim().parse().unwrap_or_else(|_| {
                tracing::warn!(value = %raw, "invalid FRONTEND_PORT, using {DEFAULT_FRONTEND_PORT}");
                DEFAULT_FRONTEND_PORT
            }),
            None => DEFAULT_FRONTEND_PORT,
        };

        Self {
            domain: get("DOMAIN", DEFAULT_DOMAIN),
            frontend_url: get("FRONTEND_URL", DEFAULT_FRONTEND_URL),
            backend_url: get("BACKEND_URL", DEFAULT_BACKEND_URL),
            socket_url: get("SOCKET_URL", DEFAULT_SOCKET_URL),
            frontend_port,
        }
    }

    #[must_use]
    pub fn with_backend_url(mut self, url: impl Into<String>) -> Self {
        self.backend_url = url.into();
        self
    }

    #[must_use]
    pub fn with_socket_url(mut self, url: impl Into<String>) -> Self {
        self.socket_url = url.into();
        self
    }

    /// The WebSocket URL of the Socket.IO endpoint.
    ///
    /// `http` becomes `ws` and `https` becomes `wss`; a URL that already
    /// names a Socket.IO path is used as is.
    pub fn socket_endpoint(&self) -> String {
        let url = self.socket_url.trim_end_matches('/');
        if url.contains("/socket.io") {
            return url.to_string();
        }
        let url = if let Some(rest) = url.strip_prefix("https://") {
            format!("wss://{rest}")
        } else if let Some(rest) = url.strip_prefix("http://") {
            format!("ws://{rest}")
        } else if url.starts_with("ws://") || url.starts_with("wss://") {
            url.to_string()
        } else {
            format!("ws://{url}")
        };
        format!("{url}{SOCKET_IO_PATH}")
    }

    /// Socket settings for [`GameSocket`](crate::GameSocket), with default timeouts.
    pub fn socket_config(&self) -> SocketConfig {
        SocketConfig::new(self.socket_endpoint())
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
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key: &str| map.get(key).cloned()
    }

    #[test]
    fn defaults_when_environment_is_empty() {
        assert_eq!(ClientConfig::from_lookup(|_| None), ClientConfig::default());
    }

    #[test]
    fn reads_overrides() {
        let config = ClientConfig::from_lookup(lookup(&[
            ("DOMAIN", "party.example"),
            ("BACKEND_URL", "https://party.example/api"),
            ("SOCKET_URL", "https://party.example"),
            ("FRONTEND_PORT", "3000"),
        ]));
        assert_eq!(config.domain, "party.example");
        assert_eq!(config.backend_url, "https://party.example/api");
        assert_eq!(config.frontend_url, DEFAULT_FRONTEND_URL);
        assert_eq!(config.frontend_port, 3000);
    }

    #[test]
    fn bad_port_and_blank_values_fall_back() {
        let config = ClientConfig::from_lookup(lookup(&[("FRONTEND_PORT", "eighty"), ("DOMAIN", " ")]));
        assert_eq!(config.frontend_port, DEFAULT_FRONTEND_PORT);
        assert_eq!(config.domain, DEFAULT_DOMAIN);
    }

    #[test]
    fn socket_endpoint_maps_schemes() {
        let endpoint = |url: &str| ClientConfig::default().with_socket_url(url).socket_endpoint();
        assert_eq!(
            endpoint("http://localhost:5000"),
            "ws://localhost:5000/socket.io/?EIO=4&transport=websocket"
        );
        assert_eq!(
            endpoint("https://game.example/"),
            "wss://game.example/socket.io/?EIO=4&transport=websocket"
        );
        assert_eq!(
            endpoint("localhost:5000"),
            "ws://localhost:5000/socket.io/?EIO=4&transport=websocket"
        );
        assert_eq!(
            endpoint("ws://host/socket.io/?EIO=4&transport=websocket"),
            "ws://host/socket.io/?EIO=4&transport=websocket"
        );
    }
}
