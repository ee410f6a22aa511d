//! Client configuration.

use std::time::Duration;

use thiserror::Error;

use crate::transport::DEFAULT_CONNECT_TIMEOUT;

pub const API_URL_ENV: &str = "EPLACE_API_URL";
pub const WS_URL_ENV: &str = "EPLACE_WS_URL";
pub const ROOM_ENV: &str = "EPLACE_ROOM";

pub const DEFAULT_ROOM: &str = "main";

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{0} is not set; the client has no endpoint to talk to")]
    MissingEndpoint(&'static str),
    #[error("Cannot derive a WebSocket URL from '{0}'; set EPLACE_WS_URL")]
    UnsupportedScheme(String),
}

/// Where the client connects and which room it opens.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    /// HTTP base for the room loader (`http://host:port`).
    pub api_url: String,
    /// Socket URL for live subscriptions.
    pub ws_url: String,
    pub room_slug: String,
    pub connect_timeout: Duration,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            api_url: "http://localhost:3000".to_string(),
            ws_url: "ws://localhost:3000".to_string(),
            room_slug: DEFAULT_ROOM.to_string(),
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
        }
    }
}

impl ClientConfig {
    /// Read from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Read through an arbitrary lookup. Empty values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let api_url = get(API_URL_ENV)
            .ok_or(ConfigError::MissingEndpoint(API_URL_ENV))?
            .trim_end_matches('/')
            .to_string();
        let ws_url = match get(WS_URL_ENV) {
            Some(url) => url,
            None => ws_url_for(&api_url)?,
        };
        let room_slug = get(ROOM_ENV).unwrap_or_else(|| DEFAULT_ROOM.to_string());

        Ok(Self {
            api_url,
            ws_url,
            room_slug,
            ..Self::default()
        })
    }
}

/// `http(s)://` → `ws(s)://`, keeping host and path.
pub fn ws_url_for(api_url: &str) -> Result<String, ConfigError> {
    if let Some(rest) = api_url.strip_prefix("https://") {
        Ok(format!("wss://{rest}"))
    } else if let Some(rest) = api_url.strip_prefix("http://") {
        Ok(format!("ws://{rest}"))
    } else {
        Err(ConfigError::UnsupportedScheme(api_url.to_string()))
    }
}

#[cfg(test)]
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
    fn test_defaults() {
        let config = ClientConfig::default();
        assert_eq!(config.api_url, "http://localhost:3000");
        assert_eq!(config.ws_url, "ws://localhost:3000");
        assert_eq!(config.room_slug, "main");
    }

    #[test]
    fn test_missing_api_url_is_fatal() {
        assert_eq!(
            ClientConfig::from_lookup(lookup(&[])),
            Err(ConfigError::MissingEndpoint(API_URL_ENV))
        );
        assert_eq!(
            ClientConfig::from_lookup(lookup(&[(API_URL_ENV, "  ")])),
            Err(ConfigError::MissingEndpoint(API_URL_ENV))
        );
    }

    #[test]
    fn test_ws_url_derived_from_api_url() {
        let config =
            ClientConfig::from_lookup(lookup(&[(API_URL_ENV, "https://place.example.org/")]))
                .unwrap();
        assert_eq!(config.api_url, "https://place.example.org");
        assert_eq!(config.ws_url, "wss://place.example.org");
        assert_eq!(config.room_slug, DEFAULT_ROOM);
    }

    #[test]
    fn test_explicit_values_win() {
        let config = ClientConfig::from_lookup(lookup(&[
            (API_URL_ENV, "http://api:3000"),
            (WS_URL_ENV, "ws://sockets:3001"),
            (ROOM_ENV, "art"),
        ]))
        .unwrap();
        assert_eq!(config.ws_url, "ws://sockets:3001");
        assert_eq!(config.room_slug, "art");
    }

    #[test]
    fn test_unsupported_scheme() {
        assert!(matches!(
            ClientConfig::from_lookup(lookup(&[(API_URL_ENV, "ftp://x")])),
            Err(ConfigError::UnsupportedScheme(_))
        ));
    }
}
