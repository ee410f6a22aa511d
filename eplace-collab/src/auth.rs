//! Authentication collaborator.
//!
//! The client never manages credentials itself. It asks an
//! [`AuthProvider`] for a currently valid bearer token before placing a
//! pixel, and tells it when the authority rejects the session.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use serde::Deserialize;

/// Tokens expiring within this window are treated as already expired.
pub const EXPIRY_SKEW: Duration = Duration::from_secs(60);

pub const TOKEN_ENV: &str = "EPLACE_TOKEN";

pub trait AuthProvider: Send + Sync {
    /// A bearer token that is not expired, if the user has one.
    fn valid_token(&self) -> Option<String>;

    /// The authority rejected the session, or a token was needed and none
    /// was available.
    fn on_unauthenticated(&self);
}

#[derive(Deserialize)]
struct Claims {
    #[serde(default)]
    exp: Option<u64>,
}

/// Read-only view of a JWT bearer token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BearerToken {
    raw: String,
    expires_at: Option<u64>,
}

impl BearerToken {
    /// Parse the `exp` claim. Signature is not checked; the authority does
    /// that.
    pub fn parse(raw: impl Into<String>) -> Self {
        let raw = raw.into();
        let expires_at = raw
            .split('.')
            .nth(1)
            .and_then(|payload| URL_SAFE_NO_PAD.decode(payload.trim_end_matches('=')).ok())
            .and_then(|bytes| serde_json::from_slice::<Claims>(&bytes).ok())
            .and_then(|claims| claims.exp);
        Self { raw, expires_at }
    }

    pub fn as_str(&self) -> &str {
        &self.raw
    }

    /// Expiry as seconds since the Unix epoch.
    pub fn expires_at(&self) -> Option<u64> {
        self.expires_at
    }

    /// Expired (or about to) at `now`. A token without `exp` counts as
    /// expired.
    pub fn is_expired_at(&self, now: SystemTime) -> bool {
        let Some(exp) = self.expires_at else {
            return true;
        };
        let now = now
            .duration_since(UNIX_EPOCH)
            .unwrap_or(Duration::ZERO)
            .as_secs();
        now.saturating_add(EXPIRY_SKEW.as_secs()) >= exp
    }

    pub fn is_expired(&self) -> bool {
        self.is_expired_at(SystemTime::now())
    }
}

/// Fixed token, or none. Counts re-authentication requests.
#[derive(Debug, Default)]
pub struct StaticAuth {
    token: Option<BearerToken>,
    unauthenticated: AtomicUsize,
}

impl StaticAuth {
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: Some(BearerToken::parse(token)),
            unauthenticated: AtomicUsize::new(0),
        }
    }

    pub fn anonymous() -> Self {
        Self::default()
    }

    /// How many times the session asked for re-authentication.
    pub fn unauthenticated_count(&self) -> usize {
        self.unauthenticated.load(Ordering::Relaxed)
    }
}

impl AuthProvider for StaticAuth {
    fn valid_token(&self) -> Option<String> {
        self.token
            .as_ref()
            .filter(|t| !t.is_expired())
            .map(|t| t.as_str().to_string())
    }

    fn on_unauthenticated(&self) {
        self.unauthenticated.fetch_add(1, Ordering::Relaxed);
        log::warn!("Session is not authenticated");
    }
}

/// Token read from an environment variable on every request.
#[derive(Debug, Clone)]
pub struct EnvAuth {
    var: String,
}

impl EnvAuth {
    pub fn new(var: impl Into<String>) -> Self {
        Self { var: var.into() }
    }
}

impl Default for EnvAuth {
    fn default() -> Self {
        Self::new(TOKEN_ENV)
    }
}

impl AuthProvider for EnvAuth {
    fn valid_token(&self) -> Option<String> {
        let raw = std::env::var(&self.var).ok().filter(|v| !v.is_empty())?;
        let token = BearerToken::parse(raw);
        if token.is_expired() {
            log::warn!("Token in {} is expired", self.var);
            return None;
        }
        Some(token.raw)
    }

    fn on_unauthenticated(&self) {
        log::warn!("Authentication required: set {} to a valid bearer token", self.var);
    }
}
