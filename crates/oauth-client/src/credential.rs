//! The OAuth credential value type
//!
//! A `Credential` is immutable-by-replacement: every successful refresh or
//! external put installs a brand-new value built by [`Credential::apply_refresh`],
//! never an in-place mutation. `expires_at` is an absolute unix timestamp in
//! milliseconds, computed at merge time from the token response's `expires_in`
//! (seconds delta) plus the current time — no other code path advances it.

use serde::{Deserialize, Serialize};

use crate::ops::TokenResponse;

/// Current unix time in milliseconds.
pub fn now_millis() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}

/// One OAuth2 client/token tuple.
///
/// `client_id` is required and immutable for the life of a store instance.
/// The token fields are optional until the first exchange or refresh fills
/// them in.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credential {
    pub client_id: String,
    /// Absent for public/implicit flows
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_secret: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub access_token: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
    /// Expiration as unix timestamp in milliseconds
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<u64>,
}

impl Credential {
    /// Create a credential with only a client id (no tokens yet).
    pub fn new(client_id: impl Into<String>) -> Self {
        Self {
            client_id: client_id.into(),
            client_secret: None,
            access_token: None,
            refresh_token: None,
            expires_at: None,
        }
    }

    /// Signed milliseconds until expiry, negative when already past.
    ///
    /// `None` when no expiry has been recorded yet (never exchanged).
    pub fn millis_until_expiry(&self) -> Option<i64> {
        self.expires_at
            .map(|at| at as i64 - now_millis() as i64)
    }

    /// Build the replacement credential from a token endpoint response.
    ///
    /// Keeps the client id/secret, takes the new access token, falls back to
    /// the previous refresh token when the server omits one, and derives
    /// `expires_at` from `expires_in`.
    pub fn apply_refresh(&self, response: &TokenResponse) -> Credential {
        Credential {
            client_id: self.client_id.clone(),
            client_secret: self.client_secret.clone(),
            access_token: Some(response.access_token.clone()),
            refresh_token: response
                .refresh_token
                .clone()
                .or_else(|| self.refresh_token.clone()),
            expires_at: Some(now_millis().saturating_add(response.expires_in.saturating_mul(1000))),
        }
    }
}
