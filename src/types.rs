//! Type definitions for the session client

use serde::{Deserialize, Serialize};

/// Access + refresh token pair
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenPair {
    pub access: String,
    pub refresh: String,
}

impl TokenPair {
    pub fn new(access: impl Into<String>, refresh: impl Into<String>) -> Self {
        Self {
            access: access.into(),
            refresh: refresh.into(),
        }
    }
}

/// Body returned by the login and refresh endpoints
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoginResponse {
    pub access_jwt: String,
    pub refresh_jwt: String,
}

impl From<LoginResponse> for TokenPair {
    fn from(response: LoginResponse) -> Self {
        Self {
            access: response.access_jwt,
            refresh: response.refresh_jwt,
        }
    }
}

/// The part of a JWT payload the session interprets
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Claims {
    /// Expiry, seconds since the Unix epoch. May be fractional.
    pub exp: Option<f64>,
}

impl Claims {
    /// Whether the token is still usable at `now` (seconds since epoch),
    /// treating it as expired `leeway_secs` early.
    ///
    /// A token without an expiry claim is never considered valid.
    pub fn is_valid_at(&self, now: i64, leeway_secs: u64) -> bool {
        match self.exp {
            Some(exp) => exp > now as f64 + leeway_secs as f64,
            None => false,
        }
    }
}

/// Profile of the logged-in user
///
/// Only `id` is required, and it is kept as whatever JSON the server sends
/// (number, string, UUID).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserProfile {
    pub id: serde_json::Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Any other fields the server sends along
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

pub(crate) fn unix_now() -> i64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or_default()
}
