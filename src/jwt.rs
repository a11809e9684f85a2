//! JWT claim decoding

use crate::error::{Result, SessionError};
use crate::types::Claims;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;

/// Parses a token string into the claims the session interprets.
pub trait ClaimsDecoder: Send + Sync + 'static {
    fn decode(&self, token: &str) -> Result<Claims>;
}

/// Reads the payload segment of a JWT without verifying its signature.
///
/// Signature checks belong to the server; the client only needs `exp` to
/// decide whether a refresh is due.
#[derive(Debug, Default, Clone, Copy)]
pub struct UnverifiedJwtDecoder;

impl ClaimsDecoder for UnverifiedJwtDecoder {
    fn decode(&self, token: &str) -> Result<Claims> {
        let mut segments = token.split('.');
        let payload = match (segments.next(), segments.next(), segments.next()) {
            (Some(_), Some(payload), Some(_)) => payload,
            _ => return Err(SessionError::InvalidToken("expected three segments".to_string())),
        };

        let bytes = URL_SAFE_NO_PAD
            .decode(payload.trim_end_matches('='))
            .map_err(|e| SessionError::InvalidToken(format!("payload is not base64url: {e}")))?;

        serde_json::from_slice(&bytes)
            .map_err(|e| SessionError::InvalidToken(format!("payload is not JSON: {e}")))
    }
}
