//! Recovery from failed responses
//!
//! Every failed request passes through [`classify`], a pure transition from
//! (failure, request) to what happens next, and then through [`recover`],
//! which carries that decision out against the session.

use crate::error::{HttpError, Result, SessionError};
use crate::session::{AuthSession, SessionConfig};
use crate::storage::SecureStorage;
use crate::transport::{ApiRequest, ApiResponse, Transport};
use reqwest::StatusCode;
use std::sync::Arc;
use tracing::debug;

/// What to do with a failed request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Recovery {
    /// Hand the original error back to the caller unchanged
    Propagate,
    /// Refresh the session, joining any refresh in flight, then replay the request
    RefreshAndReplay,
}

pub fn classify(error: &HttpError, request: &ApiRequest, config: &SessionConfig) -> Recovery {
    match error.status() {
        // network or setup failure
        None => Recovery::Propagate,
        // never refresh in response to the refresh or logout calls themselves
        Some(StatusCode::UNAUTHORIZED)
            if request.targets(&config.refresh_path) || request.targets(&config.logout_path) =>
        {
            Recovery::Propagate
        }
        Some(StatusCode::UNAUTHORIZED) => Recovery::RefreshAndReplay,
        Some(_) => Recovery::Propagate,
    }
}

/// Turn a failed request into its final result for the original caller.
///
/// The refresh is shared with every other caller recovering at the same time;
/// the replay is this caller's alone and is not intercepted again.
pub async fn recover<T: Transport, S: SecureStorage>(
    session: &Arc<AuthSession<T, S>>,
    mut request: ApiRequest,
    error: HttpError,
) -> Result<ApiResponse> {
    match classify(&error, &request, session.config()) {
        Recovery::Propagate => Err(error.into()),
        Recovery::RefreshAndReplay => {
            // the stale token must not override the refreshed default header
            request.strip_authorization();
            debug!(path = %request.path, "Unauthorized, waiting for session refresh");

            session.refresh().await?;
            if !session.is_authenticated() {
                return Err(SessionError::NotLoggedIn);
            }

            debug!(path = %request.path, "Replaying request");
            Ok(session.transport().send(request).await?)
        }
    }
}
