//! Application-facing request surface with transparent session recovery

use crate::error::Result;
use crate::interceptor;
use crate::session::AuthSession;
use crate::storage::SecureStorage;
use crate::transport::{ApiRequest, ApiResponse, Transport};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::sync::Arc;

/// Sends requests through the session's transport
///
/// Failures go through the [interceptor](crate::interceptor): a 401 is
/// answered with a shared token refresh and a replay of the original request,
/// everything else reaches the caller unchanged.
pub struct AuthClient<T, S> {
    session: Arc<AuthSession<T, S>>,
}

impl<T, S> Clone for AuthClient<T, S> {
    fn clone(&self) -> Self {
        Self {
            session: Arc::clone(&self.session),
        }
    }
}

impl<T: Transport, S: SecureStorage> AuthClient<T, S> {
    pub fn new(session: Arc<AuthSession<T, S>>) -> Self {
        Self { session }
    }

    pub fn session(&self) -> &Arc<AuthSession<T, S>> {
        &self.session
    }

    pub async fn request(&self, request: ApiRequest) -> Result<ApiResponse> {
        match self.session.transport().send(request.clone()).await {
            Ok(response) => Ok(response),
            Err(error) => interceptor::recover(&self.session, request, error).await,
        }
    }

    pub async fn get<R: DeserializeOwned>(&self, path: &str) -> Result<R> {
        self.request(ApiRequest::get(path)).await?.json()
    }

    pub async fn post<B: Serialize, R: DeserializeOwned>(&self, path: &str, body: &B) -> Result<R> {
        self.request(ApiRequest::post(path).with_json(body)?).await?.json()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{HttpError, SessionError};
    use crate::session::SessionConfig;
    use crate::storage::MemoryStorage;
    use crate::test_support::{json_body, login_body, status, ScriptedTransport};
    use crate::types::TokenPair;
    use futures_util::future::join_all;
    use pretty_assertions::assert_eq;
    use reqwest::header::{HeaderValue, AUTHORIZATION};
    use reqwest::StatusCode;
    use serde_json::{json, Value};

    /// Accepts only `Bearer A2` on protected routes, refresh hands out A2/R2
    fn api() -> Arc<ScriptedTransport> {
        ScriptedTransport::new(|call| match call.path.as_str() {
            "auth/refresh" => login_body("A2", "R2"),
            _ if call.authorization.as_deref() == Some("Bearer A2") => {
                json_body(json!({ "path": call.path }))
            }
            _ => status(call, StatusCode::UNAUTHORIZED),
        })
    }

    async fn logged_in_client(
        transport: &Arc<ScriptedTransport>,
    ) -> AuthClient<ScriptedTransport, MemoryStorage> {
        let session = AuthSession::new(SessionConfig::default(), Arc::clone(transport), MemoryStorage::new());
        session.token_store().store(TokenPair::new("A1", "R1")).await.unwrap();
        AuthClient::new(session)
    }

    #[tokio::test]
    async fn test_concurrent_unauthorized_requests_share_one_refresh() {
        let transport = api();
        let client = logged_in_client(&transport).await;

        let paths = ["orders", "invoices", "settings", "team"];
        let results = join_all(paths.iter().map(|path| client.get::<Value>(path))).await;

        assert_eq!(transport.count("auth/refresh"), 1);
        for (path, result) in paths.iter().zip(results) {
            assert_eq!(result.unwrap(), json!({ "path": path }));
            assert_eq!(transport.count(path), 2);
        }
        assert!(client.session().is_authenticated());
        assert_eq!(
            transport.default_header(&AUTHORIZATION).unwrap(),
            HeaderValue::from_static("Bearer A2")
        );
    }

    #[tokio::test]
    async fn test_later_expiry_triggers_a_new_refresh() {
        let transport = api();
        let client = logged_in_client(&transport).await;

        client.get::<Value>("orders").await.unwrap();
        client.session().token_store().store(TokenPair::new("A3", "R2")).await.unwrap();
        client.get::<Value>("orders").await.unwrap();

        assert_eq!(transport.count("auth/refresh"), 2);
    }

    #[tokio::test]
    async fn test_failed_refresh_reaches_every_caller() {
        let transport = ScriptedTransport::new(|call| status(call, StatusCode::UNAUTHORIZED));
        let client = logged_in_client(&transport).await;

        let (a, b) = tokio::join!(client.get::<Value>("orders"), client.get::<Value>("invoices"));

        assert!(matches!(a, Err(SessionError::RefreshFailed(_))));
        assert!(matches!(b, Err(SessionError::RefreshFailed(_))));
        assert_eq!(transport.count("auth/refresh"), 1);
        assert!(!client.session().is_authenticated());
        assert!(!client.session().token_store().contains());
    }

    #[tokio::test]
    async fn test_no_refresh_token_means_not_logged_in() {
        let transport = api();
        let session = AuthSession::new(SessionConfig::default(), Arc::clone(&transport), MemoryStorage::new());
        let client = AuthClient::new(session);

        let err = client.get::<Value>("orders").await.unwrap_err();

        assert!(matches!(err, SessionError::NotLoggedIn));
        assert_eq!(transport.count("auth/refresh"), 0);
        assert_eq!(transport.count("orders"), 1);
    }

    #[tokio::test]
    async fn test_unauthorized_refresh_request_is_not_refreshed() {
        let transport = ScriptedTransport::new(|call| status(call, StatusCode::UNAUTHORIZED));
        let client = logged_in_client(&transport).await;

        let err = client.request(ApiRequest::post("auth/refresh")).await.unwrap_err();

        assert!(err.is_unauthorized());
        assert_eq!(transport.count("auth/refresh"), 1);
    }

    #[tokio::test]
    async fn test_unauthorized_logout_request_propagates_unchanged() {
        let transport = ScriptedTransport::new(|call| status(call, StatusCode::UNAUTHORIZED));
        let client = logged_in_client(&transport).await;

        let err = client.request(ApiRequest::post("auth/logout")).await.unwrap_err();

        match err {
            SessionError::Http(HttpError::Status { url, status, .. }) => {
                assert_eq!(url, "auth/logout");
                assert_eq!(status, StatusCode::UNAUTHORIZED);
            }
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(transport.count("auth/refresh"), 0);
    }

    #[tokio::test]
    async fn test_other_failures_pass_through() {
        let transport = ScriptedTransport::new(|call| match call.path.as_str() {
            "missing" => status(call, StatusCode::NOT_FOUND),
            _ => Err(HttpError::NoResponse {
                url: call.path.clone(),
                message: "connection refused".to_string(),
            }),
        });
        let client = logged_in_client(&transport).await;

        let not_found = client.get::<Value>("missing").await.unwrap_err();
        assert!(matches!(
            not_found,
            SessionError::Http(HttpError::Status { status: StatusCode::NOT_FOUND, .. })
        ));

        let offline = client.get::<Value>("orders").await.unwrap_err();
        assert!(matches!(offline, SessionError::Http(HttpError::NoResponse { .. })));
        assert_eq!(transport.count("auth/refresh"), 0);
    }

    #[tokio::test]
    async fn test_post_sends_json_body() {
        let transport = ScriptedTransport::new(|call| json_body(call.body.clone().unwrap_or_default()));
        let client = logged_in_client(&transport).await;

        let echoed: Value = client.post("orders", &json!({ "qty": 2 })).await.unwrap();

        assert_eq!(echoed, json!({ "qty": 2 }));
        assert_eq!(transport.calls()[0].authorization.as_deref(), Some("Bearer A1"));
    }
}
