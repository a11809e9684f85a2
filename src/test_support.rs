//! Scripted transport and token helpers for unit tests

use crate::error::{HttpError, StorageError};
use crate::storage::{MemoryStorage, SecureStorage};
use crate::transport::{ApiRequest, ApiResponse, Transport};
use crate::types::{TokenPair, UserProfile};
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use parking_lot::{Mutex, RwLock};
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, AUTHORIZATION};
use reqwest::{Method, StatusCode};
use std::sync::Arc;
use std::time::Duration;

/// A request as it reached the wire, default headers applied
#[derive(Debug, Clone)]
pub(crate) struct Call {
    pub method: Method,
    pub path: String,
    pub authorization: Option<String>,
    pub body: Option<serde_json::Value>,
}

type Responder = Box<dyn Fn(&Call) -> Result<ApiResponse, HttpError> + Send + Sync>;

/// Transport that records every call and answers through a closure after a
/// short delay, so that concurrent callers overlap.
pub(crate) struct ScriptedTransport {
    defaults: RwLock<HeaderMap>,
    calls: Mutex<Vec<Call>>,
    responder: Responder,
    latency: Duration,
}

impl ScriptedTransport {
    pub fn new(
        responder: impl Fn(&Call) -> Result<ApiResponse, HttpError> + Send + Sync + 'static,
    ) -> Arc<Self> {
        Arc::new(Self {
            defaults: RwLock::new(HeaderMap::new()),
            calls: Mutex::new(Vec::new()),
            responder: Box::new(responder),
            latency: Duration::from_millis(20),
        })
    }

    /// Answers every request with an empty 200
    pub fn ok() -> Arc<Self> {
        Self::new(|_| Ok(empty()))
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().clone()
    }

    pub fn count(&self, path: &str) -> usize {
        self.calls.lock().iter().filter(|c| c.path == path).count()
    }
}

impl Transport for ScriptedTransport {
    async fn send(&self, request: ApiRequest) -> Result<ApiResponse, HttpError> {
        let mut headers = self.defaults.read().clone();
        headers.extend(request.headers);

        let call = Call {
            method: request.method,
            path: request.path.trim_start_matches('/').to_string(),
            authorization: headers
                .get(AUTHORIZATION)
                .and_then(|v| v.to_str().ok())
                .map(str::to_string),
            body: request.body,
        };
        self.calls.lock().push(call.clone());

        tokio::time::sleep(self.latency).await;
        (self.responder)(&call)
    }

    fn set_default_header(&self, name: HeaderName, value: Option<HeaderValue>) {
        let mut defaults = self.defaults.write();
        match value {
            Some(value) => {
                defaults.insert(name, value);
            }
            None => {
                defaults.remove(name);
            }
        }
    }

    fn default_header(&self, name: &HeaderName) -> Option<HeaderValue> {
        self.defaults.read().get(name).cloned()
    }
}

pub(crate) fn empty() -> ApiResponse {
    ApiResponse {
        status: StatusCode::OK,
        body: b"{}".to_vec(),
    }
}

pub(crate) fn json_body(value: serde_json::Value) -> Result<ApiResponse, HttpError> {
    Ok(ApiResponse {
        status: StatusCode::OK,
        body: value.to_string().into_bytes(),
    })
}

pub(crate) fn login_body(access: &str, refresh: &str) -> Result<ApiResponse, HttpError> {
    json_body(serde_json::json!({ "access_jwt": access, "refresh_jwt": refresh }))
}

pub(crate) fn status(call: &Call, status: StatusCode) -> Result<ApiResponse, HttpError> {
    Err(HttpError::Status {
        url: call.path.clone(),
        status,
        body: String::new(),
    })
}

/// An unsigned JWT whose payload carries the given `exp`
pub(crate) fn jwt(exp: impl std::fmt::Display) -> String {
    format!(
        "{}.{}.signature",
        URL_SAFE_NO_PAD.encode(r#"{"alg":"HS256","typ":"JWT"}"#),
        URL_SAFE_NO_PAD.encode(format!(r#"{{"sub":"1","exp":{exp}}}"#))
    )
}

pub(crate) fn test_user() -> UserProfile {
    serde_json::from_value(serde_json::json!({ "id": 1, "name": "Test User" }))
        .expect("valid profile")
}

/// Memory storage whose individual operations can be made to fail, like a
/// keychain that is locked or unavailable
#[derive(Default)]
pub(crate) struct FlakyStorage {
    inner: MemoryStorage,
    fail_load: bool,
    fail_save: bool,
    fail_clear: bool,
}

impl FlakyStorage {
    pub fn new(inner: MemoryStorage) -> Self {
        Self {
            inner,
            ..Self::default()
        }
    }

    /// Every operation fails
    pub fn broken() -> Self {
        Self::new(MemoryStorage::new()).fail_load().fail_save().fail_clear()
    }

    pub fn fail_load(mut self) -> Self {
        self.fail_load = true;
        self
    }

    pub fn fail_save(mut self) -> Self {
        self.fail_save = true;
        self
    }

    pub fn fail_clear(mut self) -> Self {
        self.fail_clear = true;
        self
    }

    pub fn snapshot(&self) -> Option<TokenPair> {
        self.inner.snapshot()
    }
}

fn locked() -> StorageError {
    StorageError::Io("keychain locked".to_string())
}

impl SecureStorage for FlakyStorage {
    async fn load(&self) -> Result<Option<TokenPair>, StorageError> {
        if self.fail_load {
            return Err(locked());
        }
        self.inner.load().await
    }

    async fn save(&self, tokens: &TokenPair) -> Result<(), StorageError> {
        if self.fail_save {
            return Err(locked());
        }
        self.inner.save(tokens).await
    }

    async fn clear(&self) -> Result<(), StorageError> {
        if self.fail_clear {
            return Err(locked());
        }
        self.inner.clear().await
    }
}
