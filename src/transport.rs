//! HTTP transport seam and the bundled reqwest implementation

use crate::error::{HttpError, Result, SessionError};
use parking_lot::RwLock;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, AUTHORIZATION};
use reqwest::{Client, Method, StatusCode};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::future::Future;
use tracing::debug;

/// Format a token as an `Authorization` header value
pub fn bearer(token: &str) -> Result<HeaderValue> {
    HeaderValue::from_str(&format!("Bearer {token}"))
        .map_err(|e| SessionError::InvalidToken(format!("not usable as a header value: {e}")))
}

/// A request as the application describes it, before default headers are applied
#[derive(Debug, Clone)]
pub struct ApiRequest {
    pub method: Method,
    /// Path relative to the transport's base URL, e.g. `auth/refresh`
    pub path: String,
    pub headers: HeaderMap,
    pub body: Option<serde_json::Value>,
}

impl ApiRequest {
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            headers: HeaderMap::new(),
            body: None,
        }
    }

    pub fn get(path: impl Into<String>) -> Self {
        Self::new(Method::GET, path)
    }

    pub fn post(path: impl Into<String>) -> Self {
        Self::new(Method::POST, path)
    }

    pub fn with_header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.headers.insert(name, value);
        self
    }

    pub fn with_json(mut self, body: &impl Serialize) -> Result<Self> {
        self.body = Some(serde_json::to_value(body)?);
        Ok(self)
    }

    /// Whether the request targets `path`, ignoring leading slashes
    pub fn targets(&self, path: &str) -> bool {
        self.path.trim_start_matches('/') == path.trim_start_matches('/')
    }

    pub(crate) fn strip_authorization(&mut self) {
        self.headers.remove(AUTHORIZATION);
    }
}

/// A successful (2xx) response
#[derive(Debug, Clone)]
pub struct ApiResponse {
    pub status: StatusCode,
    pub body: Vec<u8>,
}

impl ApiResponse {
    pub fn json<T: DeserializeOwned>(&self) -> Result<T> {
        Ok(serde_json::from_slice(&self.body)?)
    }
}

/// HTTP transport used by the session
///
/// Implementations must report every non-2xx response as
/// [`HttpError::Status`] and every failure without a response as
/// [`HttpError::NoResponse`]. Default headers are applied to each request,
/// with request-specific headers taking precedence.
pub trait Transport: Send + Sync + 'static {
    fn send(&self, request: ApiRequest) -> impl Future<Output = std::result::Result<ApiResponse, HttpError>> + Send;

    /// Set (`Some`) or remove (`None`) a header sent with every request
    fn set_default_header(&self, name: HeaderName, value: Option<HeaderValue>);

    fn default_header(&self, name: &HeaderName) -> Option<HeaderValue>;
}

/// [`Transport`] over a shared `reqwest::Client`
pub struct ReqwestTransport {
    client: Client,
    base_url: String,
    defaults: RwLock<HeaderMap>,
}

impl ReqwestTransport {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self::with_client(Client::new(), base_url)
    }

    pub fn with_client(client: Client, base_url: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into(),
            defaults: RwLock::new(HeaderMap::new()),
        }
    }

    fn url(&self, path: &str) -> String {
        format!(
            "{}/{}",
            self.base_url.trim_end_matches('/'),
            path.trim_start_matches('/')
        )
    }
}

impl Transport for ReqwestTransport {
    async fn send(&self, request: ApiRequest) -> std::result::Result<ApiResponse, HttpError> {
        let url = self.url(&request.path);

        let mut headers = self.defaults.read().clone();
        headers.extend(request.headers);

        let mut builder = self.client.request(request.method, &url).headers(headers);
        if let Some(body) = &request.body {
            builder = builder.json(body);
        }

        let response = builder.send().await?;
        let status = response.status();

        if !status.is_success() {
            // the status alone decides how the failure is handled
            let body = response.text().await.unwrap_or_default();
            debug!(url = %url, status = %status, "Request failed");
            return Err(HttpError::Status { url, status, body });
        }

        let body = response.bytes().await?.to_vec();
        Ok(ApiResponse { status, body })
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
