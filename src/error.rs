//! Error types for the session client

use reqwest::StatusCode;
use thiserror::Error;

/// Transport failure handed back verbatim to the caller.
///
/// The session layer only ever inspects the status code; everything else is
/// passed through untouched.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum HttpError {
    /// The request never produced a response (network or setup failure).
    #[error("Request to {url} failed without a response: {message}")]
    NoResponse { url: String, message: String },

    /// The server answered with a non-success status.
    #[error("Request to {url} failed with status {status}")]
    Status {
        url: String,
        status: StatusCode,
        body: String,
    },
}

impl HttpError {
    /// Status code of the response, if there was one.
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            Self::NoResponse { .. } => None,
            Self::Status { status, .. } => Some(*status),
        }
    }

    pub fn is_unauthorized(&self) -> bool {
        self.status() == Some(StatusCode::UNAUTHORIZED)
    }
}

impl From<reqwest::Error> for HttpError {
    fn from(err: reqwest::Error) -> Self {
        let url = err.url().map(|u| u.to_string()).unwrap_or_default();
        match err.status() {
            Some(status) => Self::Status {
                url,
                status,
                body: String::new(),
            },
            None => Self::NoResponse {
                url,
                message: err.to_string(),
            },
        }
    }
}

/// Failure reported by a [`SecureStorage`](crate::storage::SecureStorage) backend.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StorageError {
    #[error("Secure storage I/O failed: {0}")]
    Io(String),
}

/// Session error types
#[derive(Error, Debug, Clone)]
pub enum SessionError {
    #[error("No access token")]
    NoAccessToken,

    #[error("No refresh token")]
    NoRefreshToken,

    #[error("Failed to use refresh token: {0}")]
    RefreshFailed(String),

    #[error("user is not logged in")]
    NotLoggedIn,

    #[error("Something went wrong, please try again later")]
    LogoutFailed(#[source] HttpError),

    #[error(transparent)]
    Http(#[from] HttpError),

    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error("Invalid token: {0}")]
    InvalidToken(String),

    #[error("Invalid response: {0}")]
    Decode(String),

    #[error("Background task failed: {0}")]
    Task(String),
}

impl SessionError {
    /// True when the error is a pass-through transport failure with a 401 status.
    pub fn is_unauthorized(&self) -> bool {
        matches!(self, Self::Http(err) if err.is_unauthorized())
    }
}

impl From<serde_json::Error> for SessionError {
    fn from(err: serde_json::Error) -> Self {
        Self::Decode(err.to_string())
    }
}

impl From<tokio::task::JoinError> for SessionError {
    fn from(err: tokio::task::JoinError) -> Self {
        Self::Task(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, SessionError>;
