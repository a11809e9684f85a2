//! Session Rust Client
//!
//! A client-side session manager that sits between application code and an
//! HTTP transport: it keeps the token pair, runs at most one token refresh at
//! a time, transparently replays requests that failed with 401, and coalesces
//! concurrent fetches of the current user's profile.

pub mod auth_client;
pub mod error;
pub mod interceptor;
pub mod jwt;
pub mod session;
pub mod session_state;
pub mod single_flight;
pub mod storage;
pub mod token_store;
pub mod transport;
pub mod types;
pub mod user;

#[cfg(test)]
pub(crate) mod test_support;

pub use auth_client::AuthClient;
pub use error::{HttpError, Result, SessionError, StorageError};
pub use interceptor::Recovery;
pub use jwt::{ClaimsDecoder, UnverifiedJwtDecoder};
pub use session::{AuthSession, SessionConfig};
pub use session_state::SessionState;
pub use single_flight::SingleFlight;
pub use storage::{MemoryStorage, NoStorage, SecureStorage};
pub use token_store::TokenStore;
pub use transport::{ApiRequest, ApiResponse, ReqwestTransport, Transport};
pub use types::{Claims, LoginResponse, TokenPair, UserProfile};
pub use user::UserProfileCache;
