//! Session context: token pair, logged-in flag, single-flight refresh and teardown

use crate::error::{Result, SessionError};
use crate::jwt::{ClaimsDecoder, UnverifiedJwtDecoder};
use crate::session_state::SessionState;
use crate::single_flight::SingleFlight;
use crate::storage::SecureStorage;
use crate::token_store::TokenStore;
use crate::transport::{bearer, ApiRequest, Transport};
use crate::types::{unix_now, LoginResponse, TokenPair, UserProfile};
use parking_lot::RwLock;
use reqwest::header::AUTHORIZATION;
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{debug, info, warn};

/// Configuration for the session
#[derive(Debug, Clone)]
pub struct SessionConfig {
    pub login_path: String,
    pub refresh_path: String,
    pub logout_path: String,
    pub user_info_path: String,

    /// Treat the access token as expired this many seconds before its `exp` claim
    /// Default: 0
    pub expiry_leeway_secs: u64,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            login_path: "auth/login".to_string(),
            refresh_path: "auth/refresh".to_string(),
            logout_path: "auth/logout".to_string(),
            user_info_path: "user/me".to_string(),
            expiry_leeway_secs: 0,
        }
    }
}

impl SessionConfig {
    pub fn with_user_info_path(mut self, path: impl Into<String>) -> Self {
        self.user_info_path = path.into();
        self
    }

    pub fn with_expiry_leeway_secs(mut self, secs: u64) -> Self {
        self.expiry_leeway_secs = secs;
        self
    }
}

/// One authenticated session against one API
///
/// Owns everything that changes when a user logs in, refreshes or logs out.
/// Only [`TokenStore`] writes tokens and only [`SessionState`] writes the
/// logged-in flag; this type sequences the two.
pub struct AuthSession<T, S> {
    config: SessionConfig,
    transport: Arc<T>,
    tokens: TokenStore<T, S>,
    state: SessionState,
    /// Singleflight guard so concurrent 401s share one refresh exchange
    refresh_flight: SingleFlight<bool, SessionError>,
    decoder: Box<dyn ClaimsDecoder>,
    current_user: RwLock<Option<UserProfile>>,
}

impl<T: Transport, S: SecureStorage> AuthSession<T, S> {
    /// Create a logged-out session. Nothing is read from storage yet.
    pub fn new(config: SessionConfig, transport: Arc<T>, storage: S) -> Arc<Self> {
        Self::with_decoder(config, transport, storage, UnverifiedJwtDecoder)
    }

    pub fn with_decoder(
        config: SessionConfig,
        transport: Arc<T>,
        storage: S,
        decoder: impl ClaimsDecoder,
    ) -> Arc<Self> {
        Arc::new(Self {
            config,
            tokens: TokenStore::new(storage, Arc::clone(&transport)),
            transport,
            state: SessionState::new(),
            refresh_flight: SingleFlight::new(),
            decoder: Box::new(decoder),
            current_user: RwLock::new(None),
        })
    }

    /// Create a session and establish its starting state from persisted tokens
    pub async fn connect(config: SessionConfig, transport: Arc<T>, storage: S) -> Arc<Self> {
        let session = Self::new(config, transport, storage);
        let authenticated = session.is_authenticated_async().await;
        info!(authenticated, "Session restored");
        session
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn transport(&self) -> &Arc<T> {
        &self.transport
    }

    pub fn token_store(&self) -> &TokenStore<T, S> {
        &self.tokens
    }

    /// Synchronous read of the logged-in flag
    pub fn is_authenticated(&self) -> bool {
        self.state.is_logged_in()
    }

    /// Listen for logged-in / logged-out transitions
    pub fn subscribe(&self) -> watch::Receiver<bool> {
        self.state.subscribe()
    }

    /// The last fetched profile, until logout or the next fetch replaces it
    pub fn current_user(&self) -> Option<UserProfile> {
        self.current_user.read().clone()
    }

    pub(crate) fn set_current_user(&self, profile: UserProfile) {
        *self.current_user.write() = Some(profile);
    }

    pub async fn access_token(&self) -> Result<String> {
        self.tokens.access().await
    }

    /// Exchange credentials for a token pair and mark the session logged in
    pub async fn login(&self, credentials: &impl Serialize) -> Result<()> {
        let request = ApiRequest::post(&self.config.login_path).with_json(credentials)?;
        let response = self.transport.send(request).await?;
        let tokens: LoginResponse = response.json()?;

        self.tokens.store(tokens.into()).await?;
        self.current_user.write().take();
        self.state.set_logged_in(true);
        info!("Logged in");

        Ok(())
    }

    /// Obtain a fresh token pair, joining the refresh already in flight if any.
    ///
    /// Resolves to whether the session is usable afterwards. On `false` or on
    /// failure the session has been torn down before this returns.
    pub async fn refresh(self: &Arc<Self>) -> Result<bool> {
        let session = Arc::clone(self);
        self.refresh_flight.run(move || session.authorize()).await
    }

    async fn authorize(self: Arc<Self>) -> Result<bool> {
        match self.use_refresh_token().await {
            Ok(true) => {
                self.state.set_logged_in(true);
                Ok(true)
            }
            Ok(false) => {
                self.teardown().await;
                Ok(false)
            }
            Err(e) => {
                warn!(error = %e, "Token refresh failed, ending session");
                self.teardown().await;
                Err(e)
            }
        }
    }

    async fn use_refresh_token(&self) -> Result<bool> {
        let refresh = match self.tokens.refresh().await {
            Ok(refresh) => refresh,
            Err(SessionError::NoRefreshToken) => {
                debug!("No refresh token, cannot refresh");
                return Ok(false);
            }
            Err(e) => return Err(SessionError::RefreshFailed(e.to_string())),
        };

        let tokens = self
            .send_refresh_token(&refresh)
            .await
            .map_err(|e| SessionError::RefreshFailed(e.to_string()))?;

        if let Err(e) = self.tokens.clear().await {
            warn!(error = %e, "Failed to clear old tokens before storing refreshed pair");
        }
        self.tokens
            .store(tokens)
            .await
            .map_err(|e| SessionError::RefreshFailed(e.to_string()))?;
        info!("Access token refreshed successfully");

        Ok(true)
    }

    async fn send_refresh_token(&self, refresh: &str) -> Result<TokenPair> {
        let request =
            ApiRequest::post(&self.config.refresh_path).with_header(AUTHORIZATION, bearer(refresh)?);
        let response = self.transport.send(request).await?;
        let tokens: LoginResponse = response.json()?;
        Ok(tokens.into())
    }

    /// End the session.
    ///
    /// When `forced`, the server is told first; a 401 from that call is
    /// expected and ignored. Local state is cleared no matter what the network
    /// did, and any other failure of the notification is reported as
    /// [`SessionError::LogoutFailed`] afterwards.
    pub async fn logout(&self, forced: bool) -> Result<()> {
        let outcome = if forced {
            match self.transport.send(ApiRequest::post(&self.config.logout_path)).await {
                Ok(_) => Ok(()),
                Err(e) if e.is_unauthorized() => {
                    debug!("Session was already invalid on the server");
                    Ok(())
                }
                Err(e) => {
                    warn!(error = %e, "Logout notification failed");
                    Err(SessionError::LogoutFailed(e))
                }
            }
        } else {
            Ok(())
        };

        self.teardown().await;
        info!(forced, "Logged out");

        outcome
    }

    async fn teardown(&self) {
        if let Err(e) = self.tokens.clear().await {
            warn!(error = %e, "Failed to clear persisted tokens");
        }
        self.state.set_logged_in(false);
        self.current_user.write().take();
    }

    /// Establish the logged-in flag from whatever tokens were persisted.
    ///
    /// A valid access token logs the session in directly; an expired or
    /// undecodable one goes through [`refresh`](Self::refresh). No token at all resolves to `false`
    /// without side effects.
    pub async fn is_authenticated_async(self: &Arc<Self>) -> bool {
        match self.check_persisted_tokens().await {
            Ok(authenticated) => authenticated,
            Err(e) => {
                if e.is_unauthorized() {
                    self.teardown().await;
                }
                debug!(error = %e, "No usable persisted session");
                false
            }
        }
    }

    async fn check_persisted_tokens(self: &Arc<Self>) -> Result<bool> {
        let access = match self.tokens.access().await {
            Ok(access) => access,
            Err(SessionError::NoAccessToken) => return Ok(false),
            Err(e) => return Err(e),
        };

        let usable = match self.decoder.decode(&access) {
            Ok(claims) => claims.is_valid_at(unix_now(), self.config.expiry_leeway_secs),
            Err(e) => {
                warn!(error = %e, "Persisted access token is unreadable");
                false
            }
        };
        if usable {
            self.state.set_logged_in(true);
            return Ok(true);
        }

        debug!("Access token expired or unreadable, refreshing");
        let authenticated = self.refresh().await?;
        self.state.set_logged_in(authenticated);
        Ok(authenticated)
    }
}
