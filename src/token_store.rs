//! In-memory token pair backed by secure storage

use crate::error::{Result, SessionError};
use crate::storage::SecureStorage;
use crate::transport::{bearer, Transport};
use crate::types::TokenPair;
use parking_lot::RwLock;
use reqwest::header::AUTHORIZATION;
use std::sync::Arc;
use tracing::debug;

/// Holds the current token pair
///
/// The pair is mirrored in memory; durable persistence is delegated to the
/// [`SecureStorage`] backend. Whenever a pair is installed, the transport's
/// default `Authorization` header is pointed at the new access token.
pub struct TokenStore<T, S> {
    tokens: RwLock<Option<TokenPair>>,
    storage: S,
    transport: Arc<T>,
}

impl<T: Transport, S: SecureStorage> TokenStore<T, S> {
    pub fn new(storage: S, transport: Arc<T>) -> Self {
        Self {
            tokens: RwLock::new(None),
            storage,
            transport,
        }
    }

    /// Persist the pair, mirror it in memory and authorize subsequent requests with it
    pub async fn store(&self, tokens: TokenPair) -> Result<()> {
        let header = bearer(&tokens.access)?;
        self.storage.save(&tokens).await?;

        *self.tokens.write() = Some(tokens);
        self.transport.set_default_header(AUTHORIZATION, Some(header));
        debug!("Stored new token pair");

        Ok(())
    }

    /// Erase both tokens from memory and storage
    ///
    /// The in-memory pair and the default header are always dropped, even when
    /// the storage backend fails.
    pub async fn clear(&self) -> Result<()> {
        self.tokens.write().take();
        self.transport.set_default_header(AUTHORIZATION, None);
        self.storage.clear().await?;
        Ok(())
    }

    pub async fn access(&self) -> Result<String> {
        match self.current().await? {
            Some(tokens) => Ok(tokens.access),
            None => Err(SessionError::NoAccessToken),
        }
    }

    pub async fn refresh(&self) -> Result<String> {
        match self.current().await? {
            Some(tokens) if !tokens.refresh.is_empty() => Ok(tokens.refresh),
            _ => Err(SessionError::NoRefreshToken),
        }
    }

    /// Whether a pair is held in memory, without touching storage
    pub fn contains(&self) -> bool {
        self.tokens.read().is_some()
    }

    async fn current(&self) -> Result<Option<TokenPair>> {
        let cached = self.tokens.read().clone();
        if cached.is_some() {
            return Ok(cached);
        }

        let Some(tokens) = self.storage.load().await? else {
            return Ok(None);
        };

        debug!("Loaded token pair from secure storage");
        let header = bearer(&tokens.access)?;
        *self.tokens.write() = Some(tokens.clone());
        self.transport.set_default_header(AUTHORIZATION, Some(header));

        Ok(Some(tokens))
    }
}
