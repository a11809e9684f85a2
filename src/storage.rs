//! Durable token persistence

use crate::error::StorageError;
use crate::types::TokenPair;
use parking_lot::Mutex;
use std::future::Future;

/// Secure storage backend for the token pair
///
/// Platform integrations (keychain, keystore, ...) implement this trait; the
/// session only ever loads, saves or clears the whole pair.
pub trait SecureStorage: Send + Sync + 'static {
    /// Load the persisted pair, `None` when nothing is stored
    fn load(&self) -> impl Future<Output = Result<Option<TokenPair>, StorageError>> + Send;

    fn save(&self, tokens: &TokenPair) -> impl Future<Output = Result<(), StorageError>> + Send;

    /// Erase the persisted pair. Must succeed when nothing is stored.
    fn clear(&self) -> impl Future<Output = Result<(), StorageError>> + Send;
}

/// Storage for deployments without a secure store: nothing survives the process
#[derive(Debug, Default, Clone, Copy)]
pub struct NoStorage;

impl SecureStorage for NoStorage {
    async fn load(&self) -> Result<Option<TokenPair>, StorageError> {
        Ok(None)
    }

    async fn save(&self, _tokens: &TokenPair) -> Result<(), StorageError> {
        Ok(())
    }

    async fn clear(&self) -> Result<(), StorageError> {
        Ok(())
    }
}

/// In-process storage
#[derive(Debug, Default)]
pub struct MemoryStorage {
    tokens: Mutex<Option<TokenPair>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a storage that already holds a pair, as if persisted by an earlier run
    pub fn with_tokens(tokens: TokenPair) -> Self {
        Self {
            tokens: Mutex::new(Some(tokens)),
        }
    }

    pub fn snapshot(&self) -> Option<TokenPair> {
        self.tokens.lock().clone()
    }
}

impl SecureStorage for MemoryStorage {
    async fn load(&self) -> Result<Option<TokenPair>, StorageError> {
        Ok(self.tokens.lock().clone())
    }

    async fn save(&self, tokens: &TokenPair) -> Result<(), StorageError> {
        *self.tokens.lock() = Some(tokens.clone());
        Ok(())
    }

    async fn clear(&self) -> Result<(), StorageError> {
        self.tokens.lock().take();
        Ok(())
    }
}
