//! Storage trait definitions.

use crate::StorageResult;
use async_trait::async_trait;

/// Trait for secure storage backends
#[async_trait]
pub trait SecureStorage: Send + Sync {
    /// Store a value securely
    async fn set(&self, key: &str, value: &str) -> StorageResult<()>;

    /// Retrieve a value
    async fn get(&self, key: &str) -> StorageResult<Option<String>>;

    /// Delete a value. Returns false if nothing was stored.
    async fn delete(&self, key: &str) -> StorageResult<bool>;

    /// Check if a key exists
    async fn has(&self, key: &str) -> StorageResult<bool> {
        Ok(self.get(key).await?.is_some())
    }

    /// Short name of the backend, for logs.
    fn backend(&self) -> &'static str;
}
