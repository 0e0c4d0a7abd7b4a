//! Linux Secret Service implementation.

use crate::{SecureStorage, StorageError, StorageResult};
use async_trait::async_trait;
use secret_service::{Collection, EncryptionType, SecretService};
use std::collections::HashMap;
use tracing::debug;

fn platform(e: secret_service::Error) -> StorageError {
    StorageError::Platform(e.to_string())
}

/// Secret Service based secure storage for Linux.
pub struct SecretServiceStorage {
    service_name: String,
}

impl SecretServiceStorage {
    /// Connect once to verify a Secret Service is running.
    pub async fn connect(service_name: &str) -> StorageResult<Self> {
        SecretService::connect(EncryptionType::Dh)
            .await
            .map_err(|e| {
                StorageError::Platform(format!("Failed to connect to Secret Service: {}", e))
            })?;

        Ok(Self {
            service_name: service_name.to_string(),
        })
    }

    fn build_attributes<'a>(&'a self, key: &'a str) -> HashMap<&'a str, &'a str> {
        HashMap::from([("service", self.service_name.as_str()), ("key", key)])
    }
}

async fn open_service() -> StorageResult<SecretService<'static>> {
    SecretService::connect(EncryptionType::Dh)
        .await
        .map_err(platform)
}

async fn unlocked(collection: &Collection<'_>) -> StorageResult<()> {
    if collection.is_locked().await.unwrap_or(false) {
        collection
            .unlock()
            .await
            .map_err(|e| StorageError::Platform(format!("Failed to unlock collection: {}", e)))?;
    }
    Ok(())
}

#[async_trait]
impl SecureStorage for SecretServiceStorage {
    async fn set(&self, key: &str, value: &str) -> StorageResult<()> {
        debug!(service = %self.service_name, key = %key, "Setting secret");

        let service = open_service().await?;
        let collection = service.get_default_collection().await.map_err(platform)?;
        unlocked(&collection).await?;

        let label = format!("{}/{}", self.service_name, key);
        collection
            .create_item(
                &label,
                self.build_attributes(key),
                value.as_bytes(),
                true,
                "text/plain",
            )
            .await
            .map_err(platform)?;

        Ok(())
    }

    async fn get(&self, key: &str) -> StorageResult<Option<String>> {
        debug!(service = %self.service_name, key = %key, "Getting secret");

        let service = open_service().await?;
        let collection = service.get_default_collection().await.map_err(platform)?;
        unlocked(&collection).await?;

        let items = collection
            .search_items(self.build_attributes(key))
            .await
            .map_err(platform)?;
        let Some(item) = items.first() else {
            return Ok(None);
        };

        let secret = item.get_secret().await.map_err(platform)?;
        String::from_utf8(secret)
            .map(Some)
            .map_err(|e| StorageError::Encoding(e.to_string()))
    }

    async fn delete(&self, key: &str) -> StorageResult<bool> {
        debug!(service = %self.service_name, key = %key, "Deleting secret");

        let service = open_service().await?;
        let collection = service.get_default_collection().await.map_err(platform)?;
        unlocked(&collection).await?;

        let items = collection
            .search_items(self.build_attributes(key))
            .await
            .map_err(platform)?;
        let Some(item) = items.first() else {
            return Ok(false);
        };

        item.delete().await.map_err(platform)?;
        Ok(true)
    }

    fn backend(&self) -> &'static str {
        "secret-service"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TEST_SERVICE: &str = "store.hotphone.admin.test";

    #[tokio::test]
    #[ignore] // Requires Linux Secret Service (D-Bus)
    async fn test_secret_service_operations() {
        let storage = SecretServiceStorage::connect(TEST_SERVICE).await.unwrap();
        let _ = storage.delete("test_key").await;

        storage.set("test_key", "test_value").await.unwrap();
        assert_eq!(
            storage.get("test_key").await.unwrap(),
            Some("test_value".to_string())
        );

        storage.set("test_key", "new_value").await.unwrap();
        assert_eq!(
            storage.get("test_key").await.unwrap(),
            Some("new_value".to_string())
        );

        assert!(storage.delete("test_key").await.unwrap());
        assert!(!storage.delete("test_key").await.unwrap());
        assert_eq!(storage.get("test_key").await.unwrap(), None);
    }
}
