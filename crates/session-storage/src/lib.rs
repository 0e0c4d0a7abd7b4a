//! Secure storage for the persisted admin session.
//!
//! Platform backends:
//! - **macOS**: Keychain Access via `security-framework`
//! - **Linux**: Secret Service (GNOME Keyring / KWallet) via `secret-service`
//! - **Everywhere else**, or when the Secret Service is unreachable: an
//!   owner-only JSON file written atomically
//!
//! [`MemoryStorage`] keeps values in process, for tests and embedders that
//! must not touch the user's keychain.

mod file;
mod keys;
mod memory;
mod traits;

#[cfg(target_os = "macos")]
mod macos;

#[cfg(target_os = "linux")]
mod linux;

pub use file::FileStorage;
pub use keys::StorageKeys;
pub use memory::MemoryStorage;
pub use traits::SecureStorage;

use std::path::Path;
use std::sync::Arc;
use thiserror::Error;

/// Service name used for all keychain entries.
pub const SERVICE_NAME: &str = "store.hotphone.admin";

/// Error type for storage operations.
#[derive(Error, Debug)]
pub enum StorageError {
    /// Platform-specific storage error
    #[error("Platform storage error: {0}")]
    Platform(String),

    /// Encoding/decoding error
    #[error("Encoding error: {0}")]
    Encoding(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;

/// Create the platform storage, falling back to an owner-only file at
/// `fallback_file` when no keychain is available.
pub async fn create_storage(fallback_file: &Path) -> Arc<dyn SecureStorage> {
    #[cfg(target_os = "macos")]
    {
        let _ = fallback_file;
        Arc::new(macos::KeychainStorage::new(SERVICE_NAME))
    }

    #[cfg(target_os = "linux")]
    {
        match linux::SecretServiceStorage::connect(SERVICE_NAME).await {
            Ok(storage) => Arc::new(storage),
            Err(e) => {
                tracing::warn!(
                    error = %e,
                    path = %fallback_file.display(),
                    "Secret Service unavailable, storing session in owner-only file"
                );
                Arc::new(FileStorage::new(fallback_file))
            }
        }
    }

    #[cfg(not(any(target_os = "macos", target_os = "linux")))]
    {
        Arc::new(FileStorage::new(fallback_file))
    }
}
