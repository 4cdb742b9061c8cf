//! Secret store adapter.
//!
//! The orchestration layer only sees [`SecretStore`]. Each backend instance
//! is bound to a single service namespace; keys are the manifest's
//! `vault_key` values.
//!
//! ## Backends
//!
//! - [`KeyringSecretStore`]: OS-native keychain / credential manager /
//!   secret service (default)
//! - [`EncryptedFileSecretStore`]: AES-256-GCM encrypted JSON file
//! - [`MemorySecretStore`]: in-process, for tests
//!
//! "Not present" and "backend malfunction" are always distinct: `has` and
//! `delete` answer `false` for absence and only error on malfunction.

mod crypto;
mod file;
mod keyring_store;
mod memory;

use std::sync::Arc;

use thiserror::Error;

use crate::config::{Config, VaultBackend};

pub use self::file::EncryptedFileSecretStore;
pub use self::keyring_store::KeyringSecretStore;
pub use self::memory::MemorySecretStore;

#[derive(Debug, Error)]
pub enum VaultError {
    #[error("No secret found for key '{key}' in service '{service}'")]
    NotFound { service: String, key: String },

    #[error("Secret store error: {0}")]
    Backend(String),
}

impl VaultError {
    pub fn not_found(service: &str, key: &str) -> Self {
        Self::NotFound {
            service: service.to_string(),
            key: key.to_string(),
        }
    }

    pub fn backend(err: impl std::fmt::Display) -> Self {
        Self::Backend(err.to_string())
    }
}

/// Namespaced key/value capability backing provider credentials.
pub trait SecretStore: std::fmt::Debug + Send + Sync {
    /// Service namespace all keys live under.
    fn service(&self) -> &str;

    fn set(&self, key: &str, value: &str) -> Result<(), VaultError>;

    /// Fails with [`VaultError::NotFound`] when nothing is stored.
    fn get(&self, key: &str) -> Result<String, VaultError>;

    fn has(&self, key: &str) -> Result<bool, VaultError>;

    /// Returns `false` when there was nothing to delete.
    fn delete(&self, key: &str) -> Result<bool, VaultError>;
}

pub type SharedSecretStore = Arc<dyn SecretStore>;

/// Build the backend selected by configuration.
pub fn open_secret_store(config: &Config) -> Result<SharedSecretStore, VaultError> {
    let store: SharedSecretStore = match config.backend {
        VaultBackend::Keyring => Arc::new(KeyringSecretStore::new(&config.service_name)),
        VaultBackend::File => Arc::new(EncryptedFileSecretStore::open(
            &config.file_store_path,
            &config.service_name,
            config.file_store_key.as_deref(),
        )?),
    };
    tracing::debug!(
        backend = %config.backend,
        service = %config.service_name,
        "Opened secret store"
    );
    Ok(store)
}
