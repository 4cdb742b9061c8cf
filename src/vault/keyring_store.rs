use keyring::Entry;
use tracing::trace;

use super::{SecretStore, VaultError};

/// OS-native secret storage via the `keyring` crate.
#[derive(Debug, Clone)]
pub struct KeyringSecretStore {
    service: String,
}

impl KeyringSecretStore {
    pub fn new(service: impl Into<String>) -> Self {
        Self {
            service: service.into(),
        }
    }

    fn entry(&self, key: &str) -> Result<Entry, VaultError> {
        Entry::new(&self.service, key).map_err(VaultError::backend)
    }

    /// `Ok(None)` for a missing or empty entry.
    fn load(&self, key: &str) -> Result<Option<String>, VaultError> {
        let service = &self.service;
        trace!("keyring.load start, service={service}, key={key}");
        match self.entry(key)?.get_password() {
            Ok(secret) if secret.is_empty() => Ok(None),
            Ok(secret) => {
                trace!("keyring.load success, service={service}, key={key}");
                Ok(Some(secret))
            }
            Err(keyring::Error::NoEntry) => {
                trace!("keyring.load no entry, service={service}, key={key}");
                Ok(None)
            }
            Err(error) => {
                trace!("keyring.load error, service={service}, key={key}, error={error}");
                Err(VaultError::backend(error))
            }
        }
    }
}

impl SecretStore for KeyringSecretStore {
    fn service(&self) -> &str {
        &self.service
    }

    fn set(&self, key: &str, value: &str) -> Result<(), VaultError> {
        let service = &self.service;
        trace!(
            "keyring.save start, service={service}, key={key}, value_len={}",
            value.len()
        );
        self.entry(key)?.set_password(value).map_err(|error| {
            trace!("keyring.save error, service={service}, key={key}, error={error}");
            VaultError::backend(error)
        })
    }

    fn get(&self, key: &str) -> Result<String, VaultError> {
        self.load(key)?
            .ok_or_else(|| VaultError::not_found(&self.service, key))
    }

    fn has(&self, key: &str) -> Result<bool, VaultError> {
        Ok(self.load(key)?.is_some())
    }

    fn delete(&self, key: &str) -> Result<bool, VaultError> {
        let service = &self.service;
        trace!("keyring.delete start, service={service}, key={key}");
        match self.entry(key)?.delete_credential() {
            Ok(()) => Ok(true),
            Err(keyring::Error::NoEntry) => {
                trace!("keyring.delete no entry, service={service}, key={key}");
                Ok(false)
            }
            Err(error) => Err(VaultError::backend(error)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // Mock credentials are fresh per `Entry`, so only absence is observable.
    fn mock_store() -> KeyringSecretStore {
        keyring::set_default_credential_builder(keyring::mock::default_credential_builder());
        KeyringSecretStore::new("agent_vault_test")
    }

    #[test]
    fn missing_entry_is_absence_not_error() {
        let store = mock_store();

        assert!(!store.has("api.example.com/key").unwrap());
        assert!(!store.delete("api.example.com/key").unwrap());
        assert!(matches!(
            store.get("api.example.com/key"),
            Err(VaultError::NotFound { .. })
        ));
    }

    #[test]
    fn service_namespace_is_fixed() {
        let store = KeyringSecretStore::new("svc");
        assert_eq!(store.service(), "svc");
    }
}
