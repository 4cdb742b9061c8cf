use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};

use super::{SecretStore, VaultError};

/// In-process secret store. Used by tests and as a throwaway backend.
#[derive(Debug, Default)]
pub struct MemorySecretStore {
    service: String,
    secrets: Mutex<HashMap<String, String>>,
    /// When set, every operation fails with this backend message.
    failure: Mutex<Option<String>>,
}

impl MemorySecretStore {
    pub fn new(service: impl Into<String>) -> Self {
        Self {
            service: service.into(),
            ..Default::default()
        }
    }

    /// Make every subsequent call fail as a malfunctioning backend would.
    pub fn fail_with(&self, message: impl Into<String>) {
        *self.failure.lock().unwrap_or_else(PoisonError::into_inner) = Some(message.into());
    }

    pub fn recover(&self) {
        *self.failure.lock().unwrap_or_else(PoisonError::into_inner) = None;
    }

    pub fn stored_value(&self, key: &str) -> Option<String> {
        self.secrets
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(key)
            .cloned()
    }

    fn check(&self) -> Result<(), VaultError> {
        match self
            .failure
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
        {
            Some(message) => Err(VaultError::Backend(message.clone())),
            None => Ok(()),
        }
    }
}

impl SecretStore for MemorySecretStore {
    fn service(&self) -> &str {
        &self.service
    }

    fn set(&self, key: &str, value: &str) -> Result<(), VaultError> {
        self.check()?;
        self.secrets
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn get(&self, key: &str) -> Result<String, VaultError> {
        self.check()?;
        self.stored_value(key)
            .filter(|v| !v.is_empty())
            .ok_or_else(|| VaultError::not_found(&self.service, key))
    }

    fn has(&self, key: &str) -> Result<bool, VaultError> {
        self.check()?;
        Ok(self.stored_value(key).is_some_and(|v| !v.is_empty()))
    }

    fn delete(&self, key: &str) -> Result<bool, VaultError> {
        self.check()?;
        Ok(self
            .secrets
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(key)
            .is_some())
    }
}
