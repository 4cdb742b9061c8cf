//! Provider orchestration.
//!
//! [`AgentVaultService`] is the façade the CLI and HTTP API call into. It
//! holds no state beyond the manifest location and its collaborators: every
//! call reloads the manifest from disk, so a write by one caller is visible
//! to the very next read by any other.
//!
//! ## Flow
//!
//! ```text
//!   caller ──► AgentVaultService ──► manifest::store (load/save)
//!                    │
//!                    ├──► policy::select      (run context)
//!                    ├──► SecretStore          (has/get/set/delete)
//!                    └──► ReachabilityProbe    (endpoint checks)
//! ```
//!
//! Manifest and secret-store access is synchronous. The async operations
//! run those reads on the blocking pool so slow disk or a slow OS keyring
//! never stalls the runtime.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use futures::stream::{self, StreamExt};
use serde::Serialize;
use thiserror::Error;

use crate::config::{Config, DEFAULT_PROBE_CONCURRENCY};
use crate::error::Result;
use crate::manifest::{self, Manifest, ProviderConfig, ProviderType};
use crate::policy;
use crate::probe::{ReachabilityProbe, TcpProbe};
use crate::vault::{self, SecretStore, SharedSecretStore, VaultError};

/// Failure reason recorded when a provider's secret is absent.
pub const MISSING_SECRET: &str = "missing secret";
/// Failure reason recorded when a provider's endpoint does not answer.
pub const ENDPOINT_UNREACHABLE: &str = "endpoint unreachable";

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ServiceError {
    #[error("Secret cannot be empty")]
    EmptySecret,

    #[error("Provider not found: {0}")]
    UnknownProvider(String),

    #[error("Provider has no vault_key: {0}")]
    MissingVaultKey(String),
}

/// Whether a provider's credential is in the secret store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SecretState {
    Present,
    Absent,
    /// The provider has no `vault_key`.
    NotApplicable,
}

impl SecretState {
    pub fn as_bool(self) -> Option<bool> {
        match self {
            Self::Present => Some(true),
            Self::Absent => Some(false),
            Self::NotApplicable => None,
        }
    }
}

impl From<bool> for SecretState {
    fn from(present: bool) -> Self {
        if present {
            Self::Present
        } else {
            Self::Absent
        }
    }
}

/// Whether a provider's endpoint accepted a TCP connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Reachability {
    Reachable,
    Unreachable,
    /// The provider has no `endpoint`.
    NotApplicable,
}

impl Reachability {
    pub fn as_bool(self) -> Option<bool> {
        match self {
            Self::Reachable => Some(true),
            Self::Unreachable => Some(false),
            Self::NotApplicable => None,
        }
    }
}

impl From<bool> for Reachability {
    fn from(reachable: bool) -> Self {
        if reachable {
            Self::Reachable
        } else {
            Self::Unreachable
        }
    }
}

/// Manifest entry joined with live secret-store and network state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProviderStatus {
    pub name: String,
    #[serde(rename = "type")]
    pub provider_type: ProviderType,
    pub env_var: Option<String>,
    pub vault_key: Option<String>,
    pub endpoint: Option<String>,
    pub priority: Option<i64>,
    pub has_secret: SecretState,
    pub endpoint_reachable: Reachability,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderTestResult {
    pub provider: String,
    pub has_secret: SecretState,
    pub endpoint_reachable: Reachability,
    pub failures: Vec<String>,
}

impl ProviderTestResult {
    pub fn ok(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Environment overlay for one command execution. Never persisted.
#[derive(Clone, PartialEq, Eq)]
pub struct RunContext {
    pub provider: String,
    pub injected_env: HashMap<String, String>,
}

impl std::fmt::Debug for RunContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut names: Vec<_> = self.injected_env.keys().collect();
        names.sort();
        f.debug_struct("RunContext")
            .field("provider", &self.provider)
            .field("injected_env", &names)
            .finish()
    }
}

pub struct AgentVaultService {
    manifest_path: PathBuf,
    secrets: SharedSecretStore,
    probe: Arc<dyn ReachabilityProbe>,
    probe_concurrency: usize,
}

impl AgentVaultService {
    pub fn new(
        manifest_path: impl Into<PathBuf>,
        secrets: SharedSecretStore,
        probe: Arc<dyn ReachabilityProbe>,
    ) -> Self {
        Self {
            manifest_path: manifest_path.into(),
            secrets,
            probe,
            probe_concurrency: DEFAULT_PROBE_CONCURRENCY,
        }
    }

    /// Wire up the configured secret backend and a TCP prober.
    pub fn from_config(config: &Config) -> std::result::Result<Self, VaultError> {
        let secrets = vault::open_secret_store(config)?;
        let probe = Arc::new(TcpProbe::new(config.probe_timeout));
        Ok(Self::new(config.manifest_path.clone(), secrets, probe)
            .with_probe_concurrency(config.probe_concurrency))
    }

    pub fn with_probe_concurrency(mut self, limit: usize) -> Self {
        self.probe_concurrency = limit.max(1);
        self
    }

    pub fn manifest_path(&self) -> &Path {
        &self.manifest_path
    }

    /// Write the default manifest if none exists. Returns whether it did.
    pub fn initialize(&self) -> Result<bool> {
        Ok(manifest::store::initialize_if_absent(&self.manifest_path)?)
    }

    pub fn get_manifest(&self) -> Result<Manifest> {
        Ok(manifest::store::load(&self.manifest_path)?)
    }

    /// Replace the manifest. Last write wins.
    pub fn put_manifest(&self, manifest: &Manifest) -> Result<()> {
        manifest.validate()?;
        manifest::store::save(&self.manifest_path, manifest)?;
        tracing::info!(
            providers = manifest.providers.len(),
            "Manifest updated at {}",
            self.manifest_path.display()
        );
        Ok(())
    }

    /// Every provider with live status, best-ranked first.
    pub async fn list_provider_statuses(&self) -> Result<Vec<ProviderStatus>> {
        let entries = self
            .read_blocking(|path, secrets| {
                let manifest = manifest::store::load(path)?;
                policy::ranked(&manifest)
                    .into_iter()
                    .map(|(name, config)| {
                        let has_secret = secret_state(secrets, config.vault_key.as_deref())?;
                        Ok((name.to_string(), config.clone(), has_secret))
                    })
                    .collect::<Result<Vec<_>>>()
            })
            .await?;

        let endpoints = entries
            .iter()
            .map(|(_, config, _)| config.endpoint.clone())
            .collect();
        let reachability = self.probe_all(endpoints).await;

        Ok(entries
            .into_iter()
            .zip(reachability)
            .map(|((name, config, has_secret), endpoint_reachable)| ProviderStatus {
                name,
                provider_type: config.provider_type,
                env_var: config.env_var,
                vault_key: config.vault_key,
                endpoint: config.endpoint,
                priority: config.priority,
                has_secret,
                endpoint_reachable,
            })
            .collect())
    }

    pub fn set_provider_secret(&self, provider: &str, secret: &str) -> Result<()> {
        if secret.trim().is_empty() {
            return Err(ServiceError::EmptySecret.into());
        }

        let config = self.provider_config(provider)?;
        let vault_key = require_vault_key(provider, &config)?;
        self.secrets.set(vault_key, secret)?;
        tracing::info!(provider, vault_key, "Stored provider secret");
        Ok(())
    }

    /// Returns whether a secret existed.
    pub fn delete_provider_secret(&self, provider: &str) -> Result<bool> {
        let config = self.provider_config(provider)?;
        let vault_key = require_vault_key(provider, &config)?;
        let deleted = self.secrets.delete(vault_key)?;
        tracing::info!(provider, vault_key, deleted, "Deleted provider secret");
        Ok(deleted)
    }

    /// Check secret presence and endpoint reachability for one provider.
    ///
    /// Checks that do not apply are skipped rather than passed or failed.
    pub async fn test_provider(&self, provider: &str) -> Result<ProviderTestResult> {
        let name = provider.to_string();
        let (config, has_secret) = self
            .read_blocking(move |path, secrets| {
                let manifest = manifest::store::load(path)?;
                let config = manifest
                    .providers
                    .get(&name)
                    .cloned()
                    .ok_or(ServiceError::UnknownProvider(name))?;
                let has_secret = secret_state(secrets, config.vault_key.as_deref())?;
                Ok((config, has_secret))
            })
            .await?;

        let mut failures = Vec::new();
        if has_secret == SecretState::Absent {
            failures.push(MISSING_SECRET.to_string());
        }

        let endpoint_reachable = match config.endpoint.as_deref() {
            Some(endpoint) => Reachability::from(self.probe.is_reachable(endpoint).await),
            None => Reachability::NotApplicable,
        };
        if endpoint_reachable == Reachability::Unreachable {
            failures.push(ENDPOINT_UNREACHABLE.to_string());
        }

        Ok(ProviderTestResult {
            provider: provider.to_string(),
            has_secret,
            endpoint_reachable,
            failures,
        })
    }

    /// Resolve a provider and pull its secret into an env overlay.
    ///
    /// The secret is only injected when the provider has both `env_var` and
    /// `vault_key`; otherwise the overlay is empty.
    pub fn build_run_context(&self, provider_override: Option<&str>) -> Result<RunContext> {
        let manifest = self.get_manifest()?;
        let provider = policy::select(&manifest, provider_override)?;

        let mut injected_env = HashMap::new();
        if let Some((env_var, vault_key)) = manifest
            .provider(&provider)
            .and_then(ProviderConfig::injection_target)
        {
            let secret = self.secrets.get(vault_key)?;
            injected_env.insert(env_var.to_string(), secret);
        }

        let mut injected: Vec<_> = injected_env.keys().map(String::as_str).collect();
        injected.sort_unstable();
        tracing::info!(provider = %provider, injected = ?injected, "Built run context");

        Ok(RunContext {
            provider,
            injected_env,
        })
    }

    fn provider_config(&self, provider: &str) -> Result<ProviderConfig> {
        let manifest = self.get_manifest()?;
        manifest
            .providers
            .get(provider)
            .cloned()
            .ok_or_else(|| ServiceError::UnknownProvider(provider.to_string()).into())
    }

    /// Run a manifest + secret-store read on the blocking pool.
    async fn read_blocking<T, F>(&self, read: F) -> Result<T>
    where
        F: FnOnce(&Path, &dyn SecretStore) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let path = self.manifest_path.clone();
        let secrets = Arc::clone(&self.secrets);
        tokio::task::spawn_blocking(move || read(&path, &*secrets))
            .await
            .map_err(|e| VaultError::Backend(format!("Secret store task failed: {}", e)))?
    }

    /// Probe endpoints with bounded concurrency, preserving input order.
    async fn probe_all(&self, endpoints: Vec<Option<String>>) -> Vec<Reachability> {
        let probe = &self.probe;
        stream::iter(endpoints)
            .map(|endpoint| async move {
                match endpoint {
                    Some(endpoint) => Reachability::from(probe.is_reachable(&endpoint).await),
                    None => Reachability::NotApplicable,
                }
            })
            .buffered(self.probe_concurrency)
            .collect()
            .await
    }
}

fn secret_state(
    secrets: &dyn SecretStore,
    vault_key: Option<&str>,
) -> std::result::Result<SecretState, VaultError> {
    match vault_key {
        Some(key) => secrets.has(key).map(SecretState::from),
        None => Ok(SecretState::NotApplicable),
    }
}

fn require_vault_key<'a>(
    provider: &str,
    config: &'a ProviderConfig,
) -> std::result::Result<&'a str, ServiceError> {
    config
        .vault_key
        .as_deref()
        .ok_or_else(|| ServiceError::MissingVaultKey(provider.to_string()))
}
