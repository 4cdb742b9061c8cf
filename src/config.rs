//! Configuration management for agent-vault.
//!
//! Configuration can be set via environment variables:
//! - `AGENT_VAULT_MANIFEST` - Optional. Manifest path. Defaults to
//!   `$XDG_CONFIG_HOME/ai/ai_agents/manifest.json` (`XDG_CONFIG_HOME`
//!   falls back to `$HOME/.config`).
//! - `AGENT_VAULT_SERVICE` - Optional. Secret-store namespace. Defaults to `agent_vault`.
//! - `AGENT_VAULT_BACKEND` - Optional. `keyring` (default) or `file`.
//! - `AGENT_VAULT_FILE_STORE` - Optional. Encrypted store path for the `file`
//!   backend. Defaults to `vault.json` next to the manifest.
//! - `AGENT_VAULT_FILE_KEY` - Optional. 32-byte key (hex or base64) for the
//!   `file` backend. A key file is generated when unset.
//! - `AGENT_VAULT_PROBE_TIMEOUT_MS` - Optional. Per-endpoint TCP timeout. Defaults to `1000`.
//! - `AGENT_VAULT_PROBE_CONCURRENCY` - Optional. Parallel probes. Defaults to `8`.

use std::path::{Path, PathBuf};
use std::time::Duration;

use thiserror::Error;

use crate::util::config_home;

pub const DEFAULT_SERVICE_NAME: &str = "agent_vault";
pub const DEFAULT_PROBE_TIMEOUT: Duration = Duration::from_millis(1000);
pub const DEFAULT_PROBE_CONCURRENCY: usize = 8;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid value for {0}: {1}")]
    InvalidValue(String, String),
}

/// Which secret-store backend holds provider credentials.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum VaultBackend {
    #[default]
    Keyring,
    File,
}

impl std::str::FromStr for VaultBackend {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "keyring" => Ok(Self::Keyring),
            "file" => Ok(Self::File),
            other => Err(ConfigError::InvalidValue(
                "AGENT_VAULT_BACKEND".to_string(),
                format!("unknown backend '{}' (expected keyring or file)", other),
            )),
        }
    }
}

impl std::fmt::Display for VaultBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Keyring => write!(f, "keyring"),
            Self::File => write!(f, "file"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    /// Location of the provider manifest
    pub manifest_path: PathBuf,

    /// Namespace for every secret-store key
    pub service_name: String,

    pub backend: VaultBackend,

    /// Encrypted store path (file backend only)
    pub file_store_path: PathBuf,

    /// Explicit key for the file backend
    pub file_store_key: Option<String>,

    /// TCP connect timeout per endpoint probe
    pub probe_timeout: Duration,

    /// Maximum endpoint probes in flight
    pub probe_concurrency: usize,
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Load configuration through an arbitrary variable lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let manifest_path = lookup("AGENT_VAULT_MANIFEST")
            .filter(|v| !v.trim().is_empty())
            .map(PathBuf::from)
            .unwrap_or_else(|| default_manifest_path(lookup("XDG_CONFIG_HOME")));

        let service_name = lookup("AGENT_VAULT_SERVICE")
            .filter(|v| !v.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_SERVICE_NAME.to_string());

        let backend = match lookup("AGENT_VAULT_BACKEND") {
            Some(raw) if !raw.trim().is_empty() => raw.parse()?,
            _ => VaultBackend::default(),
        };

        let file_store_path = lookup("AGENT_VAULT_FILE_STORE")
            .map(PathBuf::from)
            .unwrap_or_else(|| default_file_store_path(&manifest_path));

        let probe_timeout = match lookup("AGENT_VAULT_PROBE_TIMEOUT_MS") {
            Some(raw) => {
                let millis = raw.trim().parse().map_err(|e| {
                    ConfigError::InvalidValue(
                        "AGENT_VAULT_PROBE_TIMEOUT_MS".to_string(),
                        format!("{}", e),
                    )
                })?;
                Duration::from_millis(millis)
            }
            None => DEFAULT_PROBE_TIMEOUT,
        };

        let probe_concurrency = match lookup("AGENT_VAULT_PROBE_CONCURRENCY") {
            Some(raw) => {
                let n: usize = raw.trim().parse().map_err(|e| {
                    ConfigError::InvalidValue(
                        "AGENT_VAULT_PROBE_CONCURRENCY".to_string(),
                        format!("{}", e),
                    )
                })?;
                if n == 0 {
                    return Err(ConfigError::InvalidValue(
                        "AGENT_VAULT_PROBE_CONCURRENCY".to_string(),
                        "must be at least 1".to_string(),
                    ));
                }
                n
            }
            None => DEFAULT_PROBE_CONCURRENCY,
        };

        Ok(Self {
            manifest_path,
            service_name,
            backend,
            file_store_path,
            file_store_key: lookup("AGENT_VAULT_FILE_KEY").filter(|v| !v.trim().is_empty()),
            probe_timeout,
            probe_concurrency,
        })
    }

    /// Create a config rooted at a specific manifest (useful for testing).
    pub fn new(manifest_path: PathBuf) -> Self {
        let file_store_path = default_file_store_path(&manifest_path);
        Self {
            manifest_path,
            service_name: DEFAULT_SERVICE_NAME.to_string(),
            backend: VaultBackend::default(),
            file_store_path,
            file_store_key: None,
            probe_timeout: DEFAULT_PROBE_TIMEOUT,
            probe_concurrency: DEFAULT_PROBE_CONCURRENCY,
        }
    }

    /// Point at a different manifest, keeping a derived file-store path in step.
    pub fn with_manifest_path(mut self, manifest_path: PathBuf) -> Self {
        if self.file_store_path == default_file_store_path(&self.manifest_path) {
            self.file_store_path = default_file_store_path(&manifest_path);
        }
        self.manifest_path = manifest_path;
        self
    }
}

fn default_manifest_path(xdg_config_home: Option<String>) -> PathBuf {
    let base = xdg_config_home
        .filter(|v| !v.trim().is_empty())
        .map(PathBuf::from)
        .unwrap_or_else(config_home);
    base.join("ai").join("ai_agents").join("manifest.json")
}

fn default_file_store_path(manifest_path: &Path) -> PathBuf {
    manifest_path
        .parent()
        .map(|dir| dir.join("vault.json"))
        .unwrap_or_else(|| PathBuf::from("vault.json"))
}
