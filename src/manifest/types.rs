//! Typed provider registry and its validation rules.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ManifestError {
    #[error("Manifest not found at {0}")]
    NotFound(PathBuf),

    #[error("Failed to read manifest: {0}")]
    Read(#[from] std::io::Error),

    #[error("Invalid JSON in manifest: {0}")]
    Malformed(#[from] serde_json::Error),

    #[error("Manifest validation failed: {0}")]
    Invalid(String),

    #[error("{path}: {source}")]
    AtPath {
        path: PathBuf,
        #[source]
        source: Box<ManifestError>,
    },
}

impl ManifestError {
    /// Attach the manifest location to a parse or validation failure.
    pub fn at(self, path: impl Into<PathBuf>) -> Self {
        match self {
            Self::NotFound(_) | Self::AtPath { .. } => self,
            other => Self::AtPath {
                path: path.into(),
                source: Box::new(other),
            },
        }
    }
}

/// Kind of AI service a provider entry points at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProviderType {
    Upstream,
    Gateway,
    Local,
    FreeTier,
}

impl ProviderType {
    pub fn id(&self) -> &'static str {
        match self {
            Self::Upstream => "upstream",
            Self::Gateway => "gateway",
            Self::Local => "local",
            Self::FreeTier => "free_tier",
        }
    }

    pub fn from_id(id: &str) -> Option<Self> {
        match id {
            "upstream" => Some(Self::Upstream),
            "gateway" => Some(Self::Gateway),
            "local" => Some(Self::Local),
            "free_tier" => Some(Self::FreeTier),
            _ => None,
        }
    }
}

impl std::fmt::Display for ProviderType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.id())
    }
}

/// One provider entry in the manifest.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderConfig {
    #[serde(rename = "type")]
    pub provider_type: ProviderType,
    /// Secret-store key holding this provider's credential. `None` means no
    /// credential is required.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vault_key: Option<String>,
    /// Environment variable that receives the secret at run time.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub env_var: Option<String>,
    /// URL used for reachability probing.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub endpoint: Option<String>,
    /// Lower is preferred; unset sorts after every explicit value.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub priority: Option<i64>,
}

impl ProviderConfig {
    pub fn new(provider_type: ProviderType) -> Self {
        Self {
            provider_type,
            vault_key: None,
            env_var: None,
            endpoint: None,
            priority: None,
        }
    }

    pub fn with_vault_key(mut self, key: impl Into<String>) -> Self {
        self.vault_key = Some(key.into());
        self
    }

    pub fn with_env_var(mut self, var: impl Into<String>) -> Self {
        self.env_var = Some(var.into());
        self
    }

    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = Some(endpoint.into());
        self
    }

    pub fn with_priority(mut self, priority: i64) -> Self {
        self.priority = Some(priority);
        self
    }

    /// Secret injection only happens when both halves are configured.
    pub fn injection_target(&self) -> Option<(&str, &str)> {
        match (self.env_var.as_deref(), self.vault_key.as_deref()) {
            (Some(env_var), Some(vault_key)) => Some((env_var, vault_key)),
            _ => None,
        }
    }
}

/// The persisted provider registry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Manifest {
    pub version: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub identity: Option<String>,
    /// Keyed by provider name; `BTreeMap` keeps serialized output stable.
    pub providers: BTreeMap<String, ProviderConfig>,
}

impl Manifest {
    pub fn new(version: impl Into<String>) -> Self {
        Self {
            version: version.into(),
            identity: None,
            providers: BTreeMap::new(),
        }
    }

    pub fn with_provider(mut self, name: impl Into<String>, config: ProviderConfig) -> Self {
        self.providers.insert(name.into(), config);
        self
    }

    /// Parse and validate raw manifest bytes. Never yields a partial model.
    pub fn parse(raw: &[u8]) -> Result<Self, ManifestError> {
        let manifest: Manifest = serde_json::from_slice(raw)?;
        manifest.validate()?;
        Ok(manifest)
    }

    /// Checks the rules serde cannot express on its own.
    pub fn validate(&self) -> Result<(), ManifestError> {
        if self.version.is_empty() {
            return Err(ManifestError::Invalid(
                "version must be a non-empty string".to_string(),
            ));
        }
        if self.providers.keys().any(|name| name.is_empty()) {
            return Err(ManifestError::Invalid(
                "provider names must be non-empty".to_string(),
            ));
        }
        Ok(())
    }

    pub fn to_pretty_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    pub fn provider(&self, name: &str) -> Option<&ProviderConfig> {
        self.providers.get(name)
    }
}

/// Built-in manifest written by `init`: one provider per optional-field shape.
pub fn default_manifest() -> Manifest {
    Manifest {
        version: "2026.1".to_string(),
        identity: Some("primary-dev-node".to_string()),
        providers: BTreeMap::new(),
    }
    .with_provider(
        "openai_pro",
        ProviderConfig::new(ProviderType::Upstream)
            .with_vault_key("api.openai.com/pro_key")
            .with_env_var("OPENAI_API_KEY")
            .with_priority(1),
    )
    .with_provider(
        "openrouter",
        ProviderConfig::new(ProviderType::Gateway)
            .with_vault_key("api.openrouter.ai/default")
            .with_env_var("OPENROUTER_API_KEY")
            .with_endpoint("https://openrouter.ai/api/v1")
            .with_priority(2),
    )
    .with_provider(
        "local_ollama",
        ProviderConfig::new(ProviderType::Local)
            .with_endpoint("http://localhost:11434")
            .with_priority(10),
    )
}
