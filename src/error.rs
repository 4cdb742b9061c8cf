//! Crate-wide error type.

use thiserror::Error;

use crate::config::ConfigError;
use crate::manifest::ManifestError;
use crate::policy::PolicyError;
use crate::runner::RunnerError;
use crate::service::ServiceError;
use crate::vault::VaultError;

#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Manifest(#[from] ManifestError),

    #[error(transparent)]
    Policy(#[from] PolicyError),

    #[error(transparent)]
    Service(#[from] ServiceError),

    #[error(transparent)]
    Vault(#[from] VaultError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Runner(#[from] RunnerError),

    #[error("Failed to write manifest: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Caller mistakes as opposed to backend or filesystem faults.
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            Self::Manifest(_) | Self::Policy(_) | Self::Service(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, Error>;
