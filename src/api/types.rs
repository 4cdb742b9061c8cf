//! API request and response types.

use serde::{Deserialize, Serialize};

use crate::manifest::Manifest;
use crate::service::{ProviderStatus, ProviderTestResult, Reachability, SecretState};

/// Health check response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct ProvidersResponse {
    pub providers: Vec<ProviderStatus>,
}

/// Body of `POST /providers/:name/secret`.
#[derive(Debug, Clone, Deserialize)]
pub struct SetSecretRequest {
    pub secret: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusResponse {
    pub status: String,
}

impl StatusResponse {
    pub fn new(status: &str) -> Self {
        Self {
            status: status.to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeleteSecretResponse {
    pub deleted: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct ProviderTestResponse {
    pub provider: String,
    pub ok: bool,
    pub has_secret: SecretState,
    pub endpoint_reachable: Reachability,
    pub failures: Vec<String>,
}

impl From<ProviderTestResult> for ProviderTestResponse {
    fn from(result: ProviderTestResult) -> Self {
        Self {
            ok: result.ok(),
            provider: result.provider,
            has_secret: result.has_secret,
            endpoint_reachable: result.endpoint_reachable,
            failures: result.failures,
        }
    }
}

/// `GET /manifest` response.
#[derive(Debug, Clone, Serialize)]
pub struct ManifestResponse {
    pub manifest: Manifest,
}

/// `PUT /manifest` body. The manifest stays untyped here so that shape
/// errors surface as manifest validation failures rather than extractor
/// rejections.
#[derive(Debug, Clone, Deserialize)]
pub struct UpdateManifestRequest {
    pub manifest: serde_json::Value,
}

/// Error body for every failed request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub detail: String,
}
