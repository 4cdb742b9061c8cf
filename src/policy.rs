//! Provider selection.
//!
//! Pure functions over a [`Manifest`]: no I/O, fully deterministic.

use std::cmp::Ordering;

use thiserror::Error;

use crate::manifest::{Manifest, ProviderConfig};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PolicyError {
    #[error("Unknown provider: {0}")]
    UnknownProvider(String),

    #[error("No providers configured")]
    NoProviders,
}

/// Ordering shared by selection and status listing: ascending priority with
/// unset priorities last, then provider name.
pub fn rank_order(a: (&str, Option<i64>), b: (&str, Option<i64>)) -> Ordering {
    let key = |priority: Option<i64>| match priority {
        Some(p) => (0u8, p),
        None => (1u8, 0),
    };
    key(a.1).cmp(&key(b.1)).then_with(|| a.0.cmp(b.0))
}

/// All providers, best first.
pub fn ranked(manifest: &Manifest) -> Vec<(&str, &ProviderConfig)> {
    let mut providers: Vec<_> = manifest
        .providers
        .iter()
        .map(|(name, config)| (name.as_str(), config))
        .collect();
    providers.sort_by(|a, b| rank_order((a.0, a.1.priority), (b.0, b.1.priority)));
    providers
}

/// Resolve which provider a run should use.
///
/// An explicit override must name a configured provider. Without one, the
/// top-ranked provider wins.
pub fn select(manifest: &Manifest, explicit: Option<&str>) -> Result<String, PolicyError> {
    if manifest.providers.is_empty() {
        return Err(PolicyError::NoProviders);
    }

    if let Some(name) = explicit {
        if !manifest.providers.contains_key(name) {
            return Err(PolicyError::UnknownProvider(name.to_string()));
        }
        return Ok(name.to_string());
    }

    ranked(manifest)
        .first()
        .map(|(name, _)| (*name).to_string())
        .ok_or(PolicyError::NoProviders)
}
