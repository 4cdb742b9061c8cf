//! Manifest persistence.
//!
//! The manifest is a single pretty-printed JSON document. Every call reads
//! from disk; nothing is cached between calls.
//!
//! Writes go to a uniquely named temp file in the same directory and are
//! renamed into place, so readers only ever see a complete document.
//! Concurrent writers are last-write-wins: there is no version check
//! before the rename.

use std::path::Path;

use super::types::{default_manifest, Manifest, ManifestError};

/// Load and validate the manifest at `path`.
pub fn load(path: &Path) -> Result<Manifest, ManifestError> {
    if !path.exists() {
        return Err(ManifestError::NotFound(path.to_path_buf()));
    }

    let raw = std::fs::read(path).map_err(|e| ManifestError::Read(e).at(path))?;
    Manifest::parse(&raw).map_err(|e| e.at(path))
}

/// Persist `manifest` to `path`, creating parent directories as needed.
pub fn save(path: &Path, manifest: &Manifest) -> Result<(), std::io::Error> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let contents = manifest
        .to_pretty_json()
        .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;

    let tmp_path = crate::util::unique_temp_path(path);
    if let Err(e) = std::fs::write(&tmp_path, contents) {
        let _ = std::fs::remove_file(&tmp_path);
        return Err(e);
    }
    if let Err(e) = std::fs::rename(&tmp_path, path) {
        let _ = std::fs::remove_file(&tmp_path);
        return Err(e);
    }

    tracing::debug!("Saved manifest to {}", path.display());
    Ok(())
}

/// Write the built-in manifest if nothing exists at `path` yet.
///
/// Returns `true` when a file was created. Never overwrites.
pub fn initialize_if_absent(path: &Path) -> Result<bool, std::io::Error> {
    if path.exists() {
        return Ok(false);
    }

    save(path, &default_manifest())?;
    tracing::info!("Created default manifest at {}", path.display());
    Ok(true)
}
