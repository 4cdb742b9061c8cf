//! Encrypted JSON file backend.
//!
//! Layout: `{ "<service>": { "<key>": "<base64 nonce||ciphertext>" } }`.
//! The AES key comes from configuration, or from a key file beside the
//! store that is generated on first use.
//!
//! Read-modify-write cycles hold an exclusive lock on `<path>.lock`, so
//! several stores on one file (in this process or another) never lose each
//! other's updates. Each write goes to a unique temp file that is renamed
//! into place.

use std::collections::BTreeMap;
use std::fs::File;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use fs2::FileExt;

use super::crypto::{self, Key};
use super::{SecretStore, VaultError};

type Document = BTreeMap<String, BTreeMap<String, String>>;

pub struct EncryptedFileSecretStore {
    path: PathBuf,
    service: String,
    key: Key,
    /// Serializes read-modify-write cycles on this instance. Other
    /// instances and processes are excluded by the lock file.
    write_lock: Mutex<()>,
}

impl std::fmt::Debug for EncryptedFileSecretStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EncryptedFileSecretStore")
            .field("path", &self.path)
            .field("service", &self.service)
            .finish_non_exhaustive()
    }
}

impl EncryptedFileSecretStore {
    /// Open the store at `path`. With no explicit key, the key file
    /// `<path>.key` is read or created.
    pub fn open(path: &Path, service: &str, key: Option<&str>) -> Result<Self, VaultError> {
        let key = match key {
            Some(k) => crypto::parse_key(k)?,
            None => load_or_create_key_file(&path.with_extension("key"))?,
        };
        Ok(Self::with_key(path, service, key))
    }

    pub fn with_key(path: &Path, service: &str, key: Key) -> Self {
        Self {
            path: path.to_path_buf(),
            service: service.to_string(),
            key,
            write_lock: Mutex::new(()),
        }
    }

    fn read_document(&self) -> Result<Document, VaultError> {
        if !self.path.exists() {
            return Ok(Document::new());
        }
        let contents = std::fs::read_to_string(&self.path).map_err(VaultError::backend)?;
        serde_json::from_str(&contents).map_err(|e| {
            VaultError::Backend(format!(
                "Corrupted secret file {}: {}",
                self.path.display(),
                e
            ))
        })
    }

    fn write_document(&self, document: &Document) -> Result<(), VaultError> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent).map_err(VaultError::backend)?;
        }
        let contents = serde_json::to_string_pretty(document).map_err(VaultError::backend)?;
        let tmp_path = crate::util::unique_temp_path(&self.path);
        if let Err(e) = write_private(&tmp_path, contents.as_bytes()) {
            let _ = std::fs::remove_file(&tmp_path);
            return Err(VaultError::backend(e));
        }
        if let Err(e) = std::fs::rename(&tmp_path, &self.path) {
            let _ = std::fs::remove_file(&tmp_path);
            return Err(VaultError::backend(e));
        }
        Ok(())
    }

    /// Take the in-process guard, then the cross-process file lock.
    fn lock(&self) -> Result<(std::sync::MutexGuard<'_, ()>, LockedFile), VaultError> {
        let guard = self.write_lock.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent).map_err(VaultError::backend)?;
        }
        let file = std::fs::OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(self.path.with_extension("lock"))
            .map_err(VaultError::backend)?;
        FileExt::lock_exclusive(&file).map_err(VaultError::backend)?;
        Ok((guard, LockedFile { file }))
    }

    fn lookup(&self, key: &str) -> Result<Option<String>, VaultError> {
        let document = self.read_document()?;
        let Some(encoded) = document.get(&self.service).and_then(|s| s.get(key)) else {
            return Ok(None);
        };
        let secret = crypto::decrypt(&self.key, encoded)?;
        Ok(if secret.is_empty() { None } else { Some(secret) })
    }
}

impl SecretStore for EncryptedFileSecretStore {
    fn service(&self) -> &str {
        &self.service
    }

    fn set(&self, key: &str, value: &str) -> Result<(), VaultError> {
        let encoded = crypto::encrypt(&self.key, value)?;
        let _lock = self.lock()?;
        let mut document = self.read_document()?;
        document
            .entry(self.service.clone())
            .or_default()
            .insert(key.to_string(), encoded);
        self.write_document(&document)?;
        tracing::trace!(
            service = %self.service,
            key,
            value_len = value.len(),
            "Stored secret in file backend"
        );
        Ok(())
    }

    fn get(&self, key: &str) -> Result<String, VaultError> {
        self.lookup(key)?
            .ok_or_else(|| VaultError::not_found(&self.service, key))
    }

    fn has(&self, key: &str) -> Result<bool, VaultError> {
        Ok(self.lookup(key)?.is_some())
    }

    fn delete(&self, key: &str) -> Result<bool, VaultError> {
        let _lock = self.lock()?;
        let mut document = self.read_document()?;
        let Some(entries) = document.get_mut(&self.service) else {
            return Ok(false);
        };
        if entries.remove(key).is_none() {
            return Ok(false);
        }
        if entries.is_empty() {
            document.remove(&self.service);
        }
        self.write_document(&document)?;
        Ok(true)
    }
}

/// Exclusive lock on the store's lock file. Unlocks on drop.
struct LockedFile {
    file: File,
}

impl Drop for LockedFile {
    fn drop(&mut self) {
        let _ = FileExt::unlock(&self.file);
    }
}

fn load_or_create_key_file(key_path: &Path) -> Result<Key, VaultError> {
    if key_path.exists() {
        let contents = std::fs::read_to_string(key_path).map_err(VaultError::backend)?;
        return crypto::parse_key(&contents);
    }

    if let Some(parent) = key_path.parent() {
        std::fs::create_dir_all(parent).map_err(VaultError::backend)?;
    }
    let key = crypto::generate_key();
    write_private(key_path, hex::encode(key).as_bytes()).map_err(VaultError::backend)?;
    tracing::info!("Generated new secret-store key at {}", key_path.display());
    Ok(key)
}

#[cfg(unix)]
fn write_private(path: &Path, contents: &[u8]) -> std::io::Result<()> {
    use std::io::Write;
    use std::os::unix::fs::OpenOptionsExt;

    let mut file = std::fs::OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(true)
        .mode(0o600)
        .open(path)?;
    file.write_all(contents)
}

#[cfg(not(unix))]
fn write_private(path: &Path, contents: &[u8]) -> std::io::Result<()> {
    std::fs::write(path, contents)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store_in(dir: &Path, service: &str) -> EncryptedFileSecretStore {
        EncryptedFileSecretStore::open(&dir.join("vault.json"), service, None).unwrap()
    }

    #[test]
    fn set_get_has_delete() {
        let temp = tempfile::tempdir().expect("tempdir");
        let store = store_in(temp.path(), "agent_vault");

        assert!(!store.has("svc/p").unwrap());
        store.set("svc/p", "s3cr3t").unwrap();
        assert!(store.has("svc/p").unwrap());
        assert_eq!(store.get("svc/p").unwrap(), "s3cr3t");

        assert!(store.delete("svc/p").unwrap());
        assert!(!store.delete("svc/p").unwrap());
        assert!(matches!(
            store.get("svc/p"),
            Err(VaultError::NotFound { .. })
        ));
    }

    #[test]
    fn secrets_are_not_stored_in_plaintext() {
        let temp = tempfile::tempdir().expect("tempdir");
        let store = store_in(temp.path(), "agent_vault");
        store.set("k", "plain-text-canary").unwrap();

        let raw = std::fs::read_to_string(temp.path().join("vault.json")).unwrap();
        assert!(!raw.contains("plain-text-canary"));
    }

    #[test]
    fn key_file_is_reused_across_opens() {
        let temp = tempfile::tempdir().expect("tempdir");
        store_in(temp.path(), "agent_vault").set("k", "v").unwrap();

        let reopened = store_in(temp.path(), "agent_vault");
        assert_eq!(reopened.get("k").unwrap(), "v");
    }

    #[test]
    fn services_are_isolated() {
        let temp = tempfile::tempdir().expect("tempdir");
        let a = store_in(temp.path(), "a");
        let b = store_in(temp.path(), "b");

        a.set("shared/key", "from-a").unwrap();
        assert!(!b.has("shared/key").unwrap());
        assert!(!b.delete("shared/key").unwrap());
        assert_eq!(a.get("shared/key").unwrap(), "from-a");
    }

    #[test]
    fn wrong_key_is_backend_error_not_absence() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join("vault.json");
        EncryptedFileSecretStore::with_key(&path, "s", [1u8; 32])
            .set("k", "v")
            .unwrap();

        let other = EncryptedFileSecretStore::with_key(&path, "s", [2u8; 32]);
        assert!(matches!(other.has("k"), Err(VaultError::Backend(_))));
        assert!(matches!(other.get("k"), Err(VaultError::Backend(_))));
    }

    #[test]
    fn corrupted_file_is_backend_error() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join("vault.json");
        std::fs::write(&path, "garbage").unwrap();

        let store = EncryptedFileSecretStore::with_key(&path, "s", [1u8; 32]);
        assert!(matches!(store.has("k"), Err(VaultError::Backend(_))));
    }

    #[test]
    fn independent_stores_on_one_file_keep_every_write() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join("vault.json");
        let stores = [
            EncryptedFileSecretStore::with_key(&path, "s", [1u8; 32]),
            EncryptedFileSecretStore::with_key(&path, "s", [1u8; 32]),
        ];

        std::thread::scope(|scope| {
            for (id, store) in stores.iter().enumerate() {
                scope.spawn(move || {
                    for i in 0..100 {
                        store.set(&format!("w{id}/k{i}"), "v").unwrap();
                    }
                });
            }
        });

        let reader = EncryptedFileSecretStore::with_key(&path, "s", [1u8; 32]);
        for id in 0..2 {
            for i in 0..100 {
                assert!(reader.has(&format!("w{id}/k{i}")).unwrap(), "lost w{id}/k{i}");
            }
        }
        let leftovers: Vec<_> = std::fs::read_dir(temp.path())
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .filter(|name| name.ends_with(".tmp"))
            .collect();
        assert!(leftovers.is_empty(), "temp files left behind: {leftovers:?}");
    }

    #[test]
    fn explicit_key_skips_key_file() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join("vault.json");
        let key_hex = hex::encode([7u8; 32]);

        let store = EncryptedFileSecretStore::open(&path, "s", Some(&key_hex)).unwrap();
        store.set("k", "v").unwrap();
        assert!(!temp.path().join("vault.key").exists());
    }
}
