//! AES-256-GCM helpers for the file-backed store.
//!
//! Ciphertexts are `base64(nonce || ciphertext)` with a fresh 96-bit nonce
//! per value.

use aes_gcm::{
    aead::{Aead, KeyInit},
    Aes256Gcm, Nonce,
};
use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use rand::RngCore;

use super::VaultError;

/// Key length in bytes (256 bits for AES-256)
pub const KEY_LENGTH: usize = 32;

/// Nonce length in bytes (96 bits for AES-GCM)
const NONCE_LENGTH: usize = 12;

pub type Key = [u8; KEY_LENGTH];

pub fn generate_key() -> Key {
    let mut key = [0u8; KEY_LENGTH];
    rand::thread_rng().fill_bytes(&mut key);
    key
}

/// Parse a key from hex or base64.
pub fn parse_key(key_str: &str) -> Result<Key, VaultError> {
    let trimmed = key_str.trim();

    if trimmed.len() == KEY_LENGTH * 2 && trimmed.chars().all(|c| c.is_ascii_hexdigit()) {
        let bytes = hex::decode(trimmed).map_err(VaultError::backend)?;
        let mut key = [0u8; KEY_LENGTH];
        key.copy_from_slice(&bytes);
        return Ok(key);
    }

    let bytes = BASE64
        .decode(trimmed)
        .map_err(|_| VaultError::Backend("Key is neither valid hex nor base64".to_string()))?;
    if bytes.len() != KEY_LENGTH {
        return Err(VaultError::Backend(format!(
            "Key must be {} bytes, got {} bytes",
            KEY_LENGTH,
            bytes.len()
        )));
    }

    let mut key = [0u8; KEY_LENGTH];
    key.copy_from_slice(&bytes);
    Ok(key)
}

pub fn encrypt(key: &Key, plaintext: &str) -> Result<String, VaultError> {
    let mut nonce_bytes = [0u8; NONCE_LENGTH];
    rand::thread_rng().fill_bytes(&mut nonce_bytes);

    let cipher = Aes256Gcm::new_from_slice(key)
        .map_err(|e| VaultError::Backend(format!("Failed to create cipher: {}", e)))?;
    let ciphertext = cipher
        .encrypt(Nonce::from_slice(&nonce_bytes), plaintext.as_bytes())
        .map_err(|e| VaultError::Backend(format!("Encryption failed: {}", e)))?;

    let mut combined = Vec::with_capacity(NONCE_LENGTH + ciphertext.len());
    combined.extend_from_slice(&nonce_bytes);
    combined.extend_from_slice(&ciphertext);
    Ok(BASE64.encode(&combined))
}

pub fn decrypt(key: &Key, encoded: &str) -> Result<String, VaultError> {
    let combined = BASE64
        .decode(encoded)
        .map_err(|e| VaultError::Backend(format!("Failed to decode stored secret: {}", e)))?;
    if combined.len() < NONCE_LENGTH {
        return Err(VaultError::Backend("Stored secret too short".to_string()));
    }

    let (nonce_bytes, ciphertext) = combined.split_at(NONCE_LENGTH);
    let cipher = Aes256Gcm::new_from_slice(key)
        .map_err(|e| VaultError::Backend(format!("Failed to create cipher: {}", e)))?;
    let plaintext = cipher
        .decrypt(Nonce::from_slice(nonce_bytes), ciphertext)
        .map_err(|_| {
            VaultError::Backend("Decryption failed: invalid key or corrupted data".to_string())
        })?;

    String::from_utf8(plaintext)
        .map_err(|_| VaultError::Backend("Decrypted secret is not valid UTF-8".to_string()))
}
