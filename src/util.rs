//! Shared utility functions used across the codebase.

use std::path::{Path, PathBuf};

use rand::Rng;
use sha2::{Digest, Sha256};

/// Return the value of `$HOME`, falling back to the current directory.
pub fn home_dir() -> PathBuf {
    std::env::var_os("HOME")
        .or_else(|| std::env::var_os("USERPROFILE"))
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("."))
}

/// Per-user configuration directory: `$XDG_CONFIG_HOME` or `~/.config`.
pub fn config_home() -> PathBuf {
    std::env::var_os("XDG_CONFIG_HOME")
        .filter(|v| !v.is_empty())
        .map(PathBuf::from)
        .unwrap_or_else(|| home_dir().join(".config"))
}

/// Sibling temp path for an atomic write: `.<name>.<pid>.<random>.tmp`.
///
/// Unique per call, so concurrent writers (threads or processes) never
/// share a temp file.
pub fn unique_temp_path(path: &Path) -> PathBuf {
    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "data".to_string());
    let suffix: u64 = rand::thread_rng().gen();
    path.with_file_name(format!(
        ".{}.{}.{:016x}.tmp",
        file_name,
        std::process::id(),
        suffix
    ))
}

/// Compare two secrets in time independent of where they differ and of
/// their lengths. Both sides are hashed first so the fold always runs over
/// 32 bytes.
pub fn constant_time_eq(a: &str, b: &str) -> bool {
    let a = Sha256::digest(a.as_bytes());
    let b = Sha256::digest(b.as_bytes());
    a.iter().zip(b.iter()).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}

/// Hosts the dashboard is allowed to bind to.
pub fn is_loopback_host(host: &str) -> bool {
    matches!(host, "127.0.0.1" | "localhost" | "::1")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn constant_time_eq_matches_only_identical_strings() {
        assert!(constant_time_eq("topsecret", "topsecret"));
        assert!(!constant_time_eq("topsecret", "topsecreT"));
        assert!(!constant_time_eq("topsecret", "topsecret2"));
        assert!(constant_time_eq("", ""));
    }

    #[test]
    fn constant_time_eq_rejects_prefixes_and_extensions() {
        let token = "a".repeat(43);
        assert!(!constant_time_eq(&token, &token[..42]));
        assert!(!constant_time_eq(&token[..1], &token));
        assert!(!constant_time_eq("", &token));
        assert!(!constant_time_eq(&format!("{token}\0"), &token));
    }

    #[test]
    fn temp_paths_are_hidden_siblings_and_unique() {
        let target = Path::new("/data/vault.json");
        let a = unique_temp_path(target);
        let b = unique_temp_path(target);

        assert_ne!(a, b);
        assert_eq!(a.parent(), target.parent());
        let name = a.file_name().unwrap().to_string_lossy().into_owned();
        assert!(name.starts_with(".vault.json."));
        assert!(name.ends_with(".tmp"));
        assert!(name.contains(&std::process::id().to_string()));
    }

    #[test]
    fn loopback_hosts() {
        assert!(is_loopback_host("127.0.0.1"));
        assert!(is_loopback_host("localhost"));
        assert!(is_loopback_host("::1"));
        assert!(!is_loopback_host("0.0.0.0"));
        assert!(!is_loopback_host("192.168.1.10"));
    }
}
