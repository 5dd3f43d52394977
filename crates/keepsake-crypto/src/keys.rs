//! Vault key resolution.
//!
//! Lookup order: (1) the configured environment variable (hex-encoded
//! 32 bytes), (2) the configured key file (raw 32 bytes), (3) generate a
//! fresh random key and persist it to the key file. Persistence is
//! write-once; there is no rotation.

use chacha20poly1305::{aead::OsRng, ChaCha20Poly1305, KeyInit};
use std::fs;
use std::io::Write;
use std::path::Path;

use keepsake_core::constants::KEY_LEN;
use keepsake_core::{EncryptionConfig, VaultError};

/// Resolve the vault key per the lookup order above.
pub fn load_or_generate_key(config: &EncryptionConfig) -> Result<[u8; KEY_LEN], VaultError> {
    if let Some(var) = &config.key_env_var {
        if let Ok(encoded) = std::env::var(var) {
            return key_from_hex(&encoded);
        }
    }

    if let Some(path) = &config.key_file {
        if path.exists() {
            return key_from_file(path);
        }
    }

    let key = ChaCha20Poly1305::generate_key(&mut OsRng);
    let mut out = [0u8; KEY_LEN];
    out.copy_from_slice(&key);

    if let Some(path) = &config.key_file {
        persist_key(path, &out)?;
    }
    Ok(out)
}

fn key_from_hex(encoded: &str) -> Result<[u8; KEY_LEN], VaultError> {
    let bytes = hex::decode(encoded.trim())
        .map_err(|e| VaultError::KeyMaterial(format!("invalid hex key material: {e}")))?;
    key_from_bytes(&bytes)
}

fn key_from_file(path: &Path) -> Result<[u8; KEY_LEN], VaultError> {
    let bytes = fs::read(path)
        .map_err(|e| VaultError::KeyMaterial(format!("reading key file: {e}")))?;
    key_from_bytes(&bytes)
}

fn key_from_bytes(bytes: &[u8]) -> Result<[u8; KEY_LEN], VaultError> {
    if bytes.len() != KEY_LEN {
        return Err(VaultError::KeyMaterial(format!(
            "key must be {} bytes, got {}",
            KEY_LEN,
            bytes.len()
        )));
    }
    let mut key = [0u8; KEY_LEN];
    key.copy_from_slice(bytes);
    Ok(key)
}

/// Write a freshly generated key with owner-only permissions. Refuses to
/// overwrite an existing file.
fn persist_key(path: &Path, key: &[u8; KEY_LEN]) -> Result<(), VaultError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .map_err(|e| VaultError::KeyMaterial(format!("creating key directory: {e}")))?;
    }

    let mut options = fs::OpenOptions::new();
    options.write(true).create_new(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        options.mode(0o600);
    }

    let mut file = options
        .open(path)
        .map_err(|e| VaultError::KeyMaterial(format!("creating key file: {e}")))?;
    file.write_all(key)
        .map_err(|e| VaultError::KeyMaterial(format!("writing key file: {e}")))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    struct TempDir(PathBuf);

    impl TempDir {
        fn new(tag: &str) -> Self {
            let dir = std::env::temp_dir().join(format!(
                "keepsake_keys_{tag}_{}",
                std::process::id()
            ));
            let _ = fs::remove_dir_all(&dir);
            fs::create_dir_all(&dir).unwrap();
            Self(dir)
        }
    }

    impl Drop for TempDir {
        fn drop(&mut self) {
            let _ = fs::remove_dir_all(&self.0);
        }
    }

    #[test]
    fn generates_and_persists_then_reloads_same_key() {
        let tmp = TempDir::new("gen");
        let config = EncryptionConfig {
            key_env_var: None,
            key_file: Some(tmp.0.join("vault.key")),
        };
        let first = load_or_generate_key(&config).unwrap();
        let second = load_or_generate_key(&config).unwrap();
        assert_eq!(first, second);
        assert_eq!(fs::read(tmp.0.join("vault.key")).unwrap().len(), KEY_LEN);
    }

    #[test]
    fn env_var_takes_precedence_over_file() {
        let tmp = TempDir::new("env");
        let key_path = tmp.0.join("vault.key");
        fs::write(&key_path, [0x11u8; KEY_LEN]).unwrap();

        let var = format!("KEEPSAKE_TEST_KEY_{}", std::process::id());
        std::env::set_var(&var, hex::encode([0x22u8; KEY_LEN]));
        let config = EncryptionConfig {
            key_env_var: Some(var.clone()),
            key_file: Some(key_path),
        };
        let key = load_or_generate_key(&config).unwrap();
        std::env::remove_var(&var);
        assert_eq!(key, [0x22u8; KEY_LEN]);
    }

    #[test]
    fn rejects_wrong_length_key_material() {
        let tmp = TempDir::new("short");
        let key_path = tmp.0.join("vault.key");
        fs::write(&key_path, [0u8; 16]).unwrap();
        let config = EncryptionConfig {
            key_env_var: None,
            key_file: Some(key_path),
        };
        assert!(matches!(
            load_or_generate_key(&config),
            Err(VaultError::KeyMaterial(_))
        ));
    }
}
