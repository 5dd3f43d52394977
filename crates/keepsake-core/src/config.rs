use std::path::PathBuf;
use std::time::Duration;

use crate::constants::{
    CACHE_TTL_SECS, DEFAULT_KEYWORD_BOOST, DEFAULT_MAX_RESULTS, DEFAULT_MIN_SIMILARITY,
    SCHEMA_VERSION,
};

/// Where the AEAD key comes from, tried in order: environment variable
/// (hex-encoded 32 bytes), key file (raw 32 bytes), then generate-and-persist.
#[derive(Debug, Clone)]
pub struct EncryptionConfig {
    /// Name of an environment variable holding the hex-encoded key.
    pub key_env_var: Option<String>,
    /// Path to the raw key file; created with owner-only permissions when a
    /// fresh key is generated.
    pub key_file: Option<PathBuf>,
}

impl Default for EncryptionConfig {
    fn default() -> Self {
        Self {
            key_env_var: Some("KEEPSAKE_VAULT_KEY".into()),
            key_file: Some("keepsake_data/vault.key".into()),
        }
    }
}

/// On-disk locations for the two stores.
#[derive(Debug, Clone)]
pub struct StorageConfig {
    /// The single encrypted vault file (nonce ‖ AEAD ciphertext).
    pub vault_path: PathBuf,
    /// Directory for the sled slice index. Local-only, not AEAD-encrypted.
    pub index_path: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            vault_path: "keepsake_data/vault.bin".into(),
            index_path: "keepsake_data/index".into(),
        }
    }
}

/// Retrieval scoring knobs.
#[derive(Debug, Clone)]
pub struct RetrievalConfig {
    /// Maximum slices returned per query.
    pub max_results: usize,
    /// Minimum boosted similarity for inclusion.
    pub min_similarity: f64,
    /// Weight of keyword similarity relative to raw word overlap.
    pub keyword_boost: f64,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            max_results: DEFAULT_MAX_RESULTS,
            min_similarity: DEFAULT_MIN_SIMILARITY,
            keyword_boost: DEFAULT_KEYWORD_BOOST,
        }
    }
}

/// Top-level configuration for a vault instance. Constructed in code by the
/// embedding runtime; no file loading or CLI parsing happens here.
#[derive(Debug, Clone)]
pub struct VaultConfig {
    pub encryption: EncryptionConfig,
    pub storage: StorageConfig,
    /// Version stamped on new records and the vault file metadata.
    pub schema_version: String,
    /// Lifetime of read-through cache entries.
    pub cache_ttl: Duration,
    pub retrieval: RetrievalConfig,
}

impl Default for VaultConfig {
    fn default() -> Self {
        Self {
            encryption: EncryptionConfig::default(),
            storage: StorageConfig::default(),
            schema_version: SCHEMA_VERSION.into(),
            cache_ttl: Duration::from_secs(CACHE_TTL_SECS),
            retrieval: RetrievalConfig::default(),
        }
    }
}

impl VaultConfig {
    /// Configuration rooted at `dir`: vault file, key file, and index
    /// directory all live under it. Convenient for tests and embedding.
    pub fn rooted_at(dir: impl Into<PathBuf>) -> Self {
        let dir = dir.into();
        Self {
            encryption: EncryptionConfig {
                key_env_var: None,
                key_file: Some(dir.join("vault.key")),
            },
            storage: StorageConfig {
                vault_path: dir.join("vault.bin"),
                index_path: dir.join("index"),
            },
            ..Self::default()
        }
    }
}
