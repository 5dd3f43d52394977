//! Atomic encrypted file I/O for the vault.
//!
//! A single binary file holds the whole vault state: bytes 0..12 are the
//! AEAD nonce, the rest is ciphertext. `store` is crash-safe: the previous
//! committed file is renamed to a `.backup` sibling before the new content
//! is written and fsynced, and restored if anything fails in between.
//! `load` verifies the stored checksum and falls back to a verified backup
//! when the target is missing or damaged.
//!
//! Concurrency: a process-level mutex serializes in-process access, then an
//! OS advisory lock (exclusive) is taken on the open descriptor for the
//! whole read or write. Lock order is always mutex → OS lock.

use chrono::Utc;
use fs2::FileExt;
use std::fs::{self, File, OpenOptions};
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing::{info, warn};

use keepsake_core::{VaultError, VaultState};
use keepsake_crypto::{state_checksum, VaultCipher};

/// Storage engine for one vault file path.
pub struct StorageEngine {
    path: PathBuf,
    cipher: VaultCipher,
    guard: Mutex<()>,
}

impl StorageEngine {
    pub fn new(path: PathBuf, cipher: VaultCipher) -> Self {
        Self {
            path,
            cipher,
            guard: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Sibling path used as the rollback anchor during writes. Its presence
    /// on startup indicates an interrupted write.
    pub fn backup_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_default();
        name.push(".backup");
        self.path.with_file_name(name)
    }

    /// Create the initial empty vault file unless a committed state (or an
    /// interrupted-write backup to recover from) already exists.
    pub fn initialize(&self, schema_version: &str) -> Result<(), VaultError> {
        if self.path.exists() || self.backup_path().exists() {
            return Ok(());
        }
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)
                .map_err(|e| VaultError::Storage(format!("creating vault directory: {e}")))?;
        }
        let mut state = VaultState::new(schema_version);
        self.store(&mut state)?;
        info!(path = %self.path.display(), "initialized new vault storage");
        Ok(())
    }

    // ── Load ─────────────────────────────────────────────────────────────────

    /// Load and verify the committed state. If the target is missing or
    /// fails decryption/checksum and a backup exists, the backup is
    /// decrypted and verified first, then promoted over the target. The
    /// backup is never overwritten before a successful load.
    pub fn load(&self) -> Result<VaultState, VaultError> {
        let _guard = self.guard.lock().map_err(|_| lock_poisoned())?;
        match self.read_and_verify(&self.path) {
            Ok(state) => Ok(state),
            Err(err) => {
                let backup = self.backup_path();
                if !backup.exists() {
                    return Err(err);
                }
                warn!(
                    path = %self.path.display(),
                    error = %err,
                    "vault file unreadable, attempting backup recovery"
                );
                let state = self.read_and_verify(&backup)?;
                fs::rename(&backup, &self.path)
                    .map_err(|e| VaultError::Storage(format!("promoting backup: {e}")))?;
                info!(path = %self.path.display(), "recovered vault state from backup");
                Ok(state)
            }
        }
    }

    // ── Store ────────────────────────────────────────────────────────────────

    /// Durably commit `state`. After return the file on disk contains either
    /// the new state or, if any step failed, the prior committed state.
    /// Stamps `metadata.checksum` and `metadata.updated_at`.
    pub fn store(&self, state: &mut VaultState) -> Result<(), VaultError> {
        let _guard = self.guard.lock().map_err(|_| lock_poisoned())?;

        state.metadata.checksum = Some(state_checksum(state)?);
        state.metadata.updated_at = Some(Utc::now());

        let plaintext =
            serde_json::to_vec(state).map_err(|e| VaultError::Serialization(e.to_string()))?;
        let sealed = self.cipher.encrypt(&plaintext)?;

        let backup = self.backup_path();
        let had_backup = self.path.exists();
        if had_backup {
            fs::rename(&self.path, &backup)
                .map_err(|e| VaultError::Storage(format!("creating backup: {e}")))?;
        }

        match write_durable(&self.path, &sealed) {
            Ok(()) => {
                if had_backup {
                    // Best effort: a stale backup is harmless, load ignores
                    // it once the target verifies.
                    let _ = fs::remove_file(&backup);
                }
                Ok(())
            }
            Err(err) => {
                if had_backup {
                    let _ = fs::rename(&backup, &self.path);
                }
                Err(err)
            }
        }
    }

    // ── Snapshots ────────────────────────────────────────────────────────────

    /// Write an encrypted copy of `state` to an arbitrary path, without the
    /// backup/rollback dance. Used for operator-driven snapshots.
    pub fn write_snapshot(&self, path: &Path, state: &VaultState) -> Result<(), VaultError> {
        let plaintext =
            serde_json::to_vec(state).map_err(|e| VaultError::Serialization(e.to_string()))?;
        let sealed = self.cipher.encrypt(&plaintext)?;
        write_durable(path, &sealed)
    }

    /// Read and verify an encrypted snapshot written by [`write_snapshot`].
    pub fn read_snapshot(&self, path: &Path) -> Result<VaultState, VaultError> {
        let _guard = self.guard.lock().map_err(|_| lock_poisoned())?;
        self.read_and_verify(path)
    }

    // ── Internals ────────────────────────────────────────────────────────────

    fn read_and_verify(&self, path: &Path) -> Result<VaultState, VaultError> {
        let mut file =
            File::open(path).map_err(|e| VaultError::Storage(format!("opening vault file: {e}")))?;
        file.lock_exclusive()
            .map_err(|e| VaultError::Storage(format!("locking vault file: {e}")))?;
        let mut sealed = Vec::new();
        let read = file
            .read_to_end(&mut sealed)
            .map_err(|e| VaultError::Storage(format!("reading vault file: {e}")));
        let _ = file.unlock();
        read?;

        let plaintext = self.cipher.decrypt(&sealed)?;
        let state: VaultState = serde_json::from_slice(&plaintext)
            .map_err(|e| VaultError::Serialization(e.to_string()))?;

        if let Some(stored) = &state.metadata.checksum {
            let computed = state_checksum(&state)?;
            if *stored != computed {
                return Err(VaultError::ChecksumMismatch {
                    stored: stored.clone(),
                    computed,
                });
            }
        }
        Ok(state)
    }
}

impl std::fmt::Debug for StorageEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "StorageEngine {{ path: {} }}", self.path.display())
    }
}

/// Write `data` under an exclusive OS lock, then flush and fsync so the
/// bytes are on durable storage before return.
fn write_durable(path: &Path, data: &[u8]) -> Result<(), VaultError> {
    let mut file = OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(true)
        .open(path)
        .map_err(|e| VaultError::Storage(format!("opening vault file for write: {e}")))?;
    file.lock_exclusive()
        .map_err(|e| VaultError::Storage(format!("locking vault file: {e}")))?;
    let result = file
        .write_all(data)
        .and_then(|_| file.flush())
        .and_then(|_| file.sync_all())
        .map_err(|e| VaultError::Storage(format!("writing vault file: {e}")));
    let _ = file.unlock();
    result
}

fn lock_poisoned() -> VaultError {
    VaultError::Storage("vault mutex poisoned".into())
}
