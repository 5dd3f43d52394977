use thiserror::Error;

#[derive(Debug, Error)]
pub enum VaultError {
    // ── Integrity ────────────────────────────────────────────────────────────
    #[error("ciphertext authentication failed")]
    DecryptionFailed,

    #[error("ciphertext too short: {0} bytes")]
    TruncatedCiphertext(usize),

    #[error("checksum mismatch: stored {stored}, computed {computed}")]
    ChecksumMismatch { stored: String, computed: String },

    // ── Validation ───────────────────────────────────────────────────────────
    #[error("missing required field `{field}` in {kind} record")]
    MissingField {
        kind: &'static str,
        field: &'static str,
    },

    #[error("persona {0} is owned by another principal")]
    OwnershipMismatch(String),

    #[error("malformed import payload: {0}")]
    MalformedImport(String),

    // ── Key material ─────────────────────────────────────────────────────────
    #[error("key material error: {0}")]
    KeyMaterial(String),

    // ── Serialization / storage / index ──────────────────────────────────────
    #[error("serialization error: {0}")]
    Serialization(String),

    #[error("storage error: {0}")]
    Storage(String),

    #[error("index error: {0}")]
    Index(String),
}

impl VaultError {
    /// True for failures that indicate the vault file itself is damaged or
    /// was produced under a different key; callers should attempt backup
    /// recovery before surfacing these.
    pub fn is_integrity(&self) -> bool {
        matches!(
            self,
            VaultError::DecryptionFailed
                | VaultError::TruncatedCiphertext(_)
                | VaultError::ChecksumMismatch { .. }
        )
    }

    /// True for failures that reject an operation without touching state.
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            VaultError::MissingField { .. }
                | VaultError::OwnershipMismatch(_)
                | VaultError::MalformedImport(_)
        )
    }
}
