//! Vault record types and the decrypted vault file structure.
//!
//! The vault file plaintext is a UTF-8 JSON document of [`VaultState`]:
//! persona records keyed by persona id, communal records keyed by memory id,
//! and a metadata block carrying the canonical checksum of everything else.
//!
//! `metadata` is `#[serde(default)]` so that files written before the
//! metadata block existed still load; the missing block is recreated and
//! stamped on the next write.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::constants::SCHEMA_VERSION;
use crate::types::Timestamp;

// ── PersonaMemory ────────────────────────────────────────────────────────────

/// A structured record exclusively owned by one principal. Only the owner
/// may read, update, or delete it.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct PersonaMemory {
    pub persona_id: String,
    pub owner_id: String,
    /// Free-form structured content; the vault does not interpret it.
    pub payload: serde_json::Value,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
    pub schema_version: String,
}

// ── CommunalMemory ───────────────────────────────────────────────────────────

/// A shared record with no per-principal ownership. Any caller may read it;
/// every write is audited with the acting principal.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct CommunalMemory {
    pub memory_id: String,
    pub payload: serde_json::Value,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
    pub schema_version: String,
}

// ── VaultMetadata ────────────────────────────────────────────────────────────

/// Vault file metadata. `checksum` is the SHA-256 of the canonical
/// serialization of the state minus this block; `None` only for files that
/// have never been written by this implementation.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct VaultMetadata {
    pub created_at: Timestamp,
    pub updated_at: Option<Timestamp>,
    pub schema_version: String,
    pub checksum: Option<String>,
}

impl Default for VaultMetadata {
    fn default() -> Self {
        Self {
            created_at: Utc::now(),
            updated_at: None,
            schema_version: SCHEMA_VERSION.into(),
            checksum: None,
        }
    }
}

// ── VaultState ───────────────────────────────────────────────────────────────

/// The decrypted contents of the vault file. `BTreeMap` keeps serialization
/// key-sorted, which the canonical checksum relies on.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct VaultState {
    pub persona: BTreeMap<String, PersonaMemory>,
    pub communal: BTreeMap<String, CommunalMemory>,
    #[serde(default)]
    pub metadata: VaultMetadata,
}

impl VaultState {
    /// Fresh empty state stamped with `schema_version`.
    pub fn new(schema_version: &str) -> Self {
        Self {
            persona: BTreeMap::new(),
            communal: BTreeMap::new(),
            metadata: VaultMetadata {
                created_at: Utc::now(),
                updated_at: None,
                schema_version: schema_version.into(),
                checksum: None,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn state_without_metadata_still_loads() {
        // A vault file from before the metadata block existed.
        let legacy = r#"{"persona": {}, "communal": {}}"#;
        let state: VaultState = serde_json::from_str(legacy).unwrap();
        assert!(state.metadata.checksum.is_none());
        assert_eq!(state.metadata.schema_version, SCHEMA_VERSION);
    }

    #[test]
    fn record_round_trips_through_json() {
        let rec = PersonaMemory {
            persona_id: "alden".into(),
            owner_id: "user-1".into(),
            payload: serde_json::json!({"traits": {"openness": 50}}),
            created_at: Utc::now(),
            updated_at: Utc::now(),
            schema_version: SCHEMA_VERSION.into(),
        };
        let text = serde_json::to_string(&rec).unwrap();
        let back: PersonaMemory = serde_json::from_str(&text).unwrap();
        assert_eq!(rec, back);
    }
}
