//! Canonical checksum over vault state.
//!
//! The digest is SHA-256 over the UTF-8 bytes of a canonical JSON
//! serialization: object keys sorted lexicographically at every nesting
//! level, compact separators. serde_json's `Map` is BTreeMap-backed (the
//! `preserve_order` feature is not enabled anywhere in this workspace), so
//! routing a value through `serde_json::Value` yields the sorted form.

use sha2::{Digest, Sha256};

use keepsake_core::{VaultError, VaultState};

/// Canonical (key-sorted, compact) JSON text for `value`.
pub fn canonical_json(value: &serde_json::Value) -> String {
    value.to_string()
}

/// Lowercase hex SHA-256 of the canonical serialization of `value`.
pub fn checksum_hex(value: &serde_json::Value) -> String {
    let mut hasher = Sha256::new();
    hasher.update(canonical_json(value).as_bytes());
    hex::encode(hasher.finalize())
}

/// Checksum of a vault state minus its metadata block. This is the value
/// stored in `metadata.checksum` and re-verified on every load.
pub fn state_checksum(state: &VaultState) -> Result<String, VaultError> {
    let persona = serde_json::to_value(&state.persona)
        .map_err(|e| VaultError::Serialization(e.to_string()))?;
    let communal = serde_json::to_value(&state.communal)
        .map_err(|e| VaultError::Serialization(e.to_string()))?;
    let body = serde_json::json!({
        "communal": communal,
        "persona": persona,
    });
    Ok(checksum_hex(&body))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn key_order_does_not_change_the_digest() {
        let a: serde_json::Value =
            serde_json::from_str(r#"{"b": 1, "a": {"z": true, "y": false}}"#).unwrap();
        let b: serde_json::Value =
            serde_json::from_str(r#"{"a": {"y": false, "z": true}, "b": 1}"#).unwrap();
        assert_eq!(checksum_hex(&a), checksum_hex(&b));
    }

    #[test]
    fn different_values_yield_different_digests() {
        assert_ne!(
            checksum_hex(&json!({"n": 1})),
            checksum_hex(&json!({"n": 2}))
        );
    }

    #[test]
    fn state_checksum_ignores_metadata() {
        let mut state = VaultState::new("1.0.0");
        let before = state_checksum(&state).unwrap();
        state.metadata.checksum = Some("deadbeef".into());
        state.metadata.updated_at = Some(chrono::Utc::now());
        assert_eq!(state_checksum(&state).unwrap(), before);
    }

    #[test]
    fn state_checksum_tracks_record_changes() {
        let mut state = VaultState::new("1.0.0");
        let empty = state_checksum(&state).unwrap();
        state.persona.insert(
            "alden".into(),
            keepsake_core::PersonaMemory {
                persona_id: "alden".into(),
                owner_id: "user-1".into(),
                payload: json!({"traits": {"openness": 50}}),
                created_at: chrono::Utc::now(),
                updated_at: chrono::Utc::now(),
                schema_version: "1.0.0".into(),
            },
        );
        assert_ne!(state_checksum(&state).unwrap(), empty);
    }
}
