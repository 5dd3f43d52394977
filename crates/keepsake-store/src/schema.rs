//! Structural validation of record JSON.
//!
//! Import paths accept serialized records from outside the process, so the
//! required field names are checked before anything touches the store.
//! A schema-version mismatch is not a rejection — it is audited as a
//! `schema_mismatch` event by the caller and the import proceeds.

use keepsake_core::VaultError;

/// Fields every persona record must carry.
pub const PERSONA_REQUIRED: [&str; 6] = [
    "persona_id",
    "owner_id",
    "payload",
    "created_at",
    "updated_at",
    "schema_version",
];

/// Fields every communal record must carry.
pub const COMMUNAL_REQUIRED: [&str; 5] = [
    "memory_id",
    "payload",
    "created_at",
    "updated_at",
    "schema_version",
];

pub fn validate_persona(value: &serde_json::Value) -> Result<(), VaultError> {
    validate(value, "persona", &PERSONA_REQUIRED)
}

pub fn validate_communal(value: &serde_json::Value) -> Result<(), VaultError> {
    validate(value, "communal", &COMMUNAL_REQUIRED)
}

fn validate(
    value: &serde_json::Value,
    kind: &'static str,
    required: &[&'static str],
) -> Result<(), VaultError> {
    let object = value.as_object().ok_or(VaultError::MissingField {
        kind,
        field: required[0],
    })?;
    for field in required {
        if !object.contains_key(*field) {
            return Err(VaultError::MissingField { kind, field });
        }
    }
    Ok(())
}
