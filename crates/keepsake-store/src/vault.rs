//! The record-store façade.
//!
//! Composes the layered behavior — checksum, atomic I/O, schema validation,
//! cache — out of the components in this crate rather than stacking store
//! subclasses. Every operation returns only after a durable commit and
//! records an audit entry, on failure paths included. The audit log is an
//! injected dependency; the store never reaches into a global.

use chrono::Utc;
use serde_json::json;
use std::path::Path;
use std::sync::Arc;
use tracing::info;

use keepsake_core::{
    AuditEntry, AuditLog, CommunalMemory, PersonaMemory, VaultConfig, VaultError,
};
use keepsake_crypto::{load_or_generate_key, VaultCipher};

use crate::cache::{CacheKey, CachedRecord, TtlCache};
use crate::file::StorageEngine;
use crate::schema::{validate_communal, validate_persona};

pub struct Vault {
    engine: StorageEngine,
    cache: TtlCache,
    audit: Arc<AuditLog>,
    schema_version: String,
}

impl Vault {
    /// Resolve the key, open (or create) the vault file, and wire up the
    /// cache. The audit sink is supplied by the caller and shared with the
    /// other subsystems of the instance.
    pub fn open(config: &VaultConfig, audit: Arc<AuditLog>) -> Result<Self, VaultError> {
        let key = load_or_generate_key(&config.encryption)?;
        let engine = StorageEngine::new(config.storage.vault_path.clone(), VaultCipher::new(key));
        engine.initialize(&config.schema_version)?;
        info!(path = %config.storage.vault_path.display(), "vault opened");
        Ok(Self {
            engine,
            cache: TtlCache::new(config.cache_ttl),
            audit,
            schema_version: config.schema_version.clone(),
        })
    }

    pub fn audit(&self) -> &AuditLog {
        &self.audit
    }

    // ── Persona records ──────────────────────────────────────────────────────

    /// Create the persona record, or rewrite its payload if the caller owns
    /// it. Ownership never transfers: an upsert against a persona held by a
    /// different principal fails validation.
    pub fn upsert_persona(
        &self,
        persona_id: &str,
        owner_id: &str,
        payload: serde_json::Value,
    ) -> Result<(), VaultError> {
        let result = self.upsert_persona_inner(persona_id, owner_id, payload.clone());
        let entry = AuditEntry::new("create_or_update_persona", owner_id, "persona")
            .persona(persona_id)
            .details(json!({ "payload": payload }));
        self.audit.record(match &result {
            Ok(()) => entry,
            Err(err) => entry.failed(err),
        });
        result
    }

    fn upsert_persona_inner(
        &self,
        persona_id: &str,
        owner_id: &str,
        payload: serde_json::Value,
    ) -> Result<(), VaultError> {
        let mut state = self.engine.load()?;
        let now = Utc::now();
        match state.persona.get_mut(persona_id) {
            Some(existing) => {
                if existing.owner_id != owner_id {
                    return Err(VaultError::OwnershipMismatch(persona_id.into()));
                }
                existing.payload = payload;
                existing.updated_at = now;
            }
            None => {
                state.persona.insert(
                    persona_id.into(),
                    PersonaMemory {
                        persona_id: persona_id.into(),
                        owner_id: owner_id.into(),
                        payload,
                        created_at: now,
                        updated_at: now,
                        schema_version: self.schema_version.clone(),
                    },
                );
            }
        }
        self.engine.store(&mut state)?;
        self.cache
            .invalidate(&CacheKey::persona(persona_id, owner_id));
        Ok(())
    }

    /// Return the record only when the caller is its owner; absence and
    /// foreign ownership are both just `None` (audited as denied).
    pub fn get_persona(
        &self,
        persona_id: &str,
        owner_id: &str,
    ) -> Result<Option<PersonaMemory>, VaultError> {
        let key = CacheKey::persona(persona_id, owner_id);
        if let Some(CachedRecord::Persona(record)) = self.cache.get(&key) {
            self.audit
                .record(AuditEntry::new("get_persona", owner_id, "persona").persona(persona_id));
            return Ok(Some(record));
        }

        let state = match self.engine.load() {
            Ok(state) => state,
            Err(err) => {
                self.audit.record(
                    AuditEntry::new("get_persona", owner_id, "persona")
                        .persona(persona_id)
                        .failed(&err),
                );
                return Err(err);
            }
        };

        match state.persona.get(persona_id) {
            Some(record) if record.owner_id == owner_id => {
                self.cache.put(key, CachedRecord::Persona(record.clone()));
                self.audit.record(
                    AuditEntry::new("get_persona", owner_id, "persona").persona(persona_id),
                );
                Ok(Some(record.clone()))
            }
            _ => {
                self.audit.record(
                    AuditEntry::new("get_persona_denied", owner_id, "persona")
                        .persona(persona_id)
                        .denied(),
                );
                Ok(None)
            }
        }
    }

    /// Remove the record if the caller owns it. Missing or foreign records
    /// are a no-op returning `false`.
    pub fn delete_persona(&self, persona_id: &str, owner_id: &str) -> Result<bool, VaultError> {
        let result = self.delete_persona_inner(persona_id, owner_id);
        match &result {
            Ok(true) => self.audit.record(
                AuditEntry::new("delete_persona", owner_id, "persona").persona(persona_id),
            ),
            Ok(false) => self.audit.record(
                AuditEntry::new("delete_persona_denied", owner_id, "persona")
                    .persona(persona_id)
                    .denied(),
            ),
            Err(err) => self.audit.record(
                AuditEntry::new("delete_persona", owner_id, "persona")
                    .persona(persona_id)
                    .failed(err),
            ),
        }
        result
    }

    fn delete_persona_inner(&self, persona_id: &str, owner_id: &str) -> Result<bool, VaultError> {
        let mut state = self.engine.load()?;
        match state.persona.get(persona_id) {
            Some(record) if record.owner_id == owner_id => {
                state.persona.remove(persona_id);
                self.engine.store(&mut state)?;
                self.cache
                    .invalidate(&CacheKey::persona(persona_id, owner_id));
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    /// Serialize the whole record (not just the payload) as JSON text.
    pub fn export_persona(
        &self,
        persona_id: &str,
        owner_id: &str,
    ) -> Result<Option<String>, VaultError> {
        match self.get_persona(persona_id, owner_id)? {
            Some(record) => {
                let text = serde_json::to_string_pretty(&record)
                    .map_err(|e| VaultError::Serialization(e.to_string()))?;
                self.audit.record(
                    AuditEntry::new("export_persona", owner_id, "persona").persona(persona_id),
                );
                Ok(Some(text))
            }
            None => Ok(None),
        }
    }

    /// Parse a serialized record, validate its schema, and upsert its
    /// payload under the given owner. A schema-version difference is
    /// audited but does not reject the import.
    pub fn import_persona(
        &self,
        persona_id: &str,
        owner_id: &str,
        serialized: &str,
    ) -> Result<(), VaultError> {
        let result = self.import_persona_inner(persona_id, owner_id, serialized);
        let entry =
            AuditEntry::new("import_persona", owner_id, "persona").persona(persona_id);
        self.audit.record(match &result {
            Ok(()) => entry,
            Err(err) => entry.failed(err),
        });
        result
    }

    fn import_persona_inner(
        &self,
        persona_id: &str,
        owner_id: &str,
        serialized: &str,
    ) -> Result<(), VaultError> {
        let value: serde_json::Value = serde_json::from_str(serialized)
            .map_err(|e| VaultError::MalformedImport(e.to_string()))?;
        validate_persona(&value)?;
        self.check_schema_version(&value, "import_persona_schema_mismatch", owner_id, persona_id);
        let payload = value
            .get("payload")
            .cloned()
            .unwrap_or_else(|| json!({}));
        self.upsert_persona(persona_id, owner_id, payload)
    }

    /// Delete with an additional audit tag; used for operator-driven
    /// destruction of a persona's data.
    pub fn purge_persona(&self, persona_id: &str, owner_id: &str) -> Result<bool, VaultError> {
        let result = self.delete_persona(persona_id, owner_id);
        let entry = AuditEntry::new("purge_persona", owner_id, "persona").persona(persona_id);
        self.audit.record(match &result {
            Ok(_) => entry,
            Err(err) => entry.failed(err),
        });
        result
    }

    /// Ids of every persona record owned by `owner_id`, in key order.
    pub fn list_personas(&self, owner_id: &str) -> Result<Vec<String>, VaultError> {
        let state = self.engine.load()?;
        let ids: Vec<String> = state
            .persona
            .values()
            .filter(|r| r.owner_id == owner_id)
            .map(|r| r.persona_id.clone())
            .collect();
        self.audit.record(
            AuditEntry::new("list_personas", owner_id, "persona")
                .details(json!({ "count": ids.len() })),
        );
        Ok(ids)
    }

    // ── Communal records ─────────────────────────────────────────────────────

    /// Create or rewrite a shared record. No ownership restriction; the
    /// acting principal is recorded for audit.
    pub fn upsert_communal(
        &self,
        memory_id: &str,
        user_id: &str,
        payload: serde_json::Value,
    ) -> Result<(), VaultError> {
        let result = self.upsert_communal_inner(memory_id, payload.clone());
        let entry = AuditEntry::new("create_or_update_communal", user_id, "communal")
            .key(memory_id)
            .details(json!({ "payload": payload }));
        self.audit.record(match &result {
            Ok(()) => entry,
            Err(err) => entry.failed(err),
        });
        result
    }

    fn upsert_communal_inner(
        &self,
        memory_id: &str,
        payload: serde_json::Value,
    ) -> Result<(), VaultError> {
        let mut state = self.engine.load()?;
        let now = Utc::now();
        match state.communal.get_mut(memory_id) {
            Some(existing) => {
                existing.payload = payload;
                existing.updated_at = now;
            }
            None => {
                state.communal.insert(
                    memory_id.into(),
                    CommunalMemory {
                        memory_id: memory_id.into(),
                        payload,
                        created_at: now,
                        updated_at: now,
                        schema_version: self.schema_version.clone(),
                    },
                );
            }
        }
        self.engine.store(&mut state)?;
        self.cache.invalidate(&CacheKey::communal(memory_id));
        Ok(())
    }

    /// Reads are never denied; absence is `None`.
    pub fn get_communal(
        &self,
        memory_id: &str,
        user_id: &str,
    ) -> Result<Option<CommunalMemory>, VaultError> {
        let key = CacheKey::communal(memory_id);
        if let Some(CachedRecord::Communal(record)) = self.cache.get(&key) {
            self.audit
                .record(AuditEntry::new("get_communal", user_id, "communal").key(memory_id));
            return Ok(Some(record));
        }

        let state = match self.engine.load() {
            Ok(state) => state,
            Err(err) => {
                self.audit.record(
                    AuditEntry::new("get_communal", user_id, "communal")
                        .key(memory_id)
                        .failed(&err),
                );
                return Err(err);
            }
        };

        let record = state.communal.get(memory_id).cloned();
        if let Some(record) = &record {
            self.cache.put(key, CachedRecord::Communal(record.clone()));
        }
        self.audit
            .record(AuditEntry::new("get_communal", user_id, "communal").key(memory_id));
        Ok(record)
    }

    pub fn delete_communal(&self, memory_id: &str, user_id: &str) -> Result<bool, VaultError> {
        let result = self.delete_communal_inner(memory_id);
        match &result {
            Ok(true) => self
                .audit
                .record(AuditEntry::new("delete_communal", user_id, "communal").key(memory_id)),
            Ok(false) => self.audit.record(
                AuditEntry::new("delete_communal_denied", user_id, "communal")
                    .key(memory_id)
                    .denied(),
            ),
            Err(err) => self.audit.record(
                AuditEntry::new("delete_communal", user_id, "communal")
                    .key(memory_id)
                    .failed(err),
            ),
        }
        result
    }

    fn delete_communal_inner(&self, memory_id: &str) -> Result<bool, VaultError> {
        let mut state = self.engine.load()?;
        if state.communal.remove(memory_id).is_none() {
            return Ok(false);
        }
        self.engine.store(&mut state)?;
        self.cache.invalidate(&CacheKey::communal(memory_id));
        Ok(true)
    }

    pub fn export_communal(
        &self,
        memory_id: &str,
        user_id: &str,
    ) -> Result<Option<String>, VaultError> {
        match self.get_communal(memory_id, user_id)? {
            Some(record) => {
                let text = serde_json::to_string_pretty(&record)
                    .map_err(|e| VaultError::Serialization(e.to_string()))?;
                self.audit.record(
                    AuditEntry::new("export_communal", user_id, "communal").key(memory_id),
                );
                Ok(Some(text))
            }
            None => Ok(None),
        }
    }

    pub fn import_communal(
        &self,
        memory_id: &str,
        user_id: &str,
        serialized: &str,
    ) -> Result<(), VaultError> {
        let result = self.import_communal_inner(memory_id, user_id, serialized);
        let entry = AuditEntry::new("import_communal", user_id, "communal").key(memory_id);
        self.audit.record(match &result {
            Ok(()) => entry,
            Err(err) => entry.failed(err),
        });
        result
    }

    fn import_communal_inner(
        &self,
        memory_id: &str,
        user_id: &str,
        serialized: &str,
    ) -> Result<(), VaultError> {
        let value: serde_json::Value = serde_json::from_str(serialized)
            .map_err(|e| VaultError::MalformedImport(e.to_string()))?;
        validate_communal(&value)?;
        self.check_schema_version(&value, "import_communal_schema_mismatch", user_id, memory_id);
        let payload = value
            .get("payload")
            .cloned()
            .unwrap_or_else(|| json!({}));
        self.upsert_communal(memory_id, user_id, payload)
    }

    pub fn purge_communal(&self, memory_id: &str, user_id: &str) -> Result<bool, VaultError> {
        let result = self.delete_communal(memory_id, user_id);
        let entry = AuditEntry::new("purge_communal", user_id, "communal").key(memory_id);
        self.audit.record(match &result {
            Ok(_) => entry,
            Err(err) => entry.failed(err),
        });
        result
    }

    /// Ids of communal records whose key starts with `prefix` (empty prefix
    /// lists everything), in key order.
    pub fn list_communal(&self, prefix: &str, user_id: &str) -> Result<Vec<String>, VaultError> {
        let state = self.engine.load()?;
        let ids: Vec<String> = state
            .communal
            .keys()
            .filter(|k| k.starts_with(prefix))
            .cloned()
            .collect();
        self.audit.record(
            AuditEntry::new("list_communal", user_id, "communal")
                .details(json!({ "prefix": prefix, "count": ids.len() })),
        );
        Ok(ids)
    }

    // ── Integrity & snapshots ────────────────────────────────────────────────

    /// Run every stored record through the schema guard. The load itself
    /// already verified the file checksum.
    pub fn verify_integrity(&self) -> Result<(bool, Vec<String>), VaultError> {
        let state = self.engine.load()?;
        let mut issues = Vec::new();
        for (id, record) in &state.persona {
            let value = serde_json::to_value(record)
                .map_err(|e| VaultError::Serialization(e.to_string()))?;
            if validate_persona(&value).is_err() {
                issues.push(format!("invalid persona schema: {id}"));
            }
        }
        for (id, record) in &state.communal {
            let value = serde_json::to_value(record)
                .map_err(|e| VaultError::Serialization(e.to_string()))?;
            if validate_communal(&value).is_err() {
                issues.push(format!("invalid communal schema: {id}"));
            }
        }
        self.audit.record(
            AuditEntry::new("verify_integrity", "system", "system")
                .details(json!({ "issues": issues.len() })),
        );
        Ok((issues.is_empty(), issues))
    }

    /// Write an encrypted snapshot of the current committed state to `path`.
    pub fn snapshot_to(&self, path: &Path) -> Result<(), VaultError> {
        let result = self
            .engine
            .load()
            .and_then(|state| self.engine.write_snapshot(path, &state));
        let entry = AuditEntry::new("create_snapshot", "system", "system")
            .details(json!({ "path": path.display().to_string() }));
        self.audit.record(match &result {
            Ok(()) => entry,
            Err(err) => entry.failed(err),
        });
        result
    }

    /// Replace the committed state with a snapshot previously written by
    /// [`snapshot_to`]. Affects persona/communal records only; the slice
    /// index is independent data and is not touched.
    pub fn restore_from(&self, path: &Path) -> Result<(), VaultError> {
        let result = self.engine.read_snapshot(path).and_then(|mut state| {
            self.engine.store(&mut state)?;
            self.cache.clear();
            Ok(())
        });
        let entry = AuditEntry::new("restore_snapshot", "system", "system")
            .details(json!({ "path": path.display().to_string() }));
        self.audit.record(match &result {
            Ok(()) => entry,
            Err(err) => entry.failed(err),
        });
        result
    }

    // ── Internals ────────────────────────────────────────────────────────────

    fn check_schema_version(
        &self,
        value: &serde_json::Value,
        action: &str,
        user_id: &str,
        record_key: &str,
    ) {
        let imported = value
            .get("schema_version")
            .and_then(|v| v.as_str())
            .unwrap_or("");
        if imported != self.schema_version {
            self.audit.record(
                AuditEntry::new(action, user_id, "system")
                    .key(record_key)
                    .details(json!({
                        "imported_version": imported,
                        "current_version": self.schema_version,
                    })),
            );
        }
    }
}
