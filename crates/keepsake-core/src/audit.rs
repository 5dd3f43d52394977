//! Append-only audit trail.
//!
//! Every state-changing or privilege-relevant vault operation records an
//! [`AuditEntry`], successes and failures alike. The log is owned by the
//! vault instance and injected into the components that need it — no
//! globals, and the store never reaches back into a shared audit object.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::sync::Mutex;

use crate::error::VaultError;
use crate::types::Timestamp;

// ── AuditEntry ───────────────────────────────────────────────────────────────

/// One audit record. Never mutated after insertion.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct AuditEntry {
    pub timestamp: Timestamp,
    /// Action name, e.g. "create_or_update_persona", "get_persona_denied".
    pub action: String,
    /// The acting principal.
    pub user_id: String,
    pub persona_id: Option<String>,
    /// Record family the action touched ("persona", "communal",
    /// "memory_slice", "reasoning_chain", "system", ...).
    pub memory_type: String,
    /// Record key where one applies (communal memory id, slice id, ...).
    pub key: Option<String>,
    /// Free-form structured context.
    pub details: serde_json::Value,
    /// "success", "denied", or "error: <message>".
    pub result: String,
}

impl AuditEntry {
    pub fn new(action: &str, user_id: &str, memory_type: &str) -> Self {
        Self {
            timestamp: Utc::now(),
            action: action.into(),
            user_id: user_id.into(),
            persona_id: None,
            memory_type: memory_type.into(),
            key: None,
            details: serde_json::json!({}),
            result: "success".into(),
        }
    }

    pub fn persona(mut self, persona_id: &str) -> Self {
        self.persona_id = Some(persona_id.into());
        self
    }

    pub fn key(mut self, key: &str) -> Self {
        self.key = Some(key.into());
        self
    }

    pub fn details(mut self, details: serde_json::Value) -> Self {
        self.details = details;
        self
    }

    pub fn denied(mut self) -> Self {
        self.result = "denied".into();
        self
    }

    pub fn failed(mut self, err: &VaultError) -> Self {
        self.result = format!("error: {err}");
        self
    }
}

// ── AuditFilter ──────────────────────────────────────────────────────────────

/// Equality filter for audit export. Every populated field must match.
#[derive(Clone, Debug, Default)]
pub struct AuditFilter {
    pub action: Option<String>,
    pub user_id: Option<String>,
    pub persona_id: Option<String>,
    pub memory_type: Option<String>,
    pub key: Option<String>,
    pub result: Option<String>,
}

impl AuditFilter {
    pub fn action(action: &str) -> Self {
        Self {
            action: Some(action.into()),
            ..Self::default()
        }
    }

    fn matches(&self, entry: &AuditEntry) -> bool {
        fn ok(filter: &Option<String>, value: &str) -> bool {
            filter.as_deref().map_or(true, |f| f == value)
        }
        fn ok_opt(filter: &Option<String>, value: &Option<String>) -> bool {
            filter
                .as_deref()
                .map_or(true, |f| value.as_deref() == Some(f))
        }
        ok(&self.action, &entry.action)
            && ok(&self.user_id, &entry.user_id)
            && ok_opt(&self.persona_id, &entry.persona_id)
            && ok(&self.memory_type, &entry.memory_type)
            && ok_opt(&self.key, &entry.key)
            && ok(&self.result, &entry.result)
    }
}

// ── AuditLog ─────────────────────────────────────────────────────────────────

/// In-memory append-only sequence of audit entries with filterable export.
#[derive(Debug, Default)]
pub struct AuditLog {
    entries: Mutex<Vec<AuditEntry>>,
}

impl AuditLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&self, entry: AuditEntry) {
        self.entries
            .lock()
            .expect("audit log lock poisoned")
            .push(entry);
    }

    pub fn len(&self) -> usize {
        self.entries.lock().expect("audit log lock poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Snapshot of all entries in insertion order.
    pub fn entries(&self) -> Vec<AuditEntry> {
        self.entries
            .lock()
            .expect("audit log lock poisoned")
            .clone()
    }

    /// Export as a JSON array, in insertion order, optionally filtered by
    /// field equality.
    pub fn export_json(&self, filter: Option<&AuditFilter>) -> Result<String, VaultError> {
        let entries = self.entries();
        let selected: Vec<&AuditEntry> = match filter {
            Some(f) => entries.iter().filter(|e| f.matches(e)).collect(),
            None => entries.iter().collect(),
        };
        serde_json::to_string_pretty(&selected).map_err(|e| VaultError::Serialization(e.to_string()))
    }
}
