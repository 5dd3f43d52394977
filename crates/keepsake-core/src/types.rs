use serde::{Deserialize, Serialize};
use std::fmt;

/// UTC timestamp. Serialized as an RFC 3339 (ISO-8601) string.
pub type Timestamp = chrono::DateTime<chrono::Utc>;

// ── MemoryKind ───────────────────────────────────────────────────────────────

/// The two record families held by the vault file: persona records are
/// exclusively owned by one principal, communal records are shared.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Debug)]
#[serde(rename_all = "lowercase")]
pub enum MemoryKind {
    Persona,
    Communal,
}

impl MemoryKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            MemoryKind::Persona => "persona",
            MemoryKind::Communal => "communal",
        }
    }
}

impl fmt::Display for MemoryKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
