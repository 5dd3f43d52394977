//! Read-through TTL cache for vault records.
//!
//! Correctness-neutral: writes and deletes invalidate the affected key, so
//! a cache hit can never show a value older than the last commit observed
//! by this process. Owned by the vault instance — no module-level state.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use keepsake_core::{CommunalMemory, MemoryKind, PersonaMemory};

/// Cache key: record family, record id, and (for persona records) the owner
/// whose read populated the entry.
#[derive(Clone, PartialEq, Eq, Hash, Debug)]
pub struct CacheKey {
    pub kind: MemoryKind,
    pub id: String,
    pub owner: Option<String>,
}

impl CacheKey {
    pub fn persona(id: &str, owner: &str) -> Self {
        Self {
            kind: MemoryKind::Persona,
            id: id.into(),
            owner: Some(owner.into()),
        }
    }

    pub fn communal(id: &str) -> Self {
        Self {
            kind: MemoryKind::Communal,
            id: id.into(),
            owner: None,
        }
    }
}

#[derive(Clone, Debug)]
pub enum CachedRecord {
    Persona(PersonaMemory),
    Communal(CommunalMemory),
}

/// TTL cache with point invalidation.
#[derive(Debug)]
pub struct TtlCache {
    ttl: Duration,
    entries: Mutex<HashMap<CacheKey, (CachedRecord, Instant)>>,
}

impl TtlCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            entries: Mutex::new(HashMap::new()),
        }
    }

    pub fn get(&self, key: &CacheKey) -> Option<CachedRecord> {
        let mut entries = self.entries.lock().expect("cache lock poisoned");
        match entries.get(key) {
            Some((_, inserted)) if inserted.elapsed() >= self.ttl => {
                entries.remove(key);
                None
            }
            Some((record, _)) => Some(record.clone()),
            None => None,
        }
    }

    pub fn put(&self, key: CacheKey, record: CachedRecord) {
        self.entries
            .lock()
            .expect("cache lock poisoned")
            .insert(key, (record, Instant::now()));
    }

    pub fn invalidate(&self, key: &CacheKey) {
        self.entries
            .lock()
            .expect("cache lock poisoned")
            .remove(key);
    }

    /// Drop every entry. Used after whole-state replacement (restore).
    pub fn clear(&self) {
        self.entries.lock().expect("cache lock poisoned").clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use serde_json::json;

    fn record(id: &str) -> CachedRecord {
        CachedRecord::Persona(PersonaMemory {
            persona_id: id.into(),
            owner_id: "user-1".into(),
            payload: json!({}),
            created_at: Utc::now(),
            updated_at: Utc::now(),
            schema_version: "1.0.0".into(),
        })
    }

    #[test]
    fn hit_within_ttl_miss_after_expiry() {
        let cache = TtlCache::new(Duration::from_millis(30));
        let key = CacheKey::persona("alden", "user-1");
        cache.put(key.clone(), record("alden"));
        assert!(cache.get(&key).is_some());

        std::thread::sleep(Duration::from_millis(40));
        assert!(cache.get(&key).is_none());
    }

    #[test]
    fn invalidation_is_per_key() {
        let cache = TtlCache::new(Duration::from_secs(60));
        let a = CacheKey::persona("alden", "user-1");
        let b = CacheKey::communal("shared-notes");
        cache.put(a.clone(), record("alden"));
        cache.put(
            b.clone(),
            CachedRecord::Communal(CommunalMemory {
                memory_id: "shared-notes".into(),
                payload: json!({}),
                created_at: Utc::now(),
                updated_at: Utc::now(),
                schema_version: "1.0.0".into(),
            }),
        );

        cache.invalidate(&a);
        assert!(cache.get(&a).is_none());
        assert!(cache.get(&b).is_some());
    }
}
