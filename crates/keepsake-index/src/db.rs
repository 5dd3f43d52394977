//! Persistent slice index backed by sled (pure-Rust, no C dependencies).
//!
//! Named trees:
//!   slices            — slice_id bytes          → json(MemorySlice)
//!   chains            — chain_id bytes          → bincode(ReasoningChain)
//!   slices_by_persona — persona_id ‖ 0 ‖ slice_id → [] (membership set)
//!   fts               — term ‖ 0 ‖ slice_id       → [] (posting set)
//!
//! Slice rows are JSON because their `metadata` field is free-form JSON;
//! chain rows are bincode. The fts tree indexes every qualifying content
//! token plus the extracted keywords of a slice, so a MATCH on any query
//! term is a bounded `scan_prefix`.
//!
//! This store is local-only and deliberately not covered by the vault's
//! AEAD key — it is derivative retrieval data, not the record of truth.

use std::collections::HashSet;
use std::path::Path;
use tracing::warn;

use keepsake_core::{MemorySlice, MemoryType, ReasoningChain, Timestamp, VaultError};

use crate::text::tokenize;

pub struct SliceIndex {
    _db: sled::Db,
    slices: sled::Tree,
    chains: sled::Tree,
    slices_by_persona: sled::Tree,
    fts: sled::Tree,
}

/// Key separator for composite trees. Terms are lowercase ASCII and ids are
/// hex-derived, so 0x00 never appears in either half.
const SEP: u8 = 0;

fn composite(prefix: &str, suffix: &str) -> Vec<u8> {
    let mut key = Vec::with_capacity(prefix.len() + 1 + suffix.len());
    key.extend_from_slice(prefix.as_bytes());
    key.push(SEP);
    key.extend_from_slice(suffix.as_bytes());
    key
}

fn scan_prefix_of(prefix: &str) -> Vec<u8> {
    let mut key = Vec::with_capacity(prefix.len() + 1);
    key.extend_from_slice(prefix.as_bytes());
    key.push(SEP);
    key
}

/// Suffix of a composite key after the separator.
fn composite_suffix(key: &[u8]) -> Option<String> {
    let pos = key.iter().position(|b| *b == SEP)?;
    String::from_utf8(key[pos + 1..].to_vec()).ok()
}

impl SliceIndex {
    /// Open or create the index database at `path`.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, VaultError> {
        let db = sled::open(path).map_err(|e| VaultError::Index(e.to_string()))?;
        let slices = db.open_tree("slices").map_err(|e| VaultError::Index(e.to_string()))?;
        let chains = db.open_tree("chains").map_err(|e| VaultError::Index(e.to_string()))?;
        let slices_by_persona = db
            .open_tree("slices_by_persona")
            .map_err(|e| VaultError::Index(e.to_string()))?;
        let fts = db.open_tree("fts").map_err(|e| VaultError::Index(e.to_string()))?;
        Ok(Self {
            _db: db,
            slices,
            chains,
            slices_by_persona,
            fts,
        })
    }

    // ── Slices ───────────────────────────────────────────────────────────────

    pub fn get_slice(&self, slice_id: &str) -> Result<Option<MemorySlice>, VaultError> {
        match self
            .slices
            .get(slice_id.as_bytes())
            .map_err(|e| VaultError::Index(e.to_string()))?
        {
            Some(bytes) => {
                let slice = serde_json::from_slice(&bytes)
                    .map_err(|e| VaultError::Serialization(e.to_string()))?;
                Ok(Some(slice))
            }
            None => Ok(None),
        }
    }

    /// Insert or replace a slice row, its persona membership entry, and its
    /// full-text postings. A replaced row's stale postings are removed
    /// first so the fts tree never outlives the content it indexes.
    pub fn put_slice(&self, slice: &MemorySlice) -> Result<(), VaultError> {
        if let Some(previous) = self.get_slice(&slice.slice_id)? {
            if previous.content != slice.content || previous.keywords != slice.keywords {
                self.remove_fts_postings(&previous)?;
            }
        }

        let bytes = serde_json::to_vec(slice)
            .map_err(|e| VaultError::Serialization(e.to_string()))?;
        self.slices
            .insert(slice.slice_id.as_bytes(), bytes)
            .map_err(|e| VaultError::Index(e.to_string()))?;
        self.slices_by_persona
            .insert(composite(&slice.persona_id, &slice.slice_id), b"".as_ref())
            .map_err(|e| VaultError::Index(e.to_string()))?;
        for term in fts_terms(slice) {
            self.fts
                .insert(composite(&term, &slice.slice_id), b"".as_ref())
                .map_err(|e| VaultError::Index(e.to_string()))?;
        }
        Ok(())
    }

    /// Remove a slice and everything derived from it. Missing rows are a
    /// no-op returning `false`.
    pub fn remove_slice(&self, slice_id: &str) -> Result<bool, VaultError> {
        let Some(slice) = self.get_slice(slice_id)? else {
            return Ok(false);
        };
        self.remove_fts_postings(&slice)?;
        self.slices_by_persona
            .remove(composite(&slice.persona_id, slice_id))
            .map_err(|e| VaultError::Index(e.to_string()))?;
        self.slices
            .remove(slice_id.as_bytes())
            .map_err(|e| VaultError::Index(e.to_string()))?;
        Ok(true)
    }

    /// All slices belonging to `(owner_id, persona_id)`, optionally filtered
    /// by memory type.
    pub fn slices_for(
        &self,
        persona_id: &str,
        owner_id: &str,
        memory_types: Option<&[MemoryType]>,
    ) -> Result<Vec<MemorySlice>, VaultError> {
        let mut result = Vec::new();
        for item in self.slices_by_persona.scan_prefix(scan_prefix_of(persona_id)) {
            let (key, _) = item.map_err(|e| VaultError::Index(e.to_string()))?;
            let Some(slice_id) = composite_suffix(&key) else {
                continue;
            };
            // An undecodable row must not abort the whole listing.
            let slice = match self.get_slice(&slice_id) {
                Ok(Some(slice)) => slice,
                Ok(None) => continue,
                Err(err) => {
                    warn!(slice_id = %slice_id, error = %err, "skipping unreadable slice row");
                    continue;
                }
            };
            if slice.owner_id != owner_id {
                continue;
            }
            if let Some(types) = memory_types {
                if !types.contains(&slice.memory_type) {
                    continue;
                }
            }
            result.push(slice);
        }
        Ok(result)
    }

    /// Return every slice in the index (no filter).
    pub fn iter_all_slices(&self) -> Result<Vec<MemorySlice>, VaultError> {
        let mut result = Vec::new();
        for item in self.slices.iter() {
            let (_, bytes) = item.map_err(|e| VaultError::Index(e.to_string()))?;
            let slice: MemorySlice = serde_json::from_slice(&bytes)
                .map_err(|e| VaultError::Serialization(e.to_string()))?;
            result.push(slice);
        }
        Ok(result)
    }

    /// Bump `retrieval_count` and stamp `last_accessed` for one slice.
    pub fn record_access(&self, slice_id: &str, now: Timestamp) -> Result<(), VaultError> {
        if let Some(mut slice) = self.get_slice(slice_id)? {
            slice.retrieval_count += 1;
            slice.last_accessed = now;
            let bytes = serde_json::to_vec(&slice)
                .map_err(|e| VaultError::Serialization(e.to_string()))?;
            self.slices
                .insert(slice_id.as_bytes(), bytes)
                .map_err(|e| VaultError::Index(e.to_string()))?;
        }
        Ok(())
    }

    pub fn count_slices(&self) -> u64 {
        self.slices.len() as u64
    }

    // ── Full-text match ──────────────────────────────────────────────────────

    /// Slice ids whose content or keywords contain any of `terms`, up to
    /// `limit` distinct ids.
    pub fn fts_match_any(
        &self,
        terms: &[String],
        limit: usize,
    ) -> Result<HashSet<String>, VaultError> {
        let mut ids = HashSet::new();
        'terms: for term in terms {
            for item in self.fts.scan_prefix(scan_prefix_of(term)) {
                let (key, _) = item.map_err(|e| VaultError::Index(e.to_string()))?;
                if let Some(slice_id) = composite_suffix(&key) {
                    ids.insert(slice_id);
                    if ids.len() >= limit {
                        break 'terms;
                    }
                }
            }
        }
        Ok(ids)
    }

    /// Drop postings that refer to slices no longer present. Returns the
    /// number of postings removed.
    pub fn remove_fts_orphans(&self) -> Result<usize, VaultError> {
        let mut stale = Vec::new();
        for item in self.fts.iter() {
            let (key, _) = item.map_err(|e| VaultError::Index(e.to_string()))?;
            let Some(slice_id) = composite_suffix(&key) else {
                stale.push(key.to_vec());
                continue;
            };
            let present = self
                .slices
                .contains_key(slice_id.as_bytes())
                .map_err(|e| VaultError::Index(e.to_string()))?;
            if !present {
                stale.push(key.to_vec());
            }
        }
        let removed = stale.len();
        for key in stale {
            self.fts
                .remove(key)
                .map_err(|e| VaultError::Index(e.to_string()))?;
        }
        Ok(removed)
    }

    fn remove_fts_postings(&self, slice: &MemorySlice) -> Result<(), VaultError> {
        for term in fts_terms(slice) {
            self.fts
                .remove(composite(&term, &slice.slice_id))
                .map_err(|e| VaultError::Index(e.to_string()))?;
        }
        Ok(())
    }

    // ── Reasoning chains ─────────────────────────────────────────────────────

    pub fn put_chain(&self, chain: &ReasoningChain) -> Result<(), VaultError> {
        let bytes = bincode::serialize(chain)
            .map_err(|e| VaultError::Serialization(e.to_string()))?;
        self.chains
            .insert(chain.chain_id.as_bytes(), bytes)
            .map_err(|e| VaultError::Index(e.to_string()))?;
        Ok(())
    }

    pub fn get_chain(&self, chain_id: &str) -> Result<Option<ReasoningChain>, VaultError> {
        match self
            .chains
            .get(chain_id.as_bytes())
            .map_err(|e| VaultError::Index(e.to_string()))?
        {
            Some(bytes) => {
                let chain = bincode::deserialize(&bytes)
                    .map_err(|e| VaultError::Serialization(e.to_string()))?;
                Ok(Some(chain))
            }
            None => Ok(None),
        }
    }

    pub fn remove_chain(&self, chain_id: &str) -> Result<bool, VaultError> {
        let removed = self
            .chains
            .remove(chain_id.as_bytes())
            .map_err(|e| VaultError::Index(e.to_string()))?;
        Ok(removed.is_some())
    }

    /// Return every chain in the index (no filter).
    pub fn iter_all_chains(&self) -> Result<Vec<ReasoningChain>, VaultError> {
        let mut result = Vec::new();
        for item in self.chains.iter() {
            let (_, bytes) = item.map_err(|e| VaultError::Index(e.to_string()))?;
            let chain: ReasoningChain = bincode::deserialize(&bytes)
                .map_err(|e| VaultError::Serialization(e.to_string()))?;
            result.push(chain);
        }
        Ok(result)
    }

    /// All chains belonging to `(owner_id, persona_id)`.
    pub fn chains_for(
        &self,
        persona_id: &str,
        owner_id: &str,
    ) -> Result<Vec<ReasoningChain>, VaultError> {
        Ok(self
            .iter_all_chains()?
            .into_iter()
            .filter(|c| c.persona_id == persona_id && c.owner_id == owner_id)
            .collect())
    }

    pub fn count_chains(&self) -> u64 {
        self.chains.len() as u64
    }

    /// Flush all pending writes to disk.
    pub fn flush(&self) -> Result<(), VaultError> {
        self._db.flush().map_err(|e| VaultError::Index(e.to_string()))?;
        Ok(())
    }
}

impl std::fmt::Debug for SliceIndex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "SliceIndex {{ slices: {}, chains: {} }}",
            self.count_slices(),
            self.count_chains()
        )
    }
}

/// The terms a slice contributes to the full-text tree: every qualifying
/// token of its content plus its extracted keywords.
fn fts_terms(slice: &MemorySlice) -> HashSet<String> {
    let mut terms: HashSet<String> = tokenize(&slice.content).into_iter().collect();
    terms.extend(slice.keywords.iter().cloned());
    terms
}
