//! keepsake — a per-user encrypted memory vault with retrieval-augmented
//! reasoning.
//!
//! [`MemoryVault`] is the composition root: an encrypted record store
//! (persona and communal memories with ownership enforcement, atomic
//! durable writes, and a complete audit trail), a persistent slice index
//! with full-text lookup, a lexical retrieval engine, and a deterministic
//! reasoning chain generator — all sharing one audit log.
//!
//! ```no_run
//! use keepsake::{MemoryVault, MemoryType, VaultConfig};
//!
//! let vault = MemoryVault::open(VaultConfig::rooted_at("keepsake_data")).unwrap();
//! vault
//!     .upsert_persona("alden", "user-1", serde_json::json!({"traits": {"openness": 50}}))
//!     .unwrap();
//! vault
//!     .store_memory(
//!         "alden",
//!         "user-1",
//!         "walked in the park and it rained",
//!         MemoryType::Episodic,
//!         serde_json::json!({}),
//!     )
//!     .unwrap();
//! let chain = vault.reason("what happened outdoors", "user-1", "alden").unwrap();
//! println!("{}", chain.final_conclusion);
//! ```

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;

pub use keepsake_core::{
    AuditEntry, AuditFilter, AuditLog, CommunalMemory, MemorySlice, MemoryType, Pattern,
    PatternData, PersonaMemory, ReasoningChain, ReasoningStep, RetrievalResult, StepKind,
    Timestamp, VaultConfig, VaultError,
};
pub use keepsake_index::SliceIndex;
pub use keepsake_reason::{OptimizeReport, Reasoner};
pub use keepsake_retrieval::{RetrievalEngine, RetrievalOptions};
pub use keepsake_store::Vault;

// ── Statistics ───────────────────────────────────────────────────────────────

/// Per-memory-type usage summary.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct TypeStatistics {
    pub count: usize,
    pub mean_relevance: f64,
    pub mean_retrieval_count: f64,
    pub last_accessed: Option<Timestamp>,
}

/// Usage summary for one `(owner, persona)` pair.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct MemoryStatistics {
    pub by_type: BTreeMap<MemoryType, TypeStatistics>,
    pub total_slices: usize,
    pub mean_relevance: f64,
    pub total_retrievals: u64,
    pub total_chains: usize,
    pub mean_confidence: f64,
}

// ── MemoryVault ──────────────────────────────────────────────────────────────

/// The assembled vault: record store, slice index, retrieval engine, and
/// reasoner behind one constructor. Each instance owns its locks, cache,
/// and audit log; nothing is shared between instances.
pub struct MemoryVault {
    vault: Vault,
    index: Arc<SliceIndex>,
    retrieval: Arc<RetrievalEngine>,
    reasoner: Reasoner,
    audit: Arc<AuditLog>,
}

impl MemoryVault {
    pub fn open(config: VaultConfig) -> Result<Self, VaultError> {
        let audit = Arc::new(AuditLog::new());
        let vault = Vault::open(&config, audit.clone())?;
        let index = Arc::new(SliceIndex::open(&config.storage.index_path)?);
        let retrieval = Arc::new(RetrievalEngine::new(
            index.clone(),
            audit.clone(),
            config.retrieval.clone(),
        ));
        let reasoner = Reasoner::new(index.clone(), retrieval.clone(), audit.clone());
        Ok(Self {
            vault,
            index,
            retrieval,
            reasoner,
            audit,
        })
    }

    // ── Component access ─────────────────────────────────────────────────────

    /// The encrypted record store (persona/communal CRUD, export/import,
    /// snapshots).
    pub fn records(&self) -> &Vault {
        &self.vault
    }

    /// The persistent slice index.
    pub fn index(&self) -> &Arc<SliceIndex> {
        &self.index
    }

    /// The retrieval engine.
    pub fn retrieval(&self) -> &Arc<RetrievalEngine> {
        &self.retrieval
    }

    /// The reasoning chain generator.
    pub fn reasoner(&self) -> &Reasoner {
        &self.reasoner
    }

    /// The shared audit log.
    pub fn audit(&self) -> &AuditLog {
        &self.audit
    }

    // ── Record store conveniences ────────────────────────────────────────────

    pub fn upsert_persona(
        &self,
        persona_id: &str,
        owner_id: &str,
        payload: serde_json::Value,
    ) -> Result<(), VaultError> {
        self.vault.upsert_persona(persona_id, owner_id, payload)
    }

    pub fn get_persona(
        &self,
        persona_id: &str,
        owner_id: &str,
    ) -> Result<Option<PersonaMemory>, VaultError> {
        self.vault.get_persona(persona_id, owner_id)
    }

    pub fn delete_persona(&self, persona_id: &str, owner_id: &str) -> Result<bool, VaultError> {
        self.vault.delete_persona(persona_id, owner_id)
    }

    pub fn upsert_communal(
        &self,
        memory_id: &str,
        user_id: &str,
        payload: serde_json::Value,
    ) -> Result<(), VaultError> {
        self.vault.upsert_communal(memory_id, user_id, payload)
    }

    pub fn get_communal(
        &self,
        memory_id: &str,
        user_id: &str,
    ) -> Result<Option<CommunalMemory>, VaultError> {
        self.vault.get_communal(memory_id, user_id)
    }

    // ── Retrieval & reasoning ────────────────────────────────────────────────

    /// Store a slice of retrievable content for `(owner_id, persona_id)`.
    pub fn store_memory(
        &self,
        persona_id: &str,
        owner_id: &str,
        content: &str,
        memory_type: MemoryType,
        metadata: serde_json::Value,
    ) -> Result<String, VaultError> {
        self.retrieval
            .store_slice(persona_id, owner_id, content, memory_type, metadata)
    }

    /// Ranked lexical retrieval with default options.
    pub fn retrieve(
        &self,
        query: &str,
        owner_id: &str,
        persona_id: &str,
    ) -> Result<RetrievalResult, VaultError> {
        self.retrieval
            .retrieve(query, owner_id, persona_id, &RetrievalOptions::default())
    }

    /// Ranked lexical retrieval with per-call overrides.
    pub fn retrieve_with(
        &self,
        query: &str,
        owner_id: &str,
        persona_id: &str,
        options: &RetrievalOptions,
    ) -> Result<RetrievalResult, VaultError> {
        self.retrieval.retrieve(query, owner_id, persona_id, options)
    }

    /// Generate a reasoning chain, retrieving context with defaults.
    pub fn reason(
        &self,
        query: &str,
        owner_id: &str,
        persona_id: &str,
    ) -> Result<ReasoningChain, VaultError> {
        self.reasoner.reason(query, owner_id, persona_id, None)
    }

    /// Generate a reasoning chain over caller-supplied context slices.
    pub fn reason_with_context(
        &self,
        query: &str,
        owner_id: &str,
        persona_id: &str,
        context: Vec<MemorySlice>,
    ) -> Result<ReasoningChain, VaultError> {
        self.reasoner
            .reason(query, owner_id, persona_id, Some(context))
    }

    pub fn get_chain(&self, chain_id: &str) -> Result<Option<ReasoningChain>, VaultError> {
        self.reasoner.get_chain(chain_id)
    }

    /// Run the maintenance sweep.
    pub fn optimize(&self) -> Result<OptimizeReport, VaultError> {
        self.reasoner.optimize()
    }

    // ── Operational ──────────────────────────────────────────────────────────

    /// Export the audit trail as a JSON array, optionally filtered.
    pub fn export_audit_log(&self, filter: Option<&AuditFilter>) -> Result<String, VaultError> {
        self.audit.export_json(filter)
    }

    pub fn snapshot_to(&self, path: &Path) -> Result<(), VaultError> {
        self.vault.snapshot_to(path)
    }

    pub fn restore_from(&self, path: &Path) -> Result<(), VaultError> {
        self.vault.restore_from(path)
    }

    /// Usage statistics for one `(owner, persona)` pair.
    pub fn statistics(
        &self,
        persona_id: &str,
        owner_id: &str,
    ) -> Result<MemoryStatistics, VaultError> {
        let slices = self.index.slices_for(persona_id, owner_id, None)?;
        let chains = self.index.chains_for(persona_id, owner_id)?;

        let mut by_type: BTreeMap<MemoryType, TypeStatistics> = BTreeMap::new();
        for slice in &slices {
            let stats = by_type.entry(slice.memory_type).or_default();
            stats.count += 1;
            stats.mean_relevance += slice.relevance_score;
            stats.mean_retrieval_count += slice.retrieval_count as f64;
            stats.last_accessed = match stats.last_accessed {
                Some(seen) if seen >= slice.last_accessed => Some(seen),
                _ => Some(slice.last_accessed),
            };
        }
        for stats in by_type.values_mut() {
            if stats.count > 0 {
                stats.mean_relevance /= stats.count as f64;
                stats.mean_retrieval_count /= stats.count as f64;
            }
        }

        let total_slices = slices.len();
        let mean_relevance = if total_slices > 0 {
            slices.iter().map(|s| s.relevance_score).sum::<f64>() / total_slices as f64
        } else {
            0.0
        };
        let total_chains = chains.len();
        let mean_confidence = if total_chains > 0 {
            chains.iter().map(|c| c.confidence_score).sum::<f64>() / total_chains as f64
        } else {
            0.0
        };

        Ok(MemoryStatistics {
            by_type,
            total_slices,
            mean_relevance,
            total_retrievals: slices.iter().map(|s| s.retrieval_count).sum(),
            total_chains,
            mean_confidence,
        })
    }
}
