//! The retrieval engine: slice storage and ranked lexical lookup.
//!
//! `retrieve` runs the full pipeline: query keyword extraction, a full-text
//! candidate pass, per-row similarity scoring with the stored relevance as
//! a multiplier, thresholding, a stable rank, and usage-statistic updates
//! for every returned slice.

use chrono::Utc;
use serde_json::json;
use std::cmp::Ordering;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Instant;
use tracing::warn;

use keepsake_core::constants::{FTS_MATCH_BOOST, INITIAL_RELEVANCE};
use keepsake_core::{
    AuditEntry, AuditLog, MemorySlice, MemoryType, RetrievalConfig, RetrievalResult, Timestamp,
    VaultError,
};
use keepsake_index::{extract_keywords, word_set, SliceIndex};

use crate::similarity::{combined_similarity, jaccard, keyword_similarity};

/// Per-call overrides for [`RetrievalEngine::retrieve`]. Unset fields fall
/// back to the engine's configuration.
#[derive(Clone, Debug, Default)]
pub struct RetrievalOptions {
    pub memory_types: Option<Vec<MemoryType>>,
    pub max_results: Option<usize>,
    pub min_similarity: Option<f64>,
}

pub struct RetrievalEngine {
    index: Arc<SliceIndex>,
    audit: Arc<AuditLog>,
    config: RetrievalConfig,
}

impl RetrievalEngine {
    pub fn new(index: Arc<SliceIndex>, audit: Arc<AuditLog>, config: RetrievalConfig) -> Self {
        Self {
            index,
            audit,
            config,
        }
    }

    pub fn index(&self) -> &Arc<SliceIndex> {
        &self.index
    }

    // ── Storage ──────────────────────────────────────────────────────────────

    /// Store a slice of content for `(owner_id, persona_id)`: extract its
    /// keywords, derive a stable id, and register it with the index and the
    /// full-text tree. Returns the slice id.
    pub fn store_slice(
        &self,
        persona_id: &str,
        owner_id: &str,
        content: &str,
        memory_type: MemoryType,
        metadata: serde_json::Value,
    ) -> Result<String, VaultError> {
        let now = Utc::now();
        let slice_id = derive_id("slice", persona_id, owner_id, content, now);
        let keywords = extract_keywords(content);
        let slice = MemorySlice {
            slice_id: slice_id.clone(),
            persona_id: persona_id.into(),
            owner_id: owner_id.into(),
            content: content.into(),
            memory_type,
            keywords: keywords.clone(),
            relevance_score: INITIAL_RELEVANCE,
            created_at: now,
            last_accessed: now,
            retrieval_count: 0,
            metadata,
        };

        let result = self.index.put_slice(&slice);
        let entry = AuditEntry::new("store_memory_slice", owner_id, "memory_slice")
            .persona(persona_id)
            .key(&slice_id)
            .details(json!({
                "content_length": content.len(),
                "memory_type": memory_type.as_str(),
                "keywords_count": keywords.len(),
            }));
        self.audit.record(match &result {
            Ok(()) => entry,
            Err(err) => entry.failed(err),
        });
        result.map(|_| slice_id)
    }

    // ── Retrieval ────────────────────────────────────────────────────────────

    /// Rank the stored slices of `(owner_id, persona_id)` against `query`.
    pub fn retrieve(
        &self,
        query: &str,
        owner_id: &str,
        persona_id: &str,
        options: &RetrievalOptions,
    ) -> Result<RetrievalResult, VaultError> {
        let result = self.retrieve_inner(query, owner_id, persona_id, options);
        let entry = AuditEntry::new("retrieve_memories", owner_id, "retrieval")
            .persona(persona_id)
            .details(match &result {
                Ok(r) => json!({
                    "query_length": query.len(),
                    "results_count": r.slices.len(),
                    "retrieval_time_ms": r.retrieval_time_ms,
                    "query_keywords": r.query_keywords.len(),
                }),
                Err(_) => json!({ "query_length": query.len() }),
            });
        self.audit.record(match &result {
            Ok(_) => entry,
            Err(err) => entry.failed(err),
        });
        result
    }

    fn retrieve_inner(
        &self,
        query: &str,
        owner_id: &str,
        persona_id: &str,
        options: &RetrievalOptions,
    ) -> Result<RetrievalResult, VaultError> {
        let started = Instant::now();
        let max_results = options.max_results.unwrap_or(self.config.max_results);
        let min_similarity = options.min_similarity.unwrap_or(self.config.min_similarity);

        let query_keywords = extract_keywords(query);
        let query_words = word_set(query);

        // Full-text candidates get a score boost below.
        let fts_hits: HashSet<String> = if query_keywords.is_empty() {
            HashSet::new()
        } else {
            self.index
                .fts_match_any(&query_keywords, max_results * 2)?
        };

        let rows = self.index.slices_for(
            persona_id,
            owner_id,
            options.memory_types.as_deref(),
        )?;

        let mut scored: Vec<(MemorySlice, f64)> = Vec::new();
        for row in rows {
            let kw_sim = keyword_similarity(&query_keywords, &row.keywords);
            let word_sim = jaccard(&query_words, &word_set(&row.content));
            let mut combined = combined_similarity(kw_sim, word_sim, self.config.keyword_boost);
            if fts_hits.contains(&row.slice_id) {
                combined = (combined * FTS_MATCH_BOOST).min(1.0);
            }
            let boosted = combined * (0.5 + 0.5 * row.relevance_score);
            if boosted >= min_similarity {
                scored.push((row, boosted));
            }
        }

        // Stable rank: score descending, slice id as the deterministic
        // tie-break.
        scored.sort_by(|(a, sa), (b, sb)| {
            sb.partial_cmp(sa)
                .unwrap_or(Ordering::Equal)
                .then_with(|| a.slice_id.cmp(&b.slice_id))
        });
        scored.truncate(max_results);

        self.touch_retrieved(&scored, Utc::now());

        let scores: Vec<f64> = scored.iter().map(|(_, s)| *s).collect();
        let slices: Vec<MemorySlice> = scored.into_iter().map(|(slice, _)| slice).collect();
        Ok(RetrievalResult {
            total_relevance: scores.iter().sum(),
            retrieval_time_ms: started.elapsed().as_millis() as u64,
            query_keywords,
            scores,
            slices,
        })
    }

    /// Bump usage statistics for every returned slice. A failed update is
    /// logged and skipped; it must not abort the retrieval.
    fn touch_retrieved(&self, scored: &[(MemorySlice, f64)], now: Timestamp) {
        for (slice, _) in scored {
            if let Err(err) = self.index.record_access(&slice.slice_id, now) {
                warn!(slice_id = %slice.slice_id, error = %err, "failed to update retrieval stats");
            }
        }
    }
}

/// Derive a stable record id: `<prefix>_` + 12 hex chars of BLAKE3 over the
/// owning pair, the content, and the creation instant.
pub fn derive_id(
    prefix: &str,
    persona_id: &str,
    owner_id: &str,
    content: &str,
    at: Timestamp,
) -> String {
    let seed = format!("{persona_id}\0{owner_id}\0{content}\0{}", at.to_rfc3339());
    let digest = blake3::hash(seed.as_bytes());
    format!("{prefix}_{}", &hex::encode(digest.as_bytes())[..12])
}
