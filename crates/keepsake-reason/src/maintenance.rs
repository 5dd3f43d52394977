//! Maintenance sweep over the slice index and chain stores.
//!
//! Idempotent: deletes expired chains and dead slices, drifts relevance
//! scores toward observed usage, clears orphaned full-text postings, and
//! evicts stale cached chains. Returns counts and wall-clock duration.

use chrono::{Duration, Utc};
use serde_json::json;
use std::time::Instant;
use tracing::info;

use keepsake_core::constants::{
    CHAIN_RETENTION_DAYS, SCORE_BUMP_HOT, SCORE_BUMP_WARM, SCORE_DECAY_FLOOR, SCORE_DECAY_IDLE,
    SLICE_IDLE_DAYS, SLICE_PRUNE_SCORE,
};
use keepsake_core::{AuditEntry, VaultError};

use crate::chains::Reasoner;

/// What one `optimize` pass did.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct OptimizeReport {
    pub deleted_chains: usize,
    pub deleted_memories: usize,
    pub updated_scores: usize,
    pub removed_postings: usize,
    pub evicted_cached_chains: usize,
    pub duration_ms: u64,
}

impl Reasoner {
    /// Run the maintenance sweep.
    pub fn optimize(&self) -> Result<OptimizeReport, VaultError> {
        let result = self.optimize_inner();
        let entry = AuditEntry::new("optimize_memory_storage", "system", "optimization").details(
            match &result {
                Ok(report) => json!({
                    "deleted_chains": report.deleted_chains,
                    "deleted_memories": report.deleted_memories,
                    "updated_scores": report.updated_scores,
                    "removed_postings": report.removed_postings,
                    "evicted_cached_chains": report.evicted_cached_chains,
                    "duration_ms": report.duration_ms,
                }),
                Err(_) => json!({}),
            },
        );
        self.audit_log().record(match &result {
            Ok(_) => entry,
            Err(err) => entry.failed(err),
        });
        result
    }

    fn optimize_inner(&self) -> Result<OptimizeReport, VaultError> {
        let started = Instant::now();
        let now = Utc::now();
        let chain_cutoff = now - Duration::days(CHAIN_RETENTION_DAYS);
        let idle_cutoff = now - Duration::days(SLICE_IDLE_DAYS);
        let mut report = OptimizeReport::default();
        let index = self.index();

        // Expired chains first.
        for chain in index.iter_all_chains()? {
            if chain.created_at < chain_cutoff && index.remove_chain(&chain.chain_id)? {
                report.deleted_chains += 1;
            }
        }

        // Dead slices: low score, idle, never retrieved.
        for slice in index.iter_all_slices()? {
            let dead = slice.relevance_score < SLICE_PRUNE_SCORE
                && slice.last_accessed < idle_cutoff
                && slice.retrieval_count == 0;
            if dead && index.remove_slice(&slice.slice_id)? {
                report.deleted_memories += 1;
            }
        }

        // Score drift for the survivors.
        for mut slice in index.iter_all_slices()? {
            let current = slice.relevance_score;
            let adjusted = if slice.retrieval_count > 10 {
                (current + SCORE_BUMP_HOT).min(1.0)
            } else if slice.retrieval_count > 5 {
                (current + SCORE_BUMP_WARM).min(1.0)
            } else if slice.retrieval_count == 0 && slice.last_accessed < idle_cutoff {
                (current - SCORE_DECAY_IDLE).max(SCORE_DECAY_FLOOR)
            } else {
                current
            };
            if (adjusted - current).abs() > f64::EPSILON {
                slice.relevance_score = adjusted;
                index.put_slice(&slice)?;
                report.updated_scores += 1;
            }
        }

        report.removed_postings = index.remove_fts_orphans()?;
        report.evicted_cached_chains = self.evict_cached_chains_before(chain_cutoff);
        report.duration_ms = started.elapsed().as_millis() as u64;

        info!(
            deleted_chains = report.deleted_chains,
            deleted_memories = report.deleted_memories,
            updated_scores = report.updated_scores,
            "maintenance sweep complete"
        );
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chains::tests::{context_slice, TestReasoner};
    use keepsake_core::{MemoryType, ReasoningChain};

    #[test]
    fn empty_store_sweeps_to_all_zero_counts() {
        let t = TestReasoner::new("sweep_empty");
        let report = t.reasoner.optimize().unwrap();
        assert_eq!(report.deleted_chains, 0);
        assert_eq!(report.deleted_memories, 0);
        assert_eq!(report.updated_scores, 0);
        assert_eq!(report.removed_postings, 0);
    }

    #[test]
    fn expired_chain_and_dead_slice_are_removed() {
        let t = TestReasoner::new("sweep_dead");
        let index = t.reasoner.index();

        let old_chain = ReasoningChain {
            chain_id: "chain_old".into(),
            owner_id: "user-1".into(),
            persona_id: "alden".into(),
            initial_query: "old query".into(),
            reasoning_steps: vec![],
            final_conclusion: "stale".into(),
            confidence_score: 0.5,
            supporting_memories: vec![],
            created_at: Utc::now() - Duration::days(40),
        };
        index.put_chain(&old_chain).unwrap();

        let mut dead = context_slice("slice_dead", MemoryType::Episodic, "forgotten", 10 * 24);
        dead.relevance_score = 0.15;
        index.put_slice(&dead).unwrap();

        let report = t.reasoner.optimize().unwrap();
        assert_eq!(report.deleted_chains, 1);
        assert_eq!(report.deleted_memories, 1);
        assert!(index.get_chain("chain_old").unwrap().is_none());
        assert!(index.get_slice("slice_dead").unwrap().is_none());
        // Postings of the deleted slice are gone with it.
        assert!(index
            .fts_match_any(&["forgotten".into()], 10)
            .unwrap()
            .is_empty());
    }

    #[test]
    fn scores_drift_with_usage() {
        let t = TestReasoner::new("sweep_scores");
        let index = t.reasoner.index();

        let mut hot = context_slice("slice_hot", MemoryType::Episodic, "often used", 0);
        hot.retrieval_count = 11;
        index.put_slice(&hot).unwrap();

        let mut warm = context_slice("slice_warm", MemoryType::Episodic, "sometimes used", 0);
        warm.retrieval_count = 6;
        index.put_slice(&warm).unwrap();

        // Idle but above the prune score, so it decays instead of dying.
        let idle = context_slice("slice_idle", MemoryType::Episodic, "rarely used", 10 * 24);
        index.put_slice(&idle).unwrap();

        let report = t.reasoner.optimize().unwrap();
        assert_eq!(report.updated_scores, 3);

        let hot = index.get_slice("slice_hot").unwrap().unwrap();
        assert!((hot.relevance_score - 0.6).abs() < 1e-9);
        let warm = index.get_slice("slice_warm").unwrap().unwrap();
        assert!((warm.relevance_score - 0.55).abs() < 1e-9);
        let idle = index.get_slice("slice_idle").unwrap().unwrap();
        assert!((idle.relevance_score - 0.45).abs() < 1e-9);
    }

    #[test]
    fn sweep_is_idempotent_for_fresh_data() {
        let t = TestReasoner::new("sweep_idem");
        let index = t.reasoner.index();
        index
            .put_slice(&context_slice(
                "slice_fresh",
                MemoryType::Episodic,
                "fresh memory",
                0,
            ))
            .unwrap();

        let first = t.reasoner.optimize().unwrap();
        assert_eq!(first.deleted_memories, 0);
        assert_eq!(first.updated_scores, 0);

        let second = t.reasoner.optimize().unwrap();
        assert_eq!(second.deleted_memories, 0);
        assert_eq!(second.updated_scores, 0);
        assert!(index.get_slice("slice_fresh").unwrap().is_some());
    }

    #[test]
    fn recent_cached_chains_survive_eviction() {
        let t = TestReasoner::new("sweep_cache");
        let chain = t
            .reasoner
            .reason("summarize", "user-1", "alden", Some(vec![]))
            .unwrap();
        let report = t.reasoner.optimize().unwrap();
        assert_eq!(report.evicted_cached_chains, 0);
        assert!(t.reasoner.get_chain(&chain.chain_id).unwrap().is_some());
    }
}
