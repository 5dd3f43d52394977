//! The reasoning chain generator.
//!
//! Four fixed steps — query analysis, memory retrieval, pattern
//! recognition, logical inference — over a context of retrieved slices.
//! When the caller supplies no context, the retrieval engine is invoked
//! with defaults. Chains are persisted to the index and cached in memory;
//! given identical context and query text the chain content is
//! deterministic.

use chrono::Utc;
use serde_json::json;
use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex};

use keepsake_core::{
    AuditEntry, AuditLog, MemorySlice, MemoryType, ReasoningChain, ReasoningStep, StepKind,
    VaultError,
};
use keepsake_index::{extract_keywords, SliceIndex};
use keepsake_retrieval::{derive_id, RetrievalEngine, RetrievalOptions};

use crate::inference::infer;
use crate::patterns::analyze;

pub struct Reasoner {
    index: Arc<SliceIndex>,
    retrieval: Arc<RetrievalEngine>,
    audit: Arc<AuditLog>,
    chain_cache: Mutex<HashMap<String, ReasoningChain>>,
}

impl Reasoner {
    pub fn new(
        index: Arc<SliceIndex>,
        retrieval: Arc<RetrievalEngine>,
        audit: Arc<AuditLog>,
    ) -> Self {
        Self {
            index,
            retrieval,
            audit,
            chain_cache: Mutex::new(HashMap::new()),
        }
    }

    pub fn index(&self) -> &Arc<SliceIndex> {
        &self.index
    }

    /// Generate, persist, and cache a reasoning chain for `query`.
    pub fn reason(
        &self,
        query: &str,
        owner_id: &str,
        persona_id: &str,
        context: Option<Vec<MemorySlice>>,
    ) -> Result<ReasoningChain, VaultError> {
        let result = self.reason_inner(query, owner_id, persona_id, context);
        let entry = AuditEntry::new("generate_reasoning_chain", owner_id, "reasoning_chain")
            .persona(persona_id)
            .details(match &result {
                Ok(chain) => json!({
                    "query_length": query.len(),
                    "context_memories": chain.supporting_memories.len(),
                    "confidence_score": chain.confidence_score,
                }),
                Err(_) => json!({ "query_length": query.len() }),
            });
        self.audit.record(match &result {
            Ok(chain) => entry.key(&chain.chain_id),
            Err(err) => entry.failed(err),
        });
        result
    }

    fn reason_inner(
        &self,
        query: &str,
        owner_id: &str,
        persona_id: &str,
        context: Option<Vec<MemorySlice>>,
    ) -> Result<ReasoningChain, VaultError> {
        let context = match context {
            Some(slices) => slices,
            None => {
                self.retrieval
                    .retrieve(query, owner_id, persona_id, &RetrievalOptions::default())?
                    .slices
            }
        };

        let now = Utc::now();
        let chain_id = derive_id("chain", persona_id, owner_id, query, now);
        let query_keywords = extract_keywords(query);

        let mut steps = Vec::with_capacity(4);
        steps.push(ReasoningStep {
            step: 0,
            kind: StepKind::QueryAnalysis,
            description: "Analyzing query and extracting key concepts".into(),
            output: format!(
                "Extracted {} key concepts: {}",
                query_keywords.len(),
                query_keywords
                    .iter()
                    .take(5)
                    .cloned()
                    .collect::<Vec<_>>()
                    .join(", ")
            ),
            confidence: 0.9,
        });

        if !context.is_empty() {
            let mut distribution: BTreeMap<MemoryType, usize> = BTreeMap::new();
            for slice in &context {
                *distribution.entry(slice.memory_type).or_insert(0) += 1;
            }
            let mean_relevance = context.iter().map(|s| s.relevance_score).sum::<f64>()
                / context.len() as f64;
            steps.push(ReasoningStep {
                step: 0,
                kind: StepKind::MemoryRetrieval,
                description: "Retrieved and analyzed relevant memories".into(),
                output: format!(
                    "Found {} relevant memories: {}",
                    context.len(),
                    format_distribution(&distribution)
                ),
                confidence: mean_relevance.min(0.8),
            });
        }

        let patterns = analyze(&context, &query_keywords);
        steps.push(ReasoningStep {
            step: 0,
            kind: StepKind::PatternRecognition,
            description: "Identifying patterns and relationships in retrieved memories".into(),
            output: format!("Identified {} patterns in memory context", patterns.len()),
            confidence: 0.7,
        });

        let inference = infer(query, &query_keywords, &context, &patterns);
        steps.push(ReasoningStep {
            step: 0,
            kind: StepKind::LogicalInference,
            description: "Performing logical inference based on patterns and context".into(),
            output: inference.conclusion.clone(),
            confidence: inference.confidence,
        });

        for (position, step) in steps.iter_mut().enumerate() {
            step.step = position as u32 + 1;
        }
        let confidence_score =
            steps.iter().map(|s| s.confidence).sum::<f64>() / steps.len() as f64;

        let chain = ReasoningChain {
            chain_id: chain_id.clone(),
            owner_id: owner_id.into(),
            persona_id: persona_id.into(),
            initial_query: query.into(),
            reasoning_steps: steps,
            final_conclusion: inference.conclusion,
            confidence_score,
            supporting_memories: context.iter().map(|s| s.slice_id.clone()).collect(),
            created_at: now,
        };

        self.index.put_chain(&chain)?;
        self.chain_cache
            .lock()
            .expect("chain cache lock poisoned")
            .insert(chain_id, chain.clone());
        Ok(chain)
    }

    /// Look a chain up through the in-memory cache, falling back to the
    /// persistent index.
    pub fn get_chain(&self, chain_id: &str) -> Result<Option<ReasoningChain>, VaultError> {
        if let Some(chain) = self
            .chain_cache
            .lock()
            .expect("chain cache lock poisoned")
            .get(chain_id)
        {
            return Ok(Some(chain.clone()));
        }
        let chain = self.index.get_chain(chain_id)?;
        if let Some(chain) = &chain {
            self.chain_cache
                .lock()
                .expect("chain cache lock poisoned")
                .insert(chain_id.into(), chain.clone());
        }
        Ok(chain)
    }

    pub(crate) fn audit_log(&self) -> &Arc<AuditLog> {
        &self.audit
    }

    /// Evict cached chains created before `cutoff`; returns how many.
    pub(crate) fn evict_cached_chains_before(
        &self,
        cutoff: keepsake_core::Timestamp,
    ) -> usize {
        let mut cache = self.chain_cache.lock().expect("chain cache lock poisoned");
        let before = cache.len();
        cache.retain(|_, chain| chain.created_at >= cutoff);
        before - cache.len()
    }
}

fn format_distribution(distribution: &BTreeMap<MemoryType, usize>) -> String {
    let parts: Vec<String> = distribution
        .iter()
        .map(|(memory_type, count)| format!("{memory_type}: {count}"))
        .collect();
    format!("{{{}}}", parts.join(", "))
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use chrono::Duration;
    use keepsake_core::RetrievalConfig;
    use serde_json::json;
    use std::path::PathBuf;

    pub(crate) struct TestReasoner {
        pub reasoner: Reasoner,
        dir: PathBuf,
    }

    impl TestReasoner {
        pub(crate) fn new(tag: &str) -> Self {
            let dir = std::env::temp_dir().join(format!(
                "keepsake_reason_{tag}_{}",
                std::process::id()
            ));
            let _ = std::fs::remove_dir_all(&dir);
            let index = Arc::new(SliceIndex::open(&dir).unwrap());
            let audit = Arc::new(AuditLog::new());
            let retrieval = Arc::new(RetrievalEngine::new(
                index.clone(),
                audit.clone(),
                RetrievalConfig::default(),
            ));
            Self {
                reasoner: Reasoner::new(index, retrieval, audit),
                dir,
            }
        }
    }

    impl Drop for TestReasoner {
        fn drop(&mut self) {
            let _ = std::fs::remove_dir_all(&self.dir);
        }
    }

    pub(crate) fn context_slice(
        id: &str,
        memory_type: MemoryType,
        content: &str,
        age_hours: i64,
    ) -> MemorySlice {
        let at = Utc::now() - Duration::hours(age_hours);
        MemorySlice {
            slice_id: id.into(),
            persona_id: "alden".into(),
            owner_id: "user-1".into(),
            content: content.into(),
            memory_type,
            keywords: keepsake_index::extract_keywords(content),
            relevance_score: 0.5,
            created_at: at,
            last_accessed: at,
            retrieval_count: 0,
            metadata: json!({}),
        }
    }

    #[test]
    fn chain_has_four_ordered_steps_with_context() {
        let t = TestReasoner::new("shape");
        let context = vec![
            context_slice("slice_a", MemoryType::Episodic, "walked in the park", 2),
            context_slice("slice_b", MemoryType::Episodic, "met a friend downtown", 1),
            context_slice("slice_c", MemoryType::Semantic, "parks improve wellbeing", 0),
        ];
        let chain = t
            .reasoner
            .reason("summarize", "user-1", "alden", Some(context))
            .unwrap();

        let kinds: Vec<StepKind> = chain.reasoning_steps.iter().map(|s| s.kind).collect();
        assert_eq!(
            kinds,
            vec![
                StepKind::QueryAnalysis,
                StepKind::MemoryRetrieval,
                StepKind::PatternRecognition,
                StepKind::LogicalInference,
            ]
        );
        let numbers: Vec<u32> = chain.reasoning_steps.iter().map(|s| s.step).collect();
        assert_eq!(numbers, vec![1, 2, 3, 4]);
        assert_eq!(
            chain.supporting_memories,
            vec!["slice_a", "slice_b", "slice_c"]
        );
        assert!(chain.confidence_score >= 0.55 && chain.confidence_score <= 0.9);
    }

    #[test]
    fn confidence_is_the_mean_of_step_confidences() {
        let t = TestReasoner::new("mean");
        let context = vec![context_slice(
            "slice_a",
            MemoryType::Episodic,
            "a single memory",
            0,
        )];
        let chain = t
            .reasoner
            .reason("what happened", "user-1", "alden", Some(context))
            .unwrap();
        let mean = chain
            .reasoning_steps
            .iter()
            .map(|s| s.confidence)
            .sum::<f64>()
            / chain.reasoning_steps.len() as f64;
        assert!((chain.confidence_score - mean).abs() < 1e-9);
    }

    #[test]
    fn empty_context_yields_low_information_chain() {
        let t = TestReasoner::new("empty");
        let chain = t
            .reasoner
            .reason("summarize", "user-1", "alden", Some(vec![]))
            .unwrap();
        // No memory-retrieval step without context.
        assert_eq!(chain.reasoning_steps.len(), 3);
        assert!(chain.final_conclusion.contains("Limited context"));
        let expected = (0.9 + 0.7 + 0.2) / 3.0;
        assert!((chain.confidence_score - expected).abs() < 1e-9);
    }

    #[test]
    fn chain_is_persisted_and_readable_through_the_cache() {
        let t = TestReasoner::new("persist");
        let chain = t
            .reasoner
            .reason("summarize", "user-1", "alden", Some(vec![]))
            .unwrap();

        let cached = t.reasoner.get_chain(&chain.chain_id).unwrap().unwrap();
        assert_eq!(cached, chain);

        // Also present in the persistent index.
        let persisted = t.reasoner.index().get_chain(&chain.chain_id).unwrap().unwrap();
        assert_eq!(persisted.final_conclusion, chain.final_conclusion);
    }

    #[test]
    fn absent_context_falls_back_to_retrieval() {
        let t = TestReasoner::new("fallback");
        // Nothing stored: retrieval returns an empty context and the chain
        // still forms.
        let chain = t
            .reasoner
            .reason("summarize", "user-1", "alden", None)
            .unwrap();
        assert!(chain.supporting_memories.is_empty());
    }
}
