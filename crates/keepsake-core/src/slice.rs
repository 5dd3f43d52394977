//! Memory slices — the unit of retrievable content — and retrieval results.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::types::Timestamp;

// ── MemoryType ───────────────────────────────────────────────────────────────

/// Classification of a memory slice, following the usual cognitive split.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Debug)]
#[serde(rename_all = "lowercase")]
pub enum MemoryType {
    /// A specific experience ("what happened").
    Episodic,
    /// Conceptual knowledge ("what is known").
    Semantic,
    /// How-to knowledge ("what to do").
    Procedural,
    /// Short-lived scratch context.
    Working,
}

impl MemoryType {
    pub fn as_str(&self) -> &'static str {
        match self {
            MemoryType::Episodic => "episodic",
            MemoryType::Semantic => "semantic",
            MemoryType::Procedural => "procedural",
            MemoryType::Working => "working",
        }
    }
}

impl fmt::Display for MemoryType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ── MemorySlice ──────────────────────────────────────────────────────────────

/// A retrievable unit of text content with derived keywords and usage
/// statistics. Belongs to exactly one (owner, persona) pair.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct MemorySlice {
    /// Stable id: "slice_" + 12 hex chars of BLAKE3 over owner, persona,
    /// content, and the creation instant.
    pub slice_id: String,
    pub persona_id: String,
    pub owner_id: String,
    pub content: String,
    pub memory_type: MemoryType,
    /// Lowercased keywords in extraction order (most frequent first).
    pub keywords: Vec<String>,
    /// In [0, 1]; starts at 0.5 and drifts with the maintenance sweep.
    pub relevance_score: f64,
    pub created_at: Timestamp,
    pub last_accessed: Timestamp,
    pub retrieval_count: u64,
    pub metadata: serde_json::Value,
}

// ── RetrievalResult ──────────────────────────────────────────────────────────

/// Ranked output of a retrieval query. `slices` and `scores` are parallel,
/// sorted by descending boosted similarity.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RetrievalResult {
    pub slices: Vec<MemorySlice>,
    pub scores: Vec<f64>,
    /// Sum of all returned scores.
    pub total_relevance: f64,
    pub retrieval_time_ms: u64,
    /// Keywords extracted from the query text.
    pub query_keywords: Vec<String>,
}

impl RetrievalResult {
    pub fn empty(query_keywords: Vec<String>, retrieval_time_ms: u64) -> Self {
        Self {
            slices: Vec::new(),
            scores: Vec::new(),
            total_relevance: 0.0,
            retrieval_time_ms,
            query_keywords,
        }
    }
}
