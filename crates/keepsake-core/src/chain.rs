//! Reasoning chains and the patterns that feed them.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

use crate::slice::MemoryType;
use crate::types::Timestamp;

// ── Patterns ─────────────────────────────────────────────────────────────────

/// Measurements computed by the pattern analyzer over a set of retrieved
/// slices. Each variant carries the numbers the inference rules read.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PatternData {
    MemoryTypeDistribution {
        counts: BTreeMap<MemoryType, usize>,
        dominant: MemoryType,
    },
    KeywordClustering {
        /// Top keywords across all slices with their frequencies.
        common_keywords: Vec<(String, usize)>,
        /// The subset of those that also appear in the query keywords.
        query_overlap: Vec<String>,
        overlap_ratio: f64,
    },
    TemporalClustering {
        mean_gap_hours: f64,
        span_hours: f64,
        memory_count: usize,
    },
    RelevanceDistribution {
        mean_relevance: f64,
        high_relevance_count: usize,
        total_memories: usize,
    },
}

impl PatternData {
    pub fn kind(&self) -> &'static str {
        match self {
            PatternData::MemoryTypeDistribution { .. } => "memory_type_distribution",
            PatternData::KeywordClustering { .. } => "keyword_clustering",
            PatternData::TemporalClustering { .. } => "temporal_clustering",
            PatternData::RelevanceDistribution { .. } => "relevance_distribution",
        }
    }
}

/// One recognized pattern: the measurement, a human-readable summary, and a
/// fixed confidence for the pattern family.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct Pattern {
    pub description: String,
    pub data: PatternData,
    pub confidence: f64,
}

// ── Reasoning steps ──────────────────────────────────────────────────────────

/// The four fixed stages of a reasoning chain, always emitted in this order.
#[derive(Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Debug)]
#[serde(rename_all = "snake_case")]
pub enum StepKind {
    QueryAnalysis,
    MemoryRetrieval,
    PatternRecognition,
    LogicalInference,
}

impl StepKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            StepKind::QueryAnalysis => "query_analysis",
            StepKind::MemoryRetrieval => "memory_retrieval",
            StepKind::PatternRecognition => "pattern_recognition",
            StepKind::LogicalInference => "logical_inference",
        }
    }
}

impl fmt::Display for StepKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One step of a reasoning chain.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct ReasoningStep {
    /// 1-based position in the chain.
    pub step: u32,
    pub kind: StepKind,
    pub description: String,
    pub output: String,
    pub confidence: f64,
}

// ── ReasoningChain ───────────────────────────────────────────────────────────

/// A synthesized multi-step analysis over retrieved slices. The overall
/// confidence is the arithmetic mean of the step confidences.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct ReasoningChain {
    /// "chain_" + 12 hex chars of BLAKE3 over owner, persona, query, and
    /// the creation instant.
    pub chain_id: String,
    pub owner_id: String,
    pub persona_id: String,
    pub initial_query: String,
    pub reasoning_steps: Vec<ReasoningStep>,
    pub final_conclusion: String,
    pub confidence_score: f64,
    /// Slice ids of the context, in retrieval order.
    pub supporting_memories: Vec<String>,
    pub created_at: Timestamp,
}
