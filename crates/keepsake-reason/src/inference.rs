//! Logical inference over context slices and recognized patterns.
//!
//! Monotonic confidence accumulation: start at 0.4, add a fixed increment
//! for each supporting observation, cap at 1.0. Each observation also
//! contributes a human-readable sentence; the first three become the final
//! conclusion. With nothing to say, the conclusion is a low-information
//! fallback at confidence 0.2.

use std::collections::BTreeMap;

use keepsake_core::{MemorySlice, MemoryType, Pattern, PatternData};

const BASE_CONFIDENCE: f64 = 0.4;
const FALLBACK_CONFIDENCE: f64 = 0.2;

/// Query prefix length used in conclusions.
const QUERY_PREVIEW: usize = 50;

#[derive(Clone, Debug, PartialEq)]
pub struct Inference {
    pub conclusion: String,
    pub confidence: f64,
    /// The individual observations backing the conclusion.
    pub elements: Vec<String>,
}

pub fn infer(
    query: &str,
    query_keywords: &[String],
    slices: &[MemorySlice],
    patterns: &[Pattern],
) -> Inference {
    let mut confidence = BASE_CONFIDENCE;
    let mut elements = Vec::new();

    let mut type_counts: BTreeMap<MemoryType, usize> = BTreeMap::new();
    for slice in slices {
        *type_counts.entry(slice.memory_type).or_insert(0) += 1;
    }

    if let Some(count) = type_counts.get(&MemoryType::Episodic) {
        elements.push(format!(
            "Found {count} episodic memories providing specific experience context"
        ));
        confidence += 0.1;
    }
    if let Some(count) = type_counts.get(&MemoryType::Semantic) {
        elements.push(format!(
            "Retrieved {count} semantic memories with conceptual knowledge"
        ));
        confidence += 0.1;
    }
    if let Some(count) = type_counts.get(&MemoryType::Procedural) {
        elements.push(format!(
            "Identified {count} procedural memories suggesting actionable approaches"
        ));
        confidence += 0.1;
    }

    for pattern in patterns {
        match &pattern.data {
            PatternData::KeywordClustering { overlap_ratio, .. } => {
                if *overlap_ratio > 0.5 {
                    elements.push(format!(
                        "Strong thematic alignment with {:.1}% keyword overlap",
                        overlap_ratio * 100.0
                    ));
                    confidence += 0.15;
                } else if *overlap_ratio > 0.2 {
                    elements.push(format!(
                        "Moderate thematic connection with {:.1}% keyword overlap",
                        overlap_ratio * 100.0
                    ));
                    confidence += 0.05;
                }
            }
            PatternData::RelevanceDistribution { mean_relevance, .. } => {
                if *mean_relevance > 0.7 {
                    elements.push(
                        "High-quality memory context supports strong inference".into(),
                    );
                    confidence += 0.1;
                } else if *mean_relevance > 0.5 {
                    elements.push(
                        "Moderate-quality memory context provides useful insights".into(),
                    );
                    confidence += 0.05;
                }
            }
            PatternData::TemporalClustering { span_hours, .. } => {
                if *span_hours < 24.0 {
                    elements.push("Recent memory cluster suggests immediate relevance".into());
                    confidence += 0.1;
                } else if *span_hours < 168.0 {
                    elements.push("Weekly memory pattern indicates ongoing relevance".into());
                    confidence += 0.05;
                }
            }
            PatternData::MemoryTypeDistribution { .. } => {}
        }
    }

    let preview: String = query.chars().take(QUERY_PREVIEW).collect();
    if elements.is_empty() {
        return Inference {
            conclusion: format!(
                "Limited context available for query '{preview}...'. \
                 Consider refining query or adding more relevant memories."
            ),
            confidence: FALLBACK_CONFIDENCE,
            elements,
        };
    }

    let quality = match slices.len() {
        n if n > 5 => "comprehensive",
        n if n > 2 => "sufficient",
        _ => "limited",
    };
    let mut conclusion = format!(
        "Analysis of {} {quality} memories for query '{preview}...' reveals: {}",
        slices.len(),
        elements
            .iter()
            .take(3)
            .cloned()
            .collect::<Vec<_>>()
            .join("; ")
    );
    if query_keywords.len() > 3 {
        conclusion.push_str(&format!(
            ". Query complexity ({} key concepts) matches memory diversity.",
            query_keywords.len()
        ));
    }

    Inference {
        conclusion,
        confidence: confidence.min(1.0),
        elements,
    }
}
