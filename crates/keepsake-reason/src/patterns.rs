//! Pattern recognition over retrieved slices.
//!
//! Pure function: given the context slices and the query keywords, compute
//! up to four measurements — memory-type distribution, keyword clustering,
//! temporal clustering, relevance distribution — each with a fixed
//! confidence for its family. Empty context yields no patterns.

use std::collections::{BTreeMap, HashMap};

use keepsake_core::{MemorySlice, MemoryType, Pattern, PatternData};

/// Top keywords considered for the clustering pattern.
const TOP_KEYWORDS: usize = 5;

/// Relevance score above which a slice counts as high-relevance.
const HIGH_RELEVANCE: f64 = 0.7;

pub fn analyze(slices: &[MemorySlice], query_keywords: &[String]) -> Vec<Pattern> {
    let mut patterns = Vec::new();
    if slices.is_empty() {
        return patterns;
    }

    patterns.push(type_distribution(slices));
    if let Some(pattern) = keyword_clustering(slices, query_keywords) {
        patterns.push(pattern);
    }
    if let Some(pattern) = temporal_clustering(slices) {
        patterns.push(pattern);
    }
    patterns.push(relevance_distribution(slices));
    patterns
}

fn type_distribution(slices: &[MemorySlice]) -> Pattern {
    let mut counts: BTreeMap<MemoryType, usize> = BTreeMap::new();
    for slice in slices {
        *counts.entry(slice.memory_type).or_insert(0) += 1;
    }
    let max_count = counts.values().copied().max().unwrap_or(0);
    // Ties go to the type seen earliest in the context.
    let dominant = slices
        .iter()
        .map(|s| s.memory_type)
        .find(|t| counts[t] == max_count)
        .unwrap_or(slices[0].memory_type);

    Pattern {
        description: format!("Dominant memory type: {dominant} ({max_count} instances)"),
        data: PatternData::MemoryTypeDistribution { counts, dominant },
        confidence: 0.8,
    }
}

fn keyword_clustering(slices: &[MemorySlice], query_keywords: &[String]) -> Option<Pattern> {
    let mut stats: HashMap<&str, (usize, usize)> = HashMap::new();
    let mut position = 0usize;
    for slice in slices {
        for keyword in &slice.keywords {
            let entry = stats.entry(keyword.as_str()).or_insert((0, position));
            entry.0 += 1;
            position += 1;
        }
    }
    if stats.is_empty() {
        return None;
    }

    let mut ranked: Vec<(&str, usize, usize)> = stats
        .into_iter()
        .map(|(token, (count, first))| (token, count, first))
        .collect();
    ranked.sort_by(|a, b| b.1.cmp(&a.1).then(a.2.cmp(&b.2)));
    let common_keywords: Vec<(String, usize)> = ranked
        .into_iter()
        .take(TOP_KEYWORDS)
        .map(|(token, count, _)| (token.to_string(), count))
        .collect();

    let query_overlap: Vec<String> = common_keywords
        .iter()
        .filter(|(token, _)| query_keywords.contains(token))
        .map(|(token, _)| token.clone())
        .collect();
    let overlap_ratio = query_overlap.len() as f64 / query_keywords.len().max(1) as f64;

    let themes: Vec<&str> = common_keywords
        .iter()
        .take(3)
        .map(|(token, _)| token.as_str())
        .collect();
    Some(Pattern {
        description: format!("Common themes: {}", themes.join(", ")),
        data: PatternData::KeywordClustering {
            common_keywords,
            query_overlap,
            overlap_ratio,
        },
        confidence: 0.7,
    })
}

fn temporal_clustering(slices: &[MemorySlice]) -> Option<Pattern> {
    if slices.len() < 2 {
        return None;
    }
    let mut timestamps: Vec<_> = slices.iter().map(|s| s.created_at).collect();
    timestamps.sort();

    let gaps_seconds: Vec<f64> = timestamps
        .windows(2)
        .map(|pair| (pair[1] - pair[0]).num_milliseconds() as f64 / 1000.0)
        .collect();
    let mean_gap_hours =
        gaps_seconds.iter().sum::<f64>() / gaps_seconds.len() as f64 / 3600.0;
    let span_hours = (*timestamps.last().expect("non-empty") - timestamps[0])
        .num_milliseconds() as f64
        / 1000.0
        / 3600.0;

    Some(Pattern {
        description: format!("Average time between memories: {mean_gap_hours:.1} hours"),
        data: PatternData::TemporalClustering {
            mean_gap_hours,
            span_hours,
            memory_count: timestamps.len(),
        },
        confidence: 0.6,
    })
}

fn relevance_distribution(slices: &[MemorySlice]) -> Pattern {
    let mean_relevance =
        slices.iter().map(|s| s.relevance_score).sum::<f64>() / slices.len() as f64;
    let high_relevance_count = slices
        .iter()
        .filter(|s| s.relevance_score > HIGH_RELEVANCE)
        .count();

    Pattern {
        description: format!(
            "Average relevance: {mean_relevance:.2} ({high_relevance_count} high-relevance memories)"
        ),
        data: PatternData::RelevanceDistribution {
            mean_relevance,
            high_relevance_count,
            total_memories: slices.len(),
        },
        confidence: 0.8,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, Utc};
    use serde_json::json;

    fn slice(id: &str, memory_type: MemoryType, content: &str, age_hours: i64) -> MemorySlice {
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
    fn empty_context_yields_no_patterns() {
        assert!(analyze(&[], &["anything".into()]).is_empty());
    }

    #[test]
    fn all_four_patterns_emerge_from_mixed_context() {
        let slices = vec![
            slice("a", MemoryType::Episodic, "apple pie baked yesterday", 2),
            slice("b", MemoryType::Episodic, "apple tart baked today", 1),
            slice("c", MemoryType::Semantic, "apples contain pectin", 0),
        ];
        let patterns = analyze(&slices, &["apple".into(), "baking".into()]);
        assert_eq!(patterns.len(), 4);
        assert_eq!(patterns[0].data.kind(), "memory_type_distribution");
        assert_eq!(patterns[1].data.kind(), "keyword_clustering");
        assert_eq!(patterns[2].data.kind(), "temporal_clustering");
        assert_eq!(patterns[3].data.kind(), "relevance_distribution");
    }

    #[test]
    fn dominant_type_reflects_the_majority() {
        let slices = vec![
            slice("a", MemoryType::Episodic, "one", 0),
            slice("b", MemoryType::Episodic, "two", 0),
            slice("c", MemoryType::Semantic, "three", 0),
        ];
        let patterns = analyze(&slices, &[]);
        match &patterns[0].data {
            PatternData::MemoryTypeDistribution { counts, dominant } => {
                assert_eq!(*dominant, MemoryType::Episodic);
                assert_eq!(counts[&MemoryType::Episodic], 2);
                assert_eq!(counts[&MemoryType::Semantic], 1);
            }
            other => panic!("unexpected pattern: {other:?}"),
        }
    }

    #[test]
    fn overlap_ratio_counts_query_keywords_in_top_terms() {
        let slices = vec![
            slice("a", MemoryType::Episodic, "apple pie apple crumble", 0),
            slice("b", MemoryType::Episodic, "apple sauce", 0),
        ];
        let query_keywords = vec!["apple".to_string(), "quantum".to_string()];
        let patterns = analyze(&slices, &query_keywords);
        let clustering = patterns
            .iter()
            .find(|p| p.data.kind() == "keyword_clustering")
            .unwrap();
        match &clustering.data {
            PatternData::KeywordClustering {
                query_overlap,
                overlap_ratio,
                ..
            } => {
                assert_eq!(query_overlap, &["apple".to_string()]);
                assert!((overlap_ratio - 0.5).abs() < 1e-12);
            }
            other => panic!("unexpected pattern: {other:?}"),
        }
    }

    #[test]
    fn temporal_pattern_needs_at_least_two_slices() {
        let one = vec![slice("a", MemoryType::Episodic, "only one", 0)];
        let patterns = analyze(&one, &[]);
        assert!(patterns
            .iter()
            .all(|p| p.data.kind() != "temporal_clustering"));
    }

    #[test]
    fn temporal_span_matches_seeded_ages() {
        let slices = vec![
            slice("a", MemoryType::Episodic, "first", 10),
            slice("b", MemoryType::Episodic, "second", 0),
        ];
        let patterns = analyze(&slices, &[]);
        let temporal = patterns
            .iter()
            .find(|p| p.data.kind() == "temporal_clustering")
            .unwrap();
        match &temporal.data {
            PatternData::TemporalClustering {
                span_hours,
                mean_gap_hours,
                memory_count,
            } => {
                assert_eq!(*memory_count, 2);
                assert!((span_hours - 10.0).abs() < 0.1);
                assert!((mean_gap_hours - 10.0).abs() < 0.1);
            }
            other => panic!("unexpected pattern: {other:?}"),
        }
    }

    #[test]
    fn relevance_distribution_counts_high_scores() {
        let mut high = slice("a", MemoryType::Episodic, "high", 0);
        high.relevance_score = 0.9;
        let low = slice("b", MemoryType::Episodic, "low", 0);
        let patterns = analyze(&[high, low], &[]);
        let relevance = patterns
            .iter()
            .find(|p| p.data.kind() == "relevance_distribution")
            .unwrap();
        match &relevance.data {
            PatternData::RelevanceDistribution {
                mean_relevance,
                high_relevance_count,
                total_memories,
            } => {
                assert!((mean_relevance - 0.7).abs() < 1e-12);
                assert_eq!(*high_relevance_count, 1);
                assert_eq!(*total_memories, 2);
            }
            other => panic!("unexpected pattern: {other:?}"),
        }
    }
}
