//! Lexical similarity scoring.
//!
//! No learned embeddings here: similarity is Jaccard overlap over keyword
//! sets and over raw word sets, blended with a configurable keyword weight.

use std::collections::HashSet;

use keepsake_index::word_set;

/// |a ∩ b| / max(|a ∪ b|, 1).
pub fn jaccard(a: &HashSet<String>, b: &HashSet<String>) -> f64 {
    let intersection = a.intersection(b).count();
    let union = a.union(b).count();
    intersection as f64 / union.max(1) as f64
}

/// Overlap of two keyword lists, as sets.
pub fn keyword_similarity(query_keywords: &[String], slice_keywords: &[String]) -> f64 {
    let a: HashSet<String> = query_keywords.iter().cloned().collect();
    let b: HashSet<String> = slice_keywords.iter().cloned().collect();
    jaccard(&a, &b)
}

/// Overlap of the qualifying words of two texts.
pub fn word_similarity(query: &str, content: &str) -> f64 {
    jaccard(&word_set(query), &word_set(content))
}

/// Blend keyword and word similarity: (kw × boost + word) / (boost + 1).
pub fn combined_similarity(keyword_sim: f64, word_sim: f64, keyword_boost: f64) -> f64 {
    (keyword_sim * keyword_boost + word_sim) / (keyword_boost + 1.0)
}
