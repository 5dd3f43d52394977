//! Deterministic text processing shared by the full-text index and the
//! retrieval engine: tokenization, stopword filtering, and keyword
//! extraction. Stable across runs for identical input.

use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::{HashMap, HashSet};

use keepsake_core::constants::MAX_KEYWORDS;

/// Maximal runs of ASCII letters, at least three long.
static WORD_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\b[a-zA-Z]{3,}\b").expect("valid regex"));

/// Common English function words dropped during keyword extraction.
static STOPWORDS: Lazy<HashSet<&'static str>> = Lazy::new(|| {
    [
        "the", "a", "an", "and", "or", "but", "in", "on", "at", "to", "for", "of", "with",
        "by", "is", "are", "was", "were", "be", "been", "being", "have", "has", "had",
        "do", "does", "did", "will", "would", "could", "should", "may", "might", "can",
        "i", "you", "he", "she", "it", "we", "they", "me", "him", "her", "us", "them",
        "my", "your", "his", "its", "our", "their", "this", "that", "these", "those",
    ]
    .into_iter()
    .collect()
});

/// All qualifying tokens of `text`, lowercased, in order of appearance.
pub fn tokenize(text: &str) -> Vec<String> {
    let lowered = text.to_lowercase();
    WORD_RE
        .find_iter(&lowered)
        .map(|m| m.as_str().to_string())
        .collect()
}

/// The distinct qualifying tokens of `text`, for set-overlap similarity.
pub fn word_set(text: &str) -> HashSet<String> {
    tokenize(text).into_iter().collect()
}

/// Extract up to ten keywords: tokenize, drop stopwords, rank by descending
/// frequency with ties broken by first appearance.
pub fn extract_keywords(text: &str) -> Vec<String> {
    let mut stats: HashMap<String, (usize, usize)> = HashMap::new();
    for (position, token) in tokenize(text).into_iter().enumerate() {
        if STOPWORDS.contains(token.as_str()) {
            continue;
        }
        let entry = stats.entry(token).or_insert((0, position));
        entry.0 += 1;
    }

    let mut ranked: Vec<(String, usize, usize)> = stats
        .into_iter()
        .map(|(token, (count, first))| (token, count, first))
        .collect();
    ranked.sort_by(|a, b| b.1.cmp(&a.1).then(a.2.cmp(&b.2)));
    ranked
        .into_iter()
        .take(MAX_KEYWORDS)
        .map(|(token, _, _)| token)
        .collect()
}
