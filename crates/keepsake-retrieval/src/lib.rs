pub mod engine;
pub mod similarity;

pub use engine::{derive_id, RetrievalEngine, RetrievalOptions};
pub use similarity::{combined_similarity, jaccard, keyword_similarity, word_similarity};
