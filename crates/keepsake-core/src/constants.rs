//! ─── Keepsake tuning constants ──────────────────────────────────────────────
//!
//! Encryption layout, cache behavior, retrieval scoring weights, and
//! maintenance-sweep thresholds. Values match the defaults the rest of the
//! workspace assumes; per-instance overrides go through `VaultConfig`.

// ── Encryption ───────────────────────────────────────────────────────────────

/// AEAD key length in bytes (ChaCha20-Poly1305, 256-bit).
pub const KEY_LEN: usize = 32;

/// Nonce length in bytes (96-bit), prepended to every ciphertext.
pub const NONCE_LEN: usize = 12;

/// Schema version stamped on new records and the vault file.
pub const SCHEMA_VERSION: &str = "1.0.0";

// ── Cache ────────────────────────────────────────────────────────────────────

/// Read-through cache entry lifetime (seconds).
pub const CACHE_TTL_SECS: u64 = 300;

// ── Retrieval ────────────────────────────────────────────────────────────────

/// Default maximum number of slices returned per retrieval.
pub const DEFAULT_MAX_RESULTS: usize = 10;

/// Default minimum boosted similarity for a slice to be returned.
pub const DEFAULT_MIN_SIMILARITY: f64 = 0.3;

/// Weight of keyword similarity relative to raw word overlap.
pub const DEFAULT_KEYWORD_BOOST: f64 = 1.5;

/// Multiplier applied when a slice also matched the full-text index.
pub const FTS_MATCH_BOOST: f64 = 1.2;

/// Relevance score assigned to a freshly stored slice.
pub const INITIAL_RELEVANCE: f64 = 0.5;

// ── Keyword extraction ───────────────────────────────────────────────────────

/// Maximum number of keywords extracted from a text.
pub const MAX_KEYWORDS: usize = 10;

/// Minimum token length considered a word.
pub const MIN_TOKEN_LEN: usize = 3;

// ── Maintenance sweep ────────────────────────────────────────────────────────

/// Reasoning chains older than this many days are deleted by the sweep.
pub const CHAIN_RETENTION_DAYS: i64 = 30;

/// Slices untouched for this many days become candidates for deletion or
/// score decay.
pub const SLICE_IDLE_DAYS: i64 = 7;

/// Slices below this relevance score (and idle, and never retrieved) are
/// deleted by the sweep.
pub const SLICE_PRUNE_SCORE: f64 = 0.2;

/// Score bump for heavily retrieved slices (retrieval_count > 10).
pub const SCORE_BUMP_HOT: f64 = 0.1;

/// Score bump for moderately retrieved slices (retrieval_count > 5).
pub const SCORE_BUMP_WARM: f64 = 0.05;

/// Score decay for idle, never-retrieved slices.
pub const SCORE_DECAY_IDLE: f64 = 0.05;

/// Floor applied when decaying an idle slice's score.
pub const SCORE_DECAY_FLOOR: f64 = 0.2;
