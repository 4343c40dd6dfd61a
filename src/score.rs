//! Substring-occurrence fallback scorer.
//!
//! Used for corpora without an index (the session-history log) and as the
//! backstop when the memory index returns nothing. The score rewards a
//! match that is frequent, early, and found in a short text:
//!
//! ```text
//! score = base + occurrences × per_occurrence + early_bonus − len × length_penalty
//! early_bonus = max(0, early − first_index / early_decay)
//! ```
//!
//! A text that does not contain the query scores exactly `0.0`.

/// Tunable constants of [`fallback_score_with`].
#[derive(Debug, Clone, Copy)]
pub struct FallbackWeights {
    pub base: f64,
    pub per_occurrence: f64,
    pub early: f64,
    /// Characters of distance that cost one point of early bonus.
    pub early_decay: f64,
    pub length_penalty: f64,
}

impl Default for FallbackWeights {
    fn default() -> Self {
        Self {
            base: 10.0,
            per_occurrence: 2.0,
            early: 5.0,
            early_decay: 10.0,
            length_penalty: 0.02,
        }
    }
}

/// Score `text` against `query` with the default weights.
pub fn fallback_score(text: &str, query: &str) -> f64 {
    fallback_score_with(text, query, &FallbackWeights::default())
}

pub fn fallback_score_with(text: &str, query: &str, weights: &FallbackWeights) -> f64 {
    let haystack = text.to_lowercase();
    let needle = query.to_lowercase();
    if needle.is_empty() {
        return 0.0;
    }

    let Some(first_byte) = haystack.find(&needle) else {
        return 0.0;
    };
    let first_index = haystack[..first_byte].chars().count() as f64;
    let occurrences = haystack.matches(needle.as_str()).count() as f64;

    let early_bonus = (weights.early - first_index / weights.early_decay).max(0.0);
    let length_penalty = text.chars().count() as f64 * weights.length_penalty;

    weights.base + occurrences * weights.per_occurrence + early_bonus - length_penalty
}
