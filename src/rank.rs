//! Unified relevance scores and the cross-corpus ranked merge.

use std::cmp::Ordering;

use crate::models::SearchHit;

/// Where a relevance value came from.
///
/// FTS5's `bm25()` is lower-is-better (and negative); the fallback heuristic
/// is higher-is-better. [`Relevance::score`] is the only place the two
/// conventions are reconciled.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Relevance {
    /// Raw `bm25()` rank from the full-text index.
    Bm25Rank(f64),
    /// Score from [`crate::score::fallback_score`].
    Heuristic(f64),
}

impl Relevance {
    /// Higher-is-better score used by the merge.
    pub fn score(self) -> f64 {
        match self {
            Relevance::Bm25Rank(rank) => -rank,
            Relevance::Heuristic(score) => score,
        }
    }
}

/// Order by score desc, then timestamp desc, then id asc.
pub fn compare_hits(a: &SearchHit, b: &SearchHit) -> Ordering {
    b.score
        .total_cmp(&a.score)
        .then(b.timestamp.cmp(&a.timestamp))
        .then(a.id.cmp(&b.id))
}

/// Concatenate result lists, sort them with [`compare_hits`], keep `limit`.
pub fn merge_ranked<I>(lists: I, limit: usize) -> Vec<SearchHit>
where
    I: IntoIterator<Item = Vec<SearchHit>>,
{
    let mut merged: Vec<SearchHit> = lists.into_iter().flatten().collect();
    merged.sort_by(compare_hits);
    merged.truncate(limit);
    merged
}
