//! Greedy multi-objective re-ranking.
//!
//! Selects a final top-K list balancing three signals with caller-supplied
//! linear weights:
//!
//! | Objective | Signal | Sign |
//! |-----------|--------|------|
//! | Relevance | calibrated model score | + |
//! | Diversity | max cosine to already-selected items | − |
//! | Retention | long-term engagement estimate | + |
//!
//! The algorithm is myopic greedy selection, maximal-marginal-relevance
//! style: `min(top_k, N)` sequential picks, each scanning every remaining
//! candidate, each diversity penalty scanning every selected item —
//! O(top_k² × N) similarity work in the worst case. The trade-off (simple,
//! incrementally explainable selections; non-optimal final set) is the
//! central design decision of this module.
//!
//! Two details are semantically load-bearing and must not drift:
//!
//! - Ties resolve by strict `>`: the first remaining candidate (in original
//!   candidate order) to reach the best score wins. A `>=` comparison
//!   changes which item wins ties.
//! - Selected items leave the remaining pool and are never reconsidered.
//!
//! # Example
//!
//! ```rust
//! use rank_serve::embedding::ItemEmbeddings;
//! use rank_serve::rerank::{rerank, ObjectiveWeights};
//! use std::collections::HashMap;
//!
//! let mut items = ItemEmbeddings::new();
//! items.insert(1, vec![1.0, 0.0]).unwrap();
//! items.insert(2, vec![0.95, 0.05]).unwrap();
//! items.insert(3, vec![0.0, 1.0]).unwrap();
//!
//! let relevance: HashMap<u64, f32> = [(1, 0.9), (2, 0.85), (3, 0.6)].into();
//! let weights = ObjectiveWeights::new(1.0, 0.5, 0.0);
//!
//! let ranked = rerank(&[1, 2, 3], &relevance, &items, &HashMap::new(), &weights, 2).unwrap();
//! assert_eq!(ranked, vec![1, 3]); // 3 beats near-duplicate 2 on diversity
//! ```

use crate::embedding::ItemEmbeddings;
use crate::{similarity, ItemId, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Linear coefficients for the three objectives.
///
/// Used raw: no normalization, any sign or magnitude is legal.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ObjectiveWeights {
    /// Coefficient on calibrated relevance.
    pub relevance: f32,
    /// Coefficient on the diversity penalty (subtracted).
    pub diversity: f32,
    /// Coefficient on the retention estimate.
    pub retention: f32,
}

impl ObjectiveWeights {
    /// Create weights from the three coefficients.
    #[must_use]
    pub const fn new(relevance: f32, diversity: f32, retention: f32) -> Self {
        Self {
            relevance,
            diversity,
            retention,
        }
    }

    /// Combine the three signals into one scalar:
    /// `relevance·rel − diversity·penalty + retention·ret`.
    #[inline]
    #[must_use]
    pub fn combine(&self, rel: f32, penalty: f32, ret: f32) -> f32 {
        self.relevance * rel - self.diversity * penalty + self.retention * ret
    }
}

impl Default for ObjectiveWeights {
    /// Relevance-dominant defaults matching the offline tuning baseline.
    fn default() -> Self {
        Self::new(1.0, 0.3, 0.2)
    }
}

/// Redundancy of a candidate with respect to the already-selected list.
///
/// 0.0 when nothing is selected yet, otherwise the maximum cosine
/// similarity between the candidate and any selected embedding. Symmetric
/// in each pairwise comparison (cosine is commutative).
#[must_use]
pub fn diversity_penalty(candidate: &[f32], selected: &[&[f32]]) -> f32 {
    if selected.is_empty() {
        return 0.0;
    }
    // True maximum, not clamped: an anti-correlated selection yields a
    // negative "penalty" that the combined score rewards.
    selected
        .iter()
        .map(|s| similarity::cosine(candidate, s))
        .fold(f32::NEG_INFINITY, f32::max)
}

/// Greedily select up to `top_k` candidates by combined objective score.
///
/// Returns exactly `min(top_k, candidate_ids.len())` items. Missing
/// relevance or retention entries default to 0.0; a missing *embedding* is
/// a contract violation upstream and fails the request.
///
/// # Errors
///
/// [`crate::RankError::MissingEmbedding`] if any candidate has no entry in
/// `items`.
pub fn rerank(
    candidate_ids: &[ItemId],
    relevance: &HashMap<ItemId, f32>,
    items: &ItemEmbeddings,
    retention: &HashMap<ItemId, f32>,
    weights: &ObjectiveWeights,
    top_k: usize,
) -> Result<Vec<ItemId>> {
    // Resolve every embedding up front so a hole in the table fails the
    // request before any selection happens.
    let embeddings: Vec<&[f32]> = candidate_ids
        .iter()
        .map(|&id| items.require(id))
        .collect::<Result<_>>()?;

    let n = candidate_ids.len();
    let rounds = top_k.min(n);
    let mut selected: Vec<ItemId> = Vec::with_capacity(rounds);
    let mut selected_embeddings: Vec<&[f32]> = Vec::with_capacity(rounds);
    // Indices into candidate_ids, kept in candidate order so the strict `>`
    // scan always encounters ties in a deterministic order. Removal below
    // must preserve that order (no swap_remove).
    let mut remaining: Vec<usize> = (0..n).collect();

    for _ in 0..rounds {
        let mut best_pos = 0;
        let mut best_score = f32::NEG_INFINITY;

        for (pos, &idx) in remaining.iter().enumerate() {
            let id = candidate_ids[idx];
            let rel = relevance.get(&id).copied().unwrap_or(0.0);
            let ret = retention.get(&id).copied().unwrap_or(0.0);
            let penalty = diversity_penalty(embeddings[idx], &selected_embeddings);

            let score = weights.combine(rel, penalty, ret);
            if score > best_score {
                best_score = score;
                best_pos = pos;
            }
        }

        let chosen = remaining.remove(best_pos);
        selected.push(candidate_ids[chosen]);
        selected_embeddings.push(embeddings[chosen]);
    }

    Ok(selected)
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
