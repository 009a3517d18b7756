//! Candidate generation (recall).
//!
//! Combines two sub-sources into one ordered, deduplicated candidate list:
//!
//! | Source | Mechanism | Covers |
//! |--------|-----------|--------|
//! | Embedding | Dot-product similarity top-K | Personalized long tail |
//! | Heuristic | recent → trending → follow | Coverage, cold start |
//!
//! The embedding scan here is a full scan. It is behaviorally equivalent
//! to — and substitutable by — an ANN index: callers may only rely on
//! "returns the top-K by similarity, deterministically for fixed inputs",
//! never on exhaustiveness.
//!
//! Output ordering is significant for tie-breaking downstream (first-seen
//! source wins) but is *not* a relevance ranking; scores do not survive
//! the merge.
//!
//! # Example
//!
//! ```rust
//! use rank_serve::embedding::ItemEmbeddings;
//! use rank_serve::recall::generate_candidates;
//!
//! let mut items = ItemEmbeddings::new();
//! items.insert(1, vec![1.0, 0.0]).unwrap();
//! items.insert(2, vec![0.0, 1.0]).unwrap();
//!
//! let candidates = generate_candidates(&[1.0, 0.0], &items, &[2], &[], &[], 1, 10);
//! assert_eq!(candidates, vec![1, 2]);
//! ```

use crate::embedding::ItemEmbeddings;
use crate::{similarity, ItemId};
use std::collections::HashSet;

// ─────────────────────────────────────────────────────────────────────────────
// Embedding recall
// ─────────────────────────────────────────────────────────────────────────────

/// Top-`top_k` items by dot-product similarity to the user embedding.
///
/// Equal scores resolve to the lower original item index (the sort is
/// stable over insertion order). An empty table returns an empty list.
#[must_use]
pub fn embedding_recall(
    user_embedding: &[f32],
    items: &ItemEmbeddings,
    top_k: usize,
) -> Vec<ItemId> {
    let mut scored: Vec<(ItemId, f32)> = items
        .iter()
        .map(|(id, emb)| (id, similarity::dot(emb, user_embedding)))
        .collect();

    // sort_by is stable: ties keep insertion order.
    scored.sort_by(|a, b| b.1.total_cmp(&a.1));
    scored.truncate(top_k);
    scored.into_iter().map(|(id, _)| id).collect()
}

// ─────────────────────────────────────────────────────────────────────────────
// Heuristic recall
// ─────────────────────────────────────────────────────────────────────────────

/// Rule-based recall: recent, then trending, then follow.
///
/// Fixed precedence order, first occurrence wins across lists, truncated
/// to `max_items`.
#[must_use]
pub fn heuristic_recall(
    recent: &[ItemId],
    trending: &[ItemId],
    follow: &[ItemId],
    max_items: usize,
) -> Vec<ItemId> {
    let mut seen = HashSet::new();
    let mut deduped = Vec::new();

    for &id in recent.iter().chain(trending).chain(follow) {
        if seen.insert(id) {
            deduped.push(id);
        }
    }

    deduped.truncate(max_items);
    deduped
}

// ─────────────────────────────────────────────────────────────────────────────
// Merge
// ─────────────────────────────────────────────────────────────────────────────

/// Merge embedding and heuristic recall into one candidate set.
///
/// Embedding output is concatenated first, so it wins on conflict.
/// The result contains no duplicates and carries no scores.
#[must_use]
pub fn generate_candidates(
    user_embedding: &[f32],
    items: &ItemEmbeddings,
    recent: &[ItemId],
    trending: &[ItemId],
    follow: &[ItemId],
    embedding_k: usize,
    heuristic_k: usize,
) -> Vec<ItemId> {
    let emb = embedding_recall(user_embedding, items, embedding_k);
    let heuristic = heuristic_recall(recent, trending, follow, heuristic_k);

    let mut seen = HashSet::new();
    let mut merged = Vec::with_capacity(emb.len() + heuristic.len());

    for id in emb.into_iter().chain(heuristic) {
        if seen.insert(id) {
            merged.push(id);
        }
    }

    merged
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────


#[cfg(test)]
mod proptests {
    use super::*;
    use proptest::prelude::*;

    fn arb_ids() -> impl Strategy<Value = Vec<ItemId>> {
        proptest::collection::vec(0u64..30, 0..12)
    }

    proptest! {
        /// Output of the merge contains no duplicate ids
        #[test]
        fn no_duplicates(
            recent in arb_ids(),
            trending in arb_ids(),
            follow in arb_ids(),
            n_items in 0usize..15,
            emb_k in 0usize..20,
            heur_k in 0usize..20,
        ) {
            let mut items = ItemEmbeddings::new();
            for i in 0..n_items as u64 {
                items.insert(100 + i, vec![(i as f32 * 0.37).sin(), (i as f32 * 0.11).cos()]).unwrap();
            }
            let out = generate_candidates(
                &[0.6, -0.4], &items, &recent, &trending, &follow, emb_k, heur_k,
            );
            let mut seen = std::collections::HashSet::new();
            for id in &out {
                prop_assert!(seen.insert(*id), "duplicate id {}", id);
            }
        }

        /// Every candidate comes from a source list or the embedding table
        #[test]
        fn provenance(
            recent in arb_ids(),
            trending in arb_ids(),
            follow in arb_ids(),
            n_items in 0usize..10,
        ) {
            let mut items = ItemEmbeddings::new();
            for i in 0..n_items as u64 {
                items.insert(i, vec![i as f32, 1.0]).unwrap();
            }
            let out = generate_candidates(&[1.0, 0.0], &items, &recent, &trending, &follow, 5, 5);
            for id in &out {
                let known = items.get(*id).is_some()
                    || recent.contains(id)
                    || trending.contains(id)
                    || follow.contains(id);
                prop_assert!(known, "candidate {} from nowhere", id);
            }
        }

        /// Heuristic recall output is bounded by max_items
        #[test]
        fn heuristic_bounded(
            recent in arb_ids(),
            trending in arb_ids(),
            follow in arb_ids(),
            max in 0usize..10,
        ) {
            let out = heuristic_recall(&recent, &trending, &follow, max);
            prop_assert!(out.len() <= max);
        }

        /// Embedding recall output is bounded by min(top_k, table size)
        #[test]
        fn embedding_bounded(n_items in 0usize..12, top_k in 0usize..20) {
            let mut items = ItemEmbeddings::new();
            for i in 0..n_items as u64 {
                items.insert(i, vec![(i as f32).cos()]).unwrap();
            }
            let out = embedding_recall(&[1.0], &items, top_k);
            prop_assert_eq!(out.len(), top_k.min(n_items));
        }
    }
}
