//! Item embedding table.
//!
//! [`ItemEmbeddings`] is an insertion-ordered id → vector table with one
//! enforced geometric invariant: every vector shares the dimensionality of
//! the first insert. Insertion order is load-bearing — the recall scan
//! breaks score ties by original item index, so iteration must be
//! deterministic and must follow load order, not hash order.

use crate::{ItemId, RankError, Result};
use std::collections::HashMap;

/// Insertion-ordered collection of item embeddings with uniform dimension.
///
/// # Invariants
///
/// - All vectors have identical length (fixed by the first insert).
/// - Identifiers are unique keys; re-inserting an id is rejected.
/// - `iter()` yields items in insertion order.
#[derive(Debug, Clone, Default)]
pub struct ItemEmbeddings {
    ids: Vec<ItemId>,
    vectors: Vec<Vec<f32>>,
    index: HashMap<ItemId, usize>,
}

impl ItemEmbeddings {
    /// Create an empty table. Dimension is fixed by the first insert.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert an item's embedding.
    ///
    /// # Errors
    ///
    /// - [`RankError::DimensionMismatch`] if the vector's length differs
    ///   from the table's established dimension.
    /// - [`RankError::Dataset`] if `id` is already present.
    pub fn insert(&mut self, id: ItemId, vector: Vec<f32>) -> Result<()> {
        if let Some(first) = self.vectors.first() {
            if vector.len() != first.len() {
                return Err(RankError::DimensionMismatch {
                    expected: first.len(),
                    got: vector.len(),
                });
            }
        }
        if self.index.contains_key(&id) {
            return Err(RankError::Dataset(format!("duplicate item id {id}")));
        }
        self.index.insert(id, self.ids.len());
        self.ids.push(id);
        self.vectors.push(vector);
        Ok(())
    }

    /// Look up an item's embedding.
    #[inline]
    #[must_use]
    pub fn get(&self, id: ItemId) -> Option<&[f32]> {
        self.index.get(&id).map(|&i| self.vectors[i].as_slice())
    }

    /// Embedding for `id`, or [`RankError::MissingEmbedding`].
    ///
    /// Used where an absent embedding is a contract violation (the rerank
    /// diversity computation), not a sparse-data case.
    pub fn require(&self, id: ItemId) -> Result<&[f32]> {
        self.get(id).ok_or(RankError::MissingEmbedding(id))
    }

    /// Number of items in the table.
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.ids.len()
    }

    /// Whether the table is empty.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    /// Vector dimensionality, or `None` for an empty table.
    #[inline]
    #[must_use]
    pub fn dim(&self) -> Option<usize> {
        self.vectors.first().map(Vec::len)
    }

    /// Iterate `(id, embedding)` pairs in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (ItemId, &[f32])> {
        self.ids
            .iter()
            .zip(&self.vectors)
            .map(|(&id, v)| (id, v.as_slice()))
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
