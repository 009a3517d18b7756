//! Relevance scoring: feature join, opaque model, calibration.
//!
//! The scoring backend is a black box behind [`RelevanceModel`] — implement
//! it for your inference stack (GBDT runtime, ONNX session, remote scorer).
//! The core only relies on two contracts:
//!
//! 1. **Model**: given a feature frame with a fixed column schema, return
//!    one raw score per row, same order as input.
//! 2. **Calibrator**: monotone mapping from raw to calibrated scores
//!    (see [`crate::calibrate`]).
//!
//! The feature schema must match what the model was trained on exactly.
//! That is a hard external contract: this module builds the frame it
//! promises ([`FEATURE_SCHEMA`]) and a model that disagrees must reject it
//! with [`RankError::SchemaMismatch`] rather than score it.
//!
//! ```rust
//! use rank_serve::scorer::{FeatureFrame, RelevanceModel};
//!
//! struct PopularityModel;
//!
//! impl RelevanceModel for PopularityModel {
//!     fn score_batch(&self, features: &FeatureFrame) -> rank_serve::Result<Vec<f32>> {
//!         features.expect_schema(&["item_popularity", "user_activity"])?;
//!         Ok(features.rows().iter().map(|row| row[0]).collect())
//!     }
//! }
//! ```

use crate::calibrate::IsotonicCalibrator;
use crate::{ItemId, RankError, Result};
use std::collections::HashMap;

/// Columns this crate's feature join produces, in order.
///
/// Versioned together with the trained model artifact; changing it means
/// retraining.
pub const FEATURE_SCHEMA: [&str; 2] = ["item_popularity", "user_activity"];

/// Per-request user context, read-only input to one ranking call.
#[derive(Debug, Clone, Default)]
pub struct UserContext {
    /// Items the user recently interacted with, most recent first.
    pub recent_items: Vec<ItemId>,
    /// Globally trending items.
    pub trending_items: Vec<ItemId>,
    /// Items from followed sources.
    pub follow_items: Vec<ItemId>,
    /// Aggregate activity level of this user.
    pub user_activity: f32,
    /// Sparse popularity signal; absent items read as 0.0.
    pub item_popularity: HashMap<ItemId, f32>,
}

impl UserContext {
    /// Popularity for `id`, defaulting to 0.0 for unknown items.
    ///
    /// The default is part of the feature contract (sparse popularity is an
    /// expected data condition, not an error).
    #[inline]
    #[must_use]
    pub fn popularity(&self, id: ItemId) -> f32 {
        self.item_popularity.get(&id).copied().unwrap_or(0.0)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Feature frame
// ─────────────────────────────────────────────────────────────────────────────

/// A row-major feature table with named columns.
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureFrame {
    columns: Vec<String>,
    rows: Vec<Vec<f32>>,
}

impl FeatureFrame {
    /// Build a frame. Each row must have one value per column.
    #[must_use]
    pub fn new(columns: Vec<String>, rows: Vec<Vec<f32>>) -> Self {
        debug_assert!(rows.iter().all(|r| r.len() == columns.len()));
        Self { columns, rows }
    }

    /// Column names, in order.
    #[must_use]
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    /// Feature rows, one per candidate.
    #[must_use]
    pub fn rows(&self) -> &[Vec<f32>] {
        &self.rows
    }

    /// Number of rows.
    #[must_use]
    pub fn n_rows(&self) -> usize {
        self.rows.len()
    }

    /// Verify the frame's columns against the schema a model expects.
    ///
    /// # Errors
    ///
    /// [`RankError::SchemaMismatch`] on any difference in names or order.
    pub fn expect_schema(&self, expected: &[&str]) -> Result<()> {
        if self.columns.len() != expected.len()
            || self.columns.iter().zip(expected).any(|(a, b)| a != b)
        {
            return Err(RankError::SchemaMismatch {
                expected: expected.iter().map(ToString::to_string).collect(),
                got: self.columns.clone(),
            });
        }
        Ok(())
    }
}

/// Opaque trained scoring model.
///
/// Implementations return one raw score per feature row, in row order, and
/// fail with [`RankError::SchemaMismatch`] when handed a frame they were
/// not trained on.
pub trait RelevanceModel {
    /// Score a batch of feature rows.
    fn score_batch(&self, features: &FeatureFrame) -> Result<Vec<f32>>;
}

/// Calibrated relevance per candidate.
///
/// Valid only for the candidate set that produced it; never reuse across
/// requests or candidate sets.
pub type RelevanceMap = HashMap<ItemId, f32>;

// ─────────────────────────────────────────────────────────────────────────────
// Feature join + scoring
// ─────────────────────────────────────────────────────────────────────────────

/// Join candidates against the user context into a [`FEATURE_SCHEMA`] frame.
#[must_use]
pub fn build_features(candidates: &[ItemId], ctx: &UserContext) -> FeatureFrame {
    let rows = candidates
        .iter()
        .map(|&id| vec![ctx.popularity(id), ctx.user_activity])
        .collect();
    FeatureFrame::new(FEATURE_SCHEMA.iter().map(ToString::to_string).collect(), rows)
}

/// Score candidates with the model, then calibrate.
///
/// The returned map covers exactly the input candidate set — no more, no
/// fewer entries.
///
/// # Errors
///
/// Propagates model failures ([`RankError::SchemaMismatch`]) and rejects a
/// model that returns the wrong number of scores.
pub fn score_candidates<M: RelevanceModel>(
    model: &M,
    calibrator: &IsotonicCalibrator,
    candidates: &[ItemId],
    ctx: &UserContext,
) -> Result<RelevanceMap> {
    let features = build_features(candidates, ctx);
    let raw = model.score_batch(&features)?;
    if raw.len() != candidates.len() {
        return Err(RankError::ScoreCountMismatch {
            expected: candidates.len(),
            got: raw.len(),
        });
    }

    let calibrated = calibrator.calibrate_batch(&raw);
    Ok(candidates.iter().copied().zip(calibrated).collect())
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
