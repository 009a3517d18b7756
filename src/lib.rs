//! # rank-serve
//!
//! Serving-time decision core for a multi-stage recommendation pipeline.
//!
//! ## Modules
//!
//! | Module | Purpose | Notes |
//! |--------|---------|-------|
//! | [`recall`] | Merge embedding + heuristic candidate sources | Ordered, deduplicated |
//! | [`scorer`] | Feature join + opaque model + calibration | Trait-based, BYOM |
//! | [`calibrate`] | Isotonic calibrator artifact | JSON, boundary-clipped interp |
//! | [`rerank`] | Greedy multi-objective selection | Relevance/diversity/retention |
//! | [`service`] | Orchestration under a latency budget | Budget is advisory |
//! | [`ope`] | IPS / SNIPS off-policy evaluation | Gates policy rollout |
//! | [`pipeline`] | Ship / no-ship decision | Thin glue over `ope` |
//!
//! ## Pipeline
//!
//! ```text
//! context + embeddings → Recall → candidates → Score → relevance → Rerank → top-K
//!                                                                      ▲
//!                                  logged events → IPS/SNIPS ──────────┘
//!                                                  (gates which weights ship)
//! ```
//!
//! One `rank` call runs recall, scoring, and reranking strictly in sequence;
//! every per-request structure lives and dies inside that call. The trained
//! model and calibrator are loaded once at service construction and shared
//! read-only across requests.
//!
//! ## Quick Example
//!
//! ```rust
//! use rank_serve::embedding::ItemEmbeddings;
//! use rank_serve::rerank::{rerank, ObjectiveWeights};
//! use std::collections::HashMap;
//!
//! let mut items = ItemEmbeddings::new();
//! items.insert(1, vec![1.0, 0.0]).unwrap();
//! items.insert(2, vec![0.0, 1.0]).unwrap();
//!
//! let relevance: HashMap<u64, f32> = [(1, 0.9), (2, 0.7)].into();
//! let retention: HashMap<u64, f32> = HashMap::new();
//! let weights = ObjectiveWeights::new(1.0, 0.3, 0.2);
//!
//! let ranked = rerank(&[1, 2], &relevance, &items, &retention, &weights, 2).unwrap();
//! assert_eq!(ranked[0], 1);
//! ```

pub mod calibrate;
pub mod embedding;
pub mod ope;
pub mod pipeline;
pub mod recall;
pub mod rerank;
pub mod scorer;
pub mod service;
pub mod similarity;

use std::path::PathBuf;

/// Item identifier used throughout the pipeline.
///
/// Candidate sets, relevance maps, and logged actions all key on this.
pub type ItemId = u64;

/// Errors surfaced by the decision core.
///
/// Fatal variants abort the request (or construction); sparse-data cases
/// such as missing popularity or retention entries are *not* errors — they
/// default to 0.0 at the lookup site, by contract.
#[derive(Debug, thiserror::Error)]
pub enum RankError {
    /// A required model or calibrator artifact does not exist on disk.
    /// The service cannot be constructed without it.
    #[error("missing artifact: {}", path.display())]
    MissingArtifact { path: PathBuf },

    /// The calibrator table failed validation.
    #[error("invalid calibrator: {reason}")]
    InvalidCalibrator { reason: String },

    /// The feature frame handed to the scoring model does not match the
    /// schema the model was trained on. Never recovered — substituting
    /// features would silently corrupt relevance scores.
    #[error("feature schema mismatch: expected {expected:?}, got {got:?}")]
    SchemaMismatch {
        expected: Vec<String>,
        got: Vec<String>,
    },

    /// The model returned a different number of scores than feature rows.
    #[error("model returned {got} scores for {expected} rows")]
    ScoreCountMismatch { expected: usize, got: usize },

    /// A candidate lacked an embedding during re-ranking. Diversity cannot
    /// be computed without it, so the request fails rather than defaulting.
    #[error("no embedding for candidate item {0}")]
    MissingEmbedding(ItemId),

    /// An embedding's dimensionality disagrees with the table it joins.
    #[error("embedding dimension mismatch: expected {expected}, got {got}")]
    DimensionMismatch { expected: usize, got: usize },

    /// The logged-events table is missing a required column or a value
    /// failed to parse.
    #[error("logged dataset error: {0}")]
    Dataset(String),

    #[error(transparent)]
    Csv(#[from] csv::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Crate-wide result alias.
pub type Result<T> = std::result::Result<T, RankError>;
