//! Online ranking service.
//!
//! Orchestrates one synchronous request through the three stages in strict
//! sequence — each stage needs the previous stage's complete output:
//!
//! ```text
//! rank() ─▶ recall ─▶ score (join + model + calibrate) ─▶ rerank ─▶ top-K
//! ```
//!
//! The whole call is measured against a wall-clock latency budget. The
//! budget is observability, not enforcement: an over-budget request logs a
//! `tracing::warn!` and still returns its result. Nothing here cancels,
//! retries, or degrades.
//!
//! The model and calibrator are loaded before the service exists and are
//! never mutated afterwards, so a service behind an `Arc` serves concurrent
//! requests without locking; every per-request structure is created and
//! dropped inside `rank`.

use crate::calibrate::IsotonicCalibrator;
use crate::embedding::ItemEmbeddings;
use crate::rerank::ObjectiveWeights;
use crate::scorer::{score_candidates, RelevanceModel, UserContext};
use crate::{recall, rerank, ItemId, Result};
use std::collections::HashMap;
use std::path::Path;
use std::time::{Duration, Instant};

// ─────────────────────────────────────────────────────────────────────────────
// Configuration
// ─────────────────────────────────────────────────────────────────────────────

/// Service tuning knobs.
#[derive(Debug, Clone, Copy)]
pub struct ServiceConfig {
    /// Advisory wall-clock budget for one `rank` call.
    pub latency_budget: Duration,
    /// Depth of the embedding recall source.
    pub embedding_k: usize,
    /// Depth of the heuristic recall source.
    pub heuristic_k: usize,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            latency_budget: Duration::from_millis(60),
            embedding_k: 200,
            heuristic_k: 100,
        }
    }
}

impl ServiceConfig {
    /// Set the advisory latency budget.
    #[must_use]
    pub const fn with_latency_budget(mut self, budget: Duration) -> Self {
        self.latency_budget = budget;
        self
    }

    /// Set the embedding recall depth.
    #[must_use]
    pub const fn with_embedding_k(mut self, k: usize) -> Self {
        self.embedding_k = k;
        self
    }

    /// Set the heuristic recall depth.
    #[must_use]
    pub const fn with_heuristic_k(mut self, k: usize) -> Self {
        self.heuristic_k = k;
        self
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Service
// ─────────────────────────────────────────────────────────────────────────────

/// The serving-time decision path: recall → score → rerank.
///
/// Holds the process-wide read-only state (model, calibrator). Construction
/// fails fatally if an artifact cannot be loaded; there is no request-level
/// fallback for a missing model.
#[derive(Debug)]
pub struct RankingService<M> {
    model: M,
    calibrator: IsotonicCalibrator,
    config: ServiceConfig,
}

impl<M: RelevanceModel> RankingService<M> {
    /// Build a service from an already-loaded model and calibrator.
    #[must_use]
    pub fn new(model: M, calibrator: IsotonicCalibrator) -> Self {
        Self {
            model,
            calibrator,
            config: ServiceConfig::default(),
        }
    }

    /// Build a service, loading the calibrator from its JSON artifact.
    ///
    /// # Errors
    ///
    /// [`crate::RankError::MissingArtifact`] if the artifact is absent —
    /// the service cannot start without it.
    pub fn with_calibrator_artifact(model: M, calibrator_path: &Path) -> Result<Self> {
        let calibrator = IsotonicCalibrator::load(calibrator_path)?;
        Ok(Self::new(model, calibrator))
    }

    /// Replace the default configuration.
    #[must_use]
    pub fn with_config(mut self, config: ServiceConfig) -> Self {
        self.config = config;
        self
    }

    /// The active configuration.
    #[must_use]
    pub fn config(&self) -> &ServiceConfig {
        &self.config
    }

    /// Rank items for one request.
    ///
    /// Runs recall, scoring, and reranking in strict sequence and returns
    /// an ordered list of at most `top_k` item ids. An empty candidate set
    /// yields an empty list, not an error.
    ///
    /// # Errors
    ///
    /// Propagates fatal request errors: feature schema mismatch from the
    /// model, or a candidate missing its embedding during reranking.
    pub fn rank(
        &self,
        user_embedding: &[f32],
        items: &ItemEmbeddings,
        user_context: &UserContext,
        retention_scores: &HashMap<ItemId, f32>,
        weights: &ObjectiveWeights,
        top_k: usize,
    ) -> Result<Vec<ItemId>> {
        let start = Instant::now();

        let candidates = recall::generate_candidates(
            user_embedding,
            items,
            &user_context.recent_items,
            &user_context.trending_items,
            &user_context.follow_items,
            self.config.embedding_k,
            self.config.heuristic_k,
        );
        tracing::debug!(candidates = candidates.len(), "recall complete");

        let relevance = score_candidates(&self.model, &self.calibrator, &candidates, user_context)?;

        let ranked = rerank::rerank(&candidates, &relevance, items, retention_scores, weights, top_k)?;

        let elapsed = start.elapsed();
        if elapsed > self.config.latency_budget {
            tracing::warn!(
                elapsed_ms = elapsed.as_secs_f64() * 1e3,
                budget_ms = self.config.latency_budget.as_secs_f64() * 1e3,
                "ranking latency exceeded budget"
            );
        }

        Ok(ranked)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scorer::{FeatureFrame, FEATURE_SCHEMA};
    use crate::RankError;

    /// Scores by the popularity feature; validates the schema like a real
    /// trained backend would.
    #[derive(Debug)]
    struct PopularityModel;

    impl RelevanceModel for PopularityModel {
        fn score_batch(&self, features: &FeatureFrame) -> Result<Vec<f32>> {
            features.expect_schema(&FEATURE_SCHEMA)?;
            Ok(features.rows().iter().map(|row| row[0]).collect())
        }
    }

    fn identity_calibrator() -> IsotonicCalibrator {
        IsotonicCalibrator::new(vec![0.0, 1.0], vec![0.0, 1.0]).unwrap()
    }

    fn items() -> ItemEmbeddings {
        let mut t = ItemEmbeddings::new();
        t.insert(1, vec![1.0, 0.0]).unwrap();
        t.insert(2, vec![0.8, 0.2]).unwrap();
        t.insert(3, vec![0.0, 1.0]).unwrap();
        t
    }

    fn context() -> UserContext {
        UserContext {
            recent_items: vec![3],
            user_activity: 0.5,
            item_popularity: [(1, 0.9), (2, 0.6), (3, 0.2)].into(),
            ..UserContext::default()
        }
    }

    #[test]
    fn rank_end_to_end() {
        let service = RankingService::new(PopularityModel, identity_calibrator());
        let ranked = service
            .rank(
                &[1.0, 0.0],
                &items(),
                &context(),
                &HashMap::new(),
                &ObjectiveWeights::new(1.0, 0.0, 0.0),
                2,
            )
            .unwrap();
        assert_eq!(ranked, vec![1, 2]);
    }

    #[test]
    fn rank_empty_tables_empty_result() {
        let service = RankingService::new(PopularityModel, identity_calibrator());
        let ranked = service
            .rank(
                &[1.0, 0.0],
                &ItemEmbeddings::new(),
                &UserContext::default(),
                &HashMap::new(),
                &ObjectiveWeights::default(),
                10,
            )
            .unwrap();
        assert!(ranked.is_empty());
    }

    #[test]
    fn rank_respects_top_k() {
        let service = RankingService::new(PopularityModel, identity_calibrator());
        let ranked = service
            .rank(
                &[1.0, 0.0],
                &items(),
                &context(),
                &HashMap::new(),
                &ObjectiveWeights::default(),
                1,
            )
            .unwrap();
        assert_eq!(ranked.len(), 1);
    }

    #[test]
    fn over_budget_still_returns_result() {
        let config = ServiceConfig::default().with_latency_budget(Duration::ZERO);
        let service =
            RankingService::new(PopularityModel, identity_calibrator()).with_config(config);
        // Zero budget: the warn path fires, the result still comes back.
        let ranked = service
            .rank(
                &[1.0, 0.0],
                &items(),
                &context(),
                &HashMap::new(),
                &ObjectiveWeights::default(),
                3,
            )
            .unwrap();
        assert_eq!(ranked.len(), 3);
    }

    #[test]
    fn construction_fails_without_calibrator_artifact() {
        let dir = tempfile::tempdir().unwrap();
        let err = RankingService::with_calibrator_artifact(
            PopularityModel,
            &dir.path().join("calibrator.json"),
        )
        .unwrap_err();
        assert!(matches!(err, RankError::MissingArtifact { .. }));
    }

    #[test]
    fn schema_mismatch_propagates() {
        struct WrongSchemaModel;
        impl RelevanceModel for WrongSchemaModel {
            fn score_batch(&self, features: &FeatureFrame) -> Result<Vec<f32>> {
                features.expect_schema(&["ctr_7d"])?;
                Ok(Vec::new())
            }
        }
        let service = RankingService::new(WrongSchemaModel, identity_calibrator());
        let err = service
            .rank(
                &[1.0, 0.0],
                &items(),
                &context(),
                &HashMap::new(),
                &ObjectiveWeights::default(),
                3,
            )
            .unwrap_err();
        assert!(matches!(err, RankError::SchemaMismatch { .. }));
    }

    #[test]
    fn heuristic_items_join_the_candidate_pool() {
        // Item 3 scores lowest on similarity but is in recent_items, so it
        // survives even with embedding_k = 2.
        let config = ServiceConfig::default().with_embedding_k(2);
        let service =
            RankingService::new(PopularityModel, identity_calibrator()).with_config(config);
        let ranked = service
            .rank(
                &[1.0, 0.0],
                &items(),
                &context(),
                &HashMap::new(),
                &ObjectiveWeights::new(1.0, 0.0, 0.0),
                3,
            )
            .unwrap();
        assert!(ranked.contains(&3));
    }
}
