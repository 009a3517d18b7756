//! Isotonic calibrator artifact.
//!
//! The relevance model's raw scores are mapped through a monotone table of
//! `(threshold, value)` pairs learned offline by isotonic regression. The
//! artifact is a small JSON document:
//!
//! ```json
//! {"thresholds": [0.1, 0.5, 0.9], "values": [0.05, 0.4, 0.95]}
//! ```
//!
//! Calibration is 1-D linear interpolation over that table. Outside the
//! table's domain the mapping clips to the nearest boundary value — it
//! never extrapolates linearly.
//!
//! The calibrator is loaded once at service construction and never mutated
//! afterwards; a missing artifact is a fatal construction error.

use crate::{RankError, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Monotone score → probability mapping.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IsotonicCalibrator {
    thresholds: Vec<f32>,
    values: Vec<f32>,
}

impl IsotonicCalibrator {
    /// Build a calibrator from parallel threshold/value arrays.
    ///
    /// # Errors
    ///
    /// [`RankError::InvalidCalibrator`] if the arrays are empty, have
    /// different lengths, or thresholds are not strictly ascending.
    pub fn new(thresholds: Vec<f32>, values: Vec<f32>) -> Result<Self> {
        if thresholds.is_empty() {
            return Err(RankError::InvalidCalibrator {
                reason: "empty threshold table".into(),
            });
        }
        if thresholds.len() != values.len() {
            return Err(RankError::InvalidCalibrator {
                reason: format!(
                    "{} thresholds but {} values",
                    thresholds.len(),
                    values.len()
                ),
            });
        }
        if thresholds.windows(2).any(|w| w[0] >= w[1]) {
            return Err(RankError::InvalidCalibrator {
                reason: "thresholds not strictly ascending".into(),
            });
        }
        Ok(Self { thresholds, values })
    }

    /// Load the calibrator from its JSON artifact.
    ///
    /// # Errors
    ///
    /// [`RankError::MissingArtifact`] if the file does not exist, a JSON
    /// error for a malformed document, or [`RankError::InvalidCalibrator`]
    /// if the table fails validation.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(RankError::MissingArtifact {
                path: path.to_path_buf(),
            });
        }
        let payload = std::fs::read_to_string(path)?;
        let raw: IsotonicCalibrator = serde_json::from_str(&payload)?;
        // Re-validate: the derive accepts any shape.
        Self::new(raw.thresholds, raw.values)
    }

    /// Calibrate a single raw score.
    ///
    /// Linear interpolation inside the table's domain; boundary value
    /// outside it.
    #[must_use]
    pub fn calibrate(&self, score: f32) -> f32 {
        let last = self.thresholds.len() - 1;
        if score <= self.thresholds[0] {
            return self.values[0];
        }
        if score >= self.thresholds[last] {
            return self.values[last];
        }
        // partition_point: first index with threshold > score; the bracket
        // [hi-1, hi] exists because score is strictly inside the domain.
        let hi = self.thresholds.partition_point(|&t| t <= score);
        let lo = hi - 1;
        let (x0, x1) = (self.thresholds[lo], self.thresholds[hi]);
        let (y0, y1) = (self.values[lo], self.values[hi]);
        let t = (score - x0) / (x1 - x0);
        (y1 - y0).mul_add(t, y0)
    }

    /// Calibrate a batch of raw scores, preserving order.
    #[must_use]
    pub fn calibrate_batch(&self, scores: &[f32]) -> Vec<f32> {
        scores.iter().map(|&s| self.calibrate(s)).collect()
    }

    /// Number of table entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.thresholds.len()
    }

    /// Whether the table is empty. Always false for a validated calibrator.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.thresholds.is_empty()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
