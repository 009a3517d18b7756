//! Vector similarity primitives.
//!
//! Scalar `dot`, `norm`, and `cosine` used by the recall scan and the
//! rerank diversity penalty. The embedding recall is a full-scan ranking
//! behaviorally equivalent to an ANN index, so these stay deliberately
//! simple; the pipeline's dominant cost is the greedy rerank loop, not
//! the scan.

/// Denominator floor for [`cosine`]. Keeps zero vectors from dividing by
/// zero while leaving ordinary magnitudes untouched.
pub const COSINE_EPS: f32 = 1e-8;

/// Dot product of two vectors.
///
/// If vectors have different lengths, uses the shorter length.
/// Returns 0.0 for empty vectors.
#[inline]
#[must_use]
pub fn dot(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b).map(|(x, y)| x * y).sum()
}

/// L2 norm of a vector.
#[inline]
#[must_use]
pub fn norm(v: &[f32]) -> f32 {
    dot(v, v).sqrt()
}

/// Cosine similarity with a floored denominator.
///
/// `dot(a, b) / (‖a‖·‖b‖ + COSINE_EPS)` — a zero vector yields 0.0 rather
/// than NaN, and the floor perturbs well-conditioned inputs by less than
/// single-precision rounding.
#[inline]
#[must_use]
pub fn cosine(a: &[f32], b: &[f32]) -> f32 {
    dot(a, b) / (norm(a) * norm(b) + COSINE_EPS)
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────


#[cfg(test)]
mod proptests {
    use super::*;
    use proptest::prelude::*;

    fn arb_vec(len: usize) -> impl Strategy<Value = Vec<f32>> {
        proptest::collection::vec(-10.0f32..10.0, len)
    }

    proptest! {
        /// Dot product is commutative
        #[test]
        fn dot_commutative(a in arb_vec(16), b in arb_vec(16)) {
            prop_assert!((dot(&a, &b) - dot(&b, &a)).abs() < 1e-3);
        }

        /// Cosine is commutative
        #[test]
        fn cosine_commutative(a in arb_vec(16), b in arb_vec(16)) {
            prop_assert!((cosine(&a, &b) - cosine(&b, &a)).abs() < 1e-5);
        }

        /// Cosine stays within [-1, 1] (modulo rounding) for nonzero inputs
        #[test]
        fn cosine_bounded(a in arb_vec(8), b in arb_vec(8)) {
            let c = cosine(&a, &b);
            prop_assert!(c >= -1.01 && c <= 1.01, "cosine {} out of bounds", c);
        }

        /// Norm is non-negative
        #[test]
        fn norm_nonnegative(v in arb_vec(12)) {
            prop_assert!(norm(&v) >= 0.0);
        }
    }
}
