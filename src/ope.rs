//! Off-policy (counterfactual) evaluation.
//!
//! Estimates what a hypothetical policy *would have* earned from biased
//! logged bandit feedback, without running it online:
//!
//! 1. **IPS** (Inverse Propensity Scoring): unbiased when propensities are
//!    accurate, but its variance blows up as logged propensities approach
//!    zero.
//! 2. **SNIPS** (Self-Normalized IPS): divides by the matched importance
//!    weight sum instead of N, trading a vanishing bias for a large
//!    variance reduction; for binary rewards the estimate stays in [0, 1].
//!
//! Only events where the counterfactual policy agrees with the logged
//! action contribute — the estimators are importance-sampling restricted
//! to the agreement set, which is what makes them valid for an arbitrary
//! `policy_fn` (to the extent logged propensities are accurate).
//!
//! Both estimators are pure functions over an immutable event slice: no
//! shared state, safe to evaluate many policies concurrently over the same
//! dataset.
//!
//! # Example
//!
//! ```rust
//! use rank_serve::ope::{ips, snips, LoggedEvent};
//!
//! let events = vec![
//!     LoggedEvent::new(1, 0, 1.0, 0.5),
//!     LoggedEvent::new(2, 1, 0.0, 0.2),
//!     LoggedEvent::new(3, 0, 1.0, 0.1),
//! ];
//!
//! let always_zero = |_: &LoggedEvent| 0;
//! assert!((ips(&events, always_zero, 0.01) - 4.0).abs() < 1e-9);
//! assert!((snips(&events, always_zero, 0.01) - 1.0).abs() < 1e-9);
//! ```

use crate::{ItemId, RankError, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;

/// Default propensity floor, matching the offline evaluation harness.
pub const DEFAULT_EPSILON: f64 = 0.01;

/// One historical logging decision. Immutable.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggedEvent {
    /// User shown the item.
    pub user_id: u64,
    /// Item the logging policy chose.
    pub action: ItemId,
    /// Observed binary reward.
    pub reward: f64,
    /// Probability the logging policy assigned to `action` at decision
    /// time. Positive in principle, but real logs contain exact zeros from
    /// float underflow — consumers must clip, never divide raw.
    pub propensity: f64,
    /// Auxiliary numeric context columns, preserved from the log.
    #[serde(default)]
    pub context: HashMap<String, f64>,
}

impl LoggedEvent {
    /// Construct an event without auxiliary context.
    #[must_use]
    pub fn new(user_id: u64, action: ItemId, reward: f64, propensity: f64) -> Self {
        Self {
            user_id,
            action,
            reward,
            propensity,
            context: HashMap::new(),
        }
    }
}

/// Floor a logged propensity at `epsilon`.
///
/// A floor, never a ceiling: guards the importance weight against
/// near-zero propensities at the cost of a small negative bias.
#[inline]
#[must_use]
pub fn clip_propensity(propensity: f64, epsilon: f64) -> f64 {
    propensity.max(epsilon)
}

// ─────────────────────────────────────────────────────────────────────────────
// Estimators
// ─────────────────────────────────────────────────────────────────────────────

/// Inverse Propensity Scoring estimate of a policy's value.
///
/// Sum of `reward / clipped_propensity` over agreement events, divided by
/// the *total* event count N (non-matching events contribute an implicit
/// zero). Returns 0.0 for an empty dataset.
#[must_use]
pub fn ips<F>(events: &[LoggedEvent], mut policy_fn: F, epsilon: f64) -> f64
where
    F: FnMut(&LoggedEvent) -> ItemId,
{
    if events.is_empty() {
        return 0.0;
    }

    let total: f64 = events
        .iter()
        .filter(|e| policy_fn(e) == e.action)
        .map(|e| e.reward / clip_propensity(e.propensity, epsilon))
        .sum();

    total / events.len() as f64
}

/// Self-Normalized IPS estimate of a policy's value.
///
/// Same numerator as [`ips`], but normalized by the sum of importance
/// weights over agreement events instead of N. Returns 0.0 when the policy
/// matches no logged action (avoids 0/0).
#[must_use]
pub fn snips<F>(events: &[LoggedEvent], mut policy_fn: F, epsilon: f64) -> f64
where
    F: FnMut(&LoggedEvent) -> ItemId,
{
    let mut weighted_rewards = 0.0;
    let mut weights = 0.0;

    for event in events {
        if policy_fn(event) != event.action {
            continue;
        }
        let w = 1.0 / clip_propensity(event.propensity, epsilon);
        weighted_rewards += w * event.reward;
        weights += w;
    }

    if weights == 0.0 {
        return 0.0;
    }
    weighted_rewards / weights
}

// ─────────────────────────────────────────────────────────────────────────────
// Dataset loading
// ─────────────────────────────────────────────────────────────────────────────

const REQUIRED_COLUMNS: [&str; 4] = ["user_id", "action", "reward", "propensity"];

/// Load logged events from a CSV file.
///
/// The header must contain `user_id`, `action`, `reward`, and `propensity`;
/// any additional columns are parsed as numeric auxiliary context. A
/// propensity of exactly 0.0 is accepted (underflow happens in real logs);
/// negative propensities are rejected.
///
/// # Errors
///
/// [`RankError::MissingArtifact`] for an absent file,
/// [`RankError::Dataset`] for schema or parse problems.
pub fn load_events(path: &Path) -> Result<Vec<LoggedEvent>> {
    if !path.exists() {
        return Err(RankError::MissingArtifact {
            path: path.to_path_buf(),
        });
    }

    let mut reader = csv::Reader::from_path(path)?;
    let headers: Vec<String> = reader.headers()?.iter().map(ToString::to_string).collect();

    let column = |name: &str| -> Result<usize> {
        headers.iter().position(|h| h == name).ok_or_else(|| {
            RankError::Dataset(format!("missing required column `{name}`"))
        })
    };
    let user_col = column("user_id")?;
    let action_col = column("action")?;
    let reward_col = column("reward")?;
    let propensity_col = column("propensity")?;

    let mut events = Vec::new();
    for (row_idx, record) in reader.records().enumerate() {
        let record = record?;
        let field = |col: usize, name: &str| -> Result<f64> {
            record
                .get(col)
                .and_then(|v| v.trim().parse().ok())
                .ok_or_else(|| {
                    RankError::Dataset(format!("row {}: unparseable `{name}`", row_idx + 1))
                })
        };

        let propensity = field(propensity_col, "propensity")?;
        if propensity < 0.0 {
            return Err(RankError::Dataset(format!(
                "row {}: negative propensity {propensity}",
                row_idx + 1
            )));
        }

        let mut context = HashMap::new();
        for (col, header) in headers.iter().enumerate() {
            if REQUIRED_COLUMNS.contains(&header.as_str()) {
                continue;
            }
            if let Some(value) = record.get(col).and_then(|v| v.trim().parse().ok()) {
                context.insert(header.clone(), value);
            }
        }

        events.push(LoggedEvent {
            user_id: field(user_col, "user_id")? as u64,
            action: field(action_col, "action")? as ItemId,
            reward: field(reward_col, "reward")?,
            propensity,
            context,
        });
    }

    Ok(events)
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────


#[cfg(test)]
mod proptests {
    use super::*;
    use proptest::prelude::*;

    fn arb_events() -> impl Strategy<Value = Vec<LoggedEvent>> {
        proptest::collection::vec(
            (0u64..100, 0u64..5, 0u8..2, 0.001f64..1.0),
            0..40,
        )
        .prop_map(|rows| {
            rows.into_iter()
                .map(|(user, action, reward, propensity)| {
                    LoggedEvent::new(user, action, f64::from(reward), propensity)
                })
                .collect()
        })
    }

    proptest! {
        /// SNIPS stays in [0, 1] for binary rewards, any policy
        #[test]
        fn snips_bounded(events in arb_events(), target in 0u64..6) {
            let v = snips(&events, |_| target, DEFAULT_EPSILON);
            prop_assert!((0.0..=1.0).contains(&v), "SNIPS {} out of [0,1]", v);
        }

        /// IPS is non-negative for non-negative rewards
        #[test]
        fn ips_nonnegative(events in arb_events(), target in 0u64..6) {
            prop_assert!(ips(&events, |_| target, DEFAULT_EPSILON) >= 0.0);
        }

        /// Full agreement with uniform propensity: both estimators equal mean reward
        #[test]
        fn uniform_full_agreement(
            rewards in proptest::collection::vec(0u8..2, 1..30),
            propensity in 0.05f64..1.0,
        ) {
            let events: Vec<LoggedEvent> = rewards
                .iter()
                .enumerate()
                .map(|(i, &r)| LoggedEvent::new(i as u64, 1, f64::from(r), propensity))
                .collect();
            let mean = rewards.iter().map(|&r| f64::from(r)).sum::<f64>() / rewards.len() as f64;

            let snips_v = snips(&events, |e| e.action, 0.001);
            prop_assert!((snips_v - mean).abs() < 1e-9);

            // IPS divides by N but reweights by 1/p, so it equals mean/p.
            let ips_v = ips(&events, |e| e.action, 0.001);
            prop_assert!((ips_v - mean / propensity).abs() < 1e-6);
        }

        /// Estimators are pure: repeated evaluation gives identical results
        #[test]
        fn estimators_pure(events in arb_events()) {
            let a = (ips(&events, |_| 0, 0.01), snips(&events, |_| 0, 0.01));
            let b = (ips(&events, |_| 0, 0.01), snips(&events, |_| 0, 0.01));
            prop_assert_eq!(a, b);
        }
    }
}
