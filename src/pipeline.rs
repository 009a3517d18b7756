//! Ship / no-ship gate for candidate ranking policies.
//!
//! Thin glue over [`crate::ope`]: evaluates a baseline policy (today's
//! production behavior) and a candidate policy over the same logged
//! dataset, with both estimators, and turns the SNIPS comparison into a
//! rollout decision. IPS values are carried in the report for variance
//! context but do not drive the decision — SNIPS is the gate because its
//! self-normalization keeps the comparison on one scale.

use crate::ope::{ips, snips, LoggedEvent};
use crate::ItemId;
use serde::{Deserialize, Serialize};

/// Outcome of an offline policy comparison.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ShipDecision {
    /// Candidate improves estimated value — safe to A/B test online.
    SafeToAbTest,
    /// Candidate underperforms the baseline — do not ship.
    DoNotShip,
}

/// Off-policy estimates for baseline and candidate over one dataset.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PolicyComparison {
    pub baseline_ips: f64,
    pub baseline_snips: f64,
    pub candidate_ips: f64,
    pub candidate_snips: f64,
    pub n_events: usize,
    pub decision: ShipDecision,
}

/// Evaluate both policies and derive the rollout decision.
///
/// The candidate must *strictly* beat the baseline on SNIPS; an exact tie
/// (including the degenerate all-zero case of an empty dataset) holds the
/// line and does not ship.
pub fn compare_policies<B, C>(
    events: &[LoggedEvent],
    mut baseline: B,
    mut candidate: C,
    epsilon: f64,
) -> PolicyComparison
where
    B: FnMut(&LoggedEvent) -> ItemId,
    C: FnMut(&LoggedEvent) -> ItemId,
{
    let baseline_ips = ips(events, &mut baseline, epsilon);
    let baseline_snips = snips(events, &mut baseline, epsilon);
    let candidate_ips = ips(events, &mut candidate, epsilon);
    let candidate_snips = snips(events, &mut candidate, epsilon);

    let decision = if candidate_snips > baseline_snips {
        ShipDecision::SafeToAbTest
    } else {
        ShipDecision::DoNotShip
    };

    PolicyComparison {
        baseline_ips,
        baseline_snips,
        candidate_ips,
        candidate_snips,
        n_events: events.len(),
        decision,
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn events() -> Vec<LoggedEvent> {
        vec![
            LoggedEvent::new(1, 0, 1.0, 0.5),
            LoggedEvent::new(2, 1, 0.0, 0.4),
            LoggedEvent::new(3, 0, 1.0, 0.5),
            LoggedEvent::new(4, 1, 0.0, 0.4),
        ]
    }

    #[test]
    fn better_candidate_ships() {
        // Baseline repeats the log (mean reward 0.5); candidate always
        // plays the rewarded action 0.
        let report = compare_policies(&events(), |e: &LoggedEvent| e.action, |_| 0, 0.01);
        assert!(report.candidate_snips > report.baseline_snips);
        assert_eq!(report.decision, ShipDecision::SafeToAbTest);
    }

    #[test]
    fn worse_candidate_held() {
        let report = compare_policies(&events(), |e: &LoggedEvent| e.action, |_| 1, 0.01);
        assert_eq!(report.decision, ShipDecision::DoNotShip);
    }

    #[test]
    fn tie_does_not_ship() {
        let report = compare_policies(&events(), |_| 0, |_| 0, 0.01);
        assert_eq!(report.baseline_snips, report.candidate_snips);
        assert_eq!(report.decision, ShipDecision::DoNotShip);
    }

    #[test]
    fn empty_dataset_holds() {
        let report = compare_policies(&[], |_| 0, |_| 1, 0.01);
        assert_eq!(report.n_events, 0);
        assert_eq!(report.baseline_snips, 0.0);
        assert_eq!(report.candidate_snips, 0.0);
        assert_eq!(report.decision, ShipDecision::DoNotShip);
    }

    #[test]
    fn report_serializes() {
        let report = compare_policies(&events(), |e: &LoggedEvent| e.action, |_| 0, 0.01);
        let json = serde_json::to_string(&report).unwrap();
        assert!(json.contains("safe_to_ab_test"));
    }
}
