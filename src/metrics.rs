//! Metric derivation
//!
//! Computes the derived statistics for one entity from its accumulated
//! attempt histories and running totals. Every ratio or average with a zero
//! denominator yields the sentinel [`UNDEFINED_METRIC`] instead of failing,
//! so output schemas stay stable and downstream consumers can detect the
//! undefined case.

use serde::{Deserialize, Serialize};

use crate::ledger::EntityLedger;

/// Sentinel marking an undefined ratio or average (division by zero)
pub const UNDEFINED_METRIC: f64 = -1.0;

/// Derived statistics for one entity.
///
/// Field names serialize exactly as the output schema spells them, for both
/// the CSV table and the dendrogram leaves.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricSnapshot {
    #[serde(rename = "TotalProblem")]
    pub total_problem: usize,
    #[serde(rename = "SolvedPercent")]
    pub solved_percent: f64,
    #[serde(rename = "UnsolvedPercent")]
    pub unsolved_percent: f64,
    #[serde(rename = "SkippedPercent")]
    pub skipped_percent: f64,
    #[serde(rename = "SkipRate")]
    pub skip_rate: f64,
    #[serde(rename = "AvgCompleteDuration")]
    pub avg_complete_duration: f64,
    #[serde(rename = "AvgSkipDuration")]
    pub avg_skip_duration: f64,
    #[serde(rename = "FirstCompleteCorrectPercent")]
    pub first_complete_correct_percent: f64,
    #[serde(rename = "AvgAttemptUntilCorrect")]
    pub avg_attempt_until_correct: f64,
    #[serde(rename = "AvgDurationUntilCorrect")]
    pub avg_duration_until_correct: f64,
}

impl MetricSnapshot {
    /// Metric column names, in clustering-matrix order
    pub const COLUMNS: [&'static str; 10] = [
        "TotalProblem",
        "SolvedPercent",
        "UnsolvedPercent",
        "SkippedPercent",
        "SkipRate",
        "AvgCompleteDuration",
        "AvgSkipDuration",
        "FirstCompleteCorrectPercent",
        "AvgAttemptUntilCorrect",
        "AvgDurationUntilCorrect",
    ];

    /// Flatten into a feature vector, in [`Self::COLUMNS`] order
    pub fn to_vector(&self) -> Vec<f64> {
        vec![
            self.total_problem as f64,
            self.solved_percent,
            self.unsolved_percent,
            self.skipped_percent,
            self.skip_rate,
            self.avg_complete_duration,
            self.avg_skip_duration,
            self.first_complete_correct_percent,
            self.avg_attempt_until_correct,
            self.avg_duration_until_correct,
        ]
    }
}

/// Metric engine computing snapshots from ledgers
pub struct MetricEngine;

impl MetricEngine {
    /// Compute the full derived-statistic snapshot for one entity
    pub fn compute(ledger: &EntityLedger) -> MetricSnapshot {
        let total_problem = ledger.total_targets();
        let solved_percent = solved_percent(ledger);
        let skipped_percent = skipped_percent(ledger);

        // Derived, never recomputed from first principles. With a zero-target
        // entity both inputs are the sentinel, so the unsolved share is
        // clamped to the sentinel as well rather than left as 1 - (-1) - (-1).
        let unsolved_percent = if total_problem == 0 {
            UNDEFINED_METRIC
        } else {
            1.0 - solved_percent - skipped_percent
        };

        MetricSnapshot {
            total_problem,
            solved_percent,
            unsolved_percent,
            skipped_percent,
            skip_rate: ratio(
                ledger.total_skipped() as f64,
                (ledger.total_skipped() + ledger.total_completed()) as f64,
            ),
            avg_complete_duration: ratio(
                ledger.total_completed_duration() as f64,
                ledger.total_completed() as f64,
            ),
            avg_skip_duration: ratio(
                ledger.total_skipped_duration() as f64,
                ledger.total_skipped() as f64,
            ),
            first_complete_correct_percent: first_complete_correct_percent(ledger),
            avg_attempt_until_correct: avg_attempt_until_correct(ledger),
            avg_duration_until_correct: avg_duration_until_correct(ledger),
        }
    }
}

/// Numerator over denominator, with the sentinel for a zero denominator
fn ratio(numerator: f64, denominator: f64) -> f64 {
    if denominator == 0.0 {
        UNDEFINED_METRIC
    } else {
        numerator / denominator
    }
}

/// Fraction of targets with at least one correct attempt
fn solved_percent(ledger: &EntityLedger) -> f64 {
    let solved = ledger
        .histories()
        .values()
        .filter(|h| !h.correct.is_empty())
        .count();
    ratio(solved as f64, ledger.total_targets() as f64)
}

/// Fraction of targets with no completed attempt at all
fn skipped_percent(ledger: &EntityLedger) -> f64 {
    let skipped = ledger
        .histories()
        .values()
        .filter(|h| h.completed_count() == 0)
        .count();
    ratio(skipped as f64, ledger.total_targets() as f64)
}

/// Over targets with at least one completed attempt, the fraction whose
/// earliest completed attempt was correct. The earliest attempt is decided by
/// attempt-number value alone.
fn first_complete_correct_percent(ledger: &EntityLedger) -> f64 {
    let mut with_completed = 0usize;
    let mut first_correct = 0usize;

    for history in ledger.histories().values() {
        if let Some(first) = history.first_completed_attempt() {
            with_completed += 1;
            if history.correct.contains_key(&first) {
                first_correct += 1;
            }
        }
    }

    ratio(first_correct as f64, with_completed as f64)
}

/// Average, over solved targets, of the earliest correct attempt number
fn avg_attempt_until_correct(ledger: &EntityLedger) -> f64 {
    let mut solved = 0usize;
    let mut attempt_sum = 0u64;

    for history in ledger.histories().values() {
        if let Some(first) = history.first_correct_attempt() {
            solved += 1;
            attempt_sum += u64::from(first);
        }
    }

    ratio(attempt_sum as f64, solved as f64)
}

/// Average, over solved targets, of the total time spent through the first
/// correct attempt (all outcome buckets included)
fn avg_duration_until_correct(ledger: &EntityLedger) -> f64 {
    let mut solved = 0usize;
    let mut duration_sum = 0u64;

    for history in ledger.histories().values() {
        if let Some(first) = history.first_correct_attempt() {
            solved += 1;
            duration_sum += history.duration_through_attempt(first);
        }
    }

    ratio(duration_sum as f64, solved as f64)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::AttemptOutcome;
    use pretty_assertions::assert_eq;

    fn wrong(attempt: u32, duration: u64) -> AttemptOutcome {
        AttemptOutcome::Wrong { attempt, duration }
    }

    fn correct(attempt: u32, duration: u64) -> AttemptOutcome {
        AttemptOutcome::Correct { attempt, duration }
    }

    fn skipped(attempt: u32, duration: u64) -> AttemptOutcome {
        AttemptOutcome::Skipped { attempt, duration }
    }

    #[test]
    fn test_single_solved_target() {
        let mut ledger = EntityLedger::new("alice");
        ledger.record("p1", wrong(1, 10));
        ledger.record("p1", correct(2, 5));

        let m = MetricEngine::compute(&ledger);
        assert_eq!(m.total_problem, 1);
        assert_eq!(m.solved_percent, 1.0);
        assert_eq!(m.skipped_percent, 0.0);
        assert_eq!(m.unsolved_percent, 0.0);
        assert_eq!(m.skip_rate, 0.0);
        assert_eq!(m.avg_complete_duration, 7.5);
        assert_eq!(m.avg_skip_duration, UNDEFINED_METRIC);
        assert_eq!(m.first_complete_correct_percent, 0.0);
        assert_eq!(m.avg_attempt_until_correct, 2.0);
        assert_eq!(m.avg_duration_until_correct, 15.0);
    }

    #[test]
    fn test_first_complete_correct_tiebreak_by_attempt_number() {
        // correct={3}, wrong={1}: earliest completed attempt is 1, which is
        // wrong, so it counts against correctness
        let mut ledger = EntityLedger::new("a");
        ledger.record("p1", correct(3, 5));
        ledger.record("p1", wrong(1, 10));
        assert_eq!(
            MetricEngine::compute(&ledger).first_complete_correct_percent,
            0.0
        );

        // correct={1}, wrong={3}: earliest is 1 and correct
        let mut ledger = EntityLedger::new("b");
        ledger.record("p1", correct(1, 5));
        ledger.record("p1", wrong(3, 10));
        assert_eq!(
            MetricEngine::compute(&ledger).first_complete_correct_percent,
            1.0
        );
    }

    #[test]
    fn test_duration_until_correct_includes_all_buckets() {
        // min correct attempt = 3; durations at attempts 1 (wrong), 2 (skip)
        // and 3 (correct) all count
        let mut ledger = EntityLedger::new("a");
        ledger.record("p1", wrong(1, 10));
        ledger.record("p1", skipped(2, 2));
        ledger.record("p1", correct(3, 5));
        ledger.record("p1", wrong(4, 100)); // after the first correct, excluded

        assert_eq!(MetricEngine::compute(&ledger).avg_duration_until_correct, 17.0);
    }

    #[test]
    fn test_skip_rate_mixed() {
        let mut ledger = EntityLedger::new("a");
        ledger.record("p1", skipped(1, 2));
        ledger.record("p2", correct(1, 5));
        ledger.record("p3", skipped(1, 4));

        let m = MetricEngine::compute(&ledger);
        assert_eq!(m.skip_rate, 2.0 / 3.0);
        assert_eq!(m.avg_skip_duration, 3.0);
        assert_eq!(m.skipped_percent, 2.0 / 3.0);
        assert_eq!(m.solved_percent, 1.0 / 3.0);
        assert_eq!(m.unsolved_percent, 1.0 - 1.0 / 3.0 - 2.0 / 3.0);
    }

    #[test]
    fn test_unsolved_percent_is_derived_not_recomputed() {
        let mut ledger = EntityLedger::new("a");
        ledger.record("p1", wrong(1, 1));
        ledger.record("p2", skipped(1, 1));

        let m = MetricEngine::compute(&ledger);
        // Exactly the derivation, whatever the component values are
        assert_eq!(m.unsolved_percent, 1.0 - m.solved_percent - m.skipped_percent);
    }

    #[test]
    fn test_empty_entity_clamps_to_sentinel() {
        let ledger = EntityLedger::new("ghost");
        let m = MetricEngine::compute(&ledger);

        assert_eq!(m.total_problem, 0);
        assert_eq!(m.solved_percent, UNDEFINED_METRIC);
        assert_eq!(m.skipped_percent, UNDEFINED_METRIC);
        assert_eq!(m.unsolved_percent, UNDEFINED_METRIC);
        assert_eq!(m.skip_rate, UNDEFINED_METRIC);
        assert_eq!(m.avg_complete_duration, UNDEFINED_METRIC);
        assert_eq!(m.avg_skip_duration, UNDEFINED_METRIC);
        assert_eq!(m.first_complete_correct_percent, UNDEFINED_METRIC);
        assert_eq!(m.avg_attempt_until_correct, UNDEFINED_METRIC);
        assert_eq!(m.avg_duration_until_correct, UNDEFINED_METRIC);
    }

    #[test]
    fn test_skip_rate_sentinel_iff_no_events() {
        let mut ledger = EntityLedger::new("a");
        assert_eq!(MetricEngine::compute(&ledger).skip_rate, UNDEFINED_METRIC);

        ledger.record("p1", skipped(1, 1));
        let rate = MetricEngine::compute(&ledger).skip_rate;
        assert!((0.0..=1.0).contains(&rate));
    }

    #[test]
    fn test_snapshot_serializes_with_schema_names() {
        let mut ledger = EntityLedger::new("a");
        ledger.record("p1", correct(1, 5));

        let json = serde_json::to_value(MetricEngine::compute(&ledger)).unwrap();
        assert_eq!(json["TotalProblem"], 1);
        assert_eq!(json["SolvedPercent"], 1.0);
        assert_eq!(json["AvgDurationUntilCorrect"], 5.0);
    }
}
