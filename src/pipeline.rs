//! Pipeline orchestration
//!
//! The public batch API: one pass over the event log populates the ledgers,
//! then metrics, clustering, and tree labeling run over the completed
//! registry. Stage order matters — the aggregate denominators are only final
//! after the last event is processed.

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::dendro::{ClusterTreeBuilder, Dendrogram};
use crate::error::AnalyticsError;
use crate::event::{parse_log, AttemptEvent};
use crate::ledger::{LedgerRegistry, Perspective};
use crate::linkage::{cophenetic_correlation, min_max_scale, ward_linkage, MergeStep};
use crate::metrics::MetricEngine;

/// Run-level diagnostics reported alongside the tree; nothing in the core
/// consumes these
#[derive(Debug, Clone, Serialize)]
pub struct ClusterDiagnostics {
    pub run_id: Uuid,
    pub computed_at: DateTime<Utc>,
    pub perspective: String,
    pub entity_count: usize,
    pub event_count: usize,
    pub dropped_events: usize,
    /// Cophenetic correlation of the hierarchy against the original
    /// distances; closer to 1 is better. Absent for degenerate inputs.
    pub cophenetic_c: Option<f64>,
}

/// Everything one batch run produces
#[derive(Debug, Clone)]
pub struct BatchReport {
    pub registry: LedgerRegistry,
    pub merges: Vec<MergeStep>,
    pub dendrogram: Dendrogram,
    pub diagnostics: ClusterDiagnostics,
}

/// Flatten the registry into the clustering matrix: one metric vector per
/// entity, rows in first-seen entity order
pub fn metric_matrix(registry: &LedgerRegistry) -> Vec<Vec<f64>> {
    registry
        .iter()
        .map(|ledger| MetricEngine::compute(ledger).to_vector())
        .collect()
}

/// Analyze a raw NDJSON event log from one perspective.
///
/// An unparsable line fails the batch; events that are well-formed JSON but
/// not usable attempts are dropped and counted in the diagnostics.
pub fn analyze_log(input: &str, perspective: Perspective) -> Result<BatchReport, AnalyticsError> {
    let (events, dropped) = parse_log(input)?;
    analyze_events(&events, dropped, perspective)
}

/// Analyze already-classified events from one perspective
pub fn analyze_events(
    events: &[AttemptEvent],
    dropped: usize,
    perspective: Perspective,
) -> Result<BatchReport, AnalyticsError> {
    let registry = LedgerRegistry::from_events(perspective, events);

    let matrix = metric_matrix(&registry);
    let scaled = min_max_scale(&matrix);
    let merges = ward_linkage(&scaled);
    let cophenetic_c = cophenetic_correlation(&scaled, &merges);

    let dendrogram = ClusterTreeBuilder::build(&registry, &merges)?;

    tracing::info!(
        perspective = perspective.as_str(),
        entities = registry.len(),
        events = events.len(),
        dropped,
        "batch analysis complete"
    );

    let diagnostics = ClusterDiagnostics {
        run_id: Uuid::new_v4(),
        computed_at: Utc::now(),
        perspective: perspective.as_str().to_string(),
        entity_count: registry.len(),
        event_count: events.len(),
        dropped_events: dropped,
        cophenetic_c,
    };

    Ok(BatchReport {
        registry,
        merges,
        dendrogram,
        diagnostics,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metrics::MetricEngine;
    use pretty_assertions::assert_eq;

    fn event_line(actor: &str, object: &str, action: &str, count: u32, duration: &str, correct: Option<&str>) -> String {
        let extensions = match correct {
            Some(v) => format!(r#", "extensions": {{"isStudentAnswerCorrect": "{v}"}}"#),
            None => String::new(),
        };
        format!(
            r#"{{"action": "vocab#{action}", "actor": {{"name": "{actor}"}}, "object": {{"name": "{object}", "isPartOf": {{"name": "mechanics"}}}}, "generated": {{"attempt": {{"count": "{count}", "duration": "{duration}"}}{extensions}}}}}"#
        )
    }

    #[test]
    fn test_end_to_end_single_student() {
        // Two events for alice on p1: attempt 1 wrong (10), attempt 2
        // correct (5)
        let log = [
            event_line("alice", "p1", "Completed", 1, "10 sec", Some("false")),
            event_line("alice", "p1", "Completed", 2, "5 sec", Some("true")),
        ]
        .join("\n");

        let report = analyze_log(&log, Perspective::Students).unwrap();
        assert_eq!(report.registry.len(), 1);

        let m = MetricEngine::compute(report.registry.get("alice").unwrap());
        assert_eq!(m.total_problem, 1);
        assert_eq!(m.solved_percent, 1.0);
        assert_eq!(m.skipped_percent, 0.0);
        assert_eq!(m.avg_attempt_until_correct, 2.0);
        assert_eq!(m.first_complete_correct_percent, 0.0);

        assert_eq!(report.dendrogram.leaf_names(), ["alice"]);
        assert!(report.merges.is_empty());
    }

    #[test]
    fn test_end_to_end_leaf_set_matches_entities() {
        let log = [
            event_line("alice", "p1", "Completed", 1, "5 sec", Some("true")),
            event_line("bob", "p1", "Completed", 1, "8 sec", Some("false")),
            event_line("carol", "p2", "Skipped", 1, "2 sec", None),
            event_line("dave", "p2", "Completed", 3, "30 sec", Some("true")),
        ]
        .join("\n");

        let report = analyze_log(&log, Perspective::Students).unwrap();
        assert_eq!(report.registry.len(), 4);
        assert_eq!(report.merges.len(), 3);

        let mut leaves = report.dendrogram.leaf_names();
        leaves.sort_unstable();
        assert_eq!(leaves, ["alice", "bob", "carol", "dave"]);

        let d = &report.diagnostics;
        assert_eq!(d.entity_count, 4);
        assert_eq!(d.event_count, 4);
        assert_eq!(d.dropped_events, 0);
        assert!(d.cophenetic_c.is_some());
    }

    #[test]
    fn test_end_to_end_problem_perspective() {
        let log = [
            event_line("alice", "p1", "Completed", 1, "5 sec", Some("true")),
            event_line("bob", "p2", "Skipped", 1, "2 sec", None),
            event_line("alice", "p1", "Viewed", 1, "1 sec", None),
        ]
        .join("\n");

        let report = analyze_log(&log, Perspective::Problems).unwrap();
        assert_eq!(report.registry.names(), ["p1", "p2"]);
        assert_eq!(report.registry.get("p1").unwrap().topic(), Some("mechanics"));
        assert_eq!(report.diagnostics.dropped_events, 1);
    }

    #[test]
    fn test_rebuild_is_byte_identical() {
        let log = [
            event_line("alice", "p1", "Completed", 1, "5 sec", Some("true")),
            event_line("bob", "p1", "Skipped", 1, "2 sec", None),
            event_line("carol", "p1", "Completed", 2, "9 sec", Some("false")),
        ]
        .join("\n");

        let first = analyze_log(&log, Perspective::Students).unwrap();
        let second = analyze_log(&log, Perspective::Students).unwrap();
        assert_eq!(
            serde_json::to_string(&first.dendrogram).unwrap(),
            serde_json::to_string(&second.dendrogram).unwrap()
        );
    }

    #[test]
    fn test_unparsable_line_fails_the_batch() {
        let log = format!(
            "{}\n{}",
            event_line("alice", "p1", "Completed", 1, "5 sec", Some("true")),
            "{broken"
        );
        assert!(analyze_log(&log, Perspective::Students).is_err());
    }

    #[test]
    fn test_empty_log_yields_empty_report() {
        let report = analyze_log("", Perspective::Students).unwrap();
        assert!(report.registry.is_empty());
        assert!(report.dendrogram.children.is_empty());
        assert_eq!(report.diagnostics.cophenetic_c, None);
    }
}
