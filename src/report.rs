//! Output encoding
//!
//! Encodes the two batch artifacts: the per-entity metric table (CSV, one row
//! per entity, indexable by name) and the labeled dendrogram tree (JSON).

use crate::dendro::Dendrogram;
use crate::error::AnalyticsError;
use crate::ledger::{LedgerRegistry, Perspective};
use crate::metrics::{MetricEngine, MetricSnapshot};

/// Encode the per-entity metric table as CSV.
///
/// Rows follow the registry's first-seen entity order. The problems
/// perspective carries an extra `Topic` column after the name.
pub fn metrics_csv(registry: &LedgerRegistry) -> Result<String, AnalyticsError> {
    let with_topic = registry.perspective() == Perspective::Problems;
    let mut writer = csv::Writer::from_writer(Vec::new());

    let mut header = vec!["name"];
    if with_topic {
        header.push("Topic");
    }
    header.extend(MetricSnapshot::COLUMNS);
    writer.write_record(&header)?;

    for ledger in registry.iter() {
        let metrics = MetricEngine::compute(ledger);

        let mut row = vec![ledger.name().to_string()];
        if with_topic {
            row.push(ledger.topic().unwrap_or("").to_string());
        }
        row.push(metrics.total_problem.to_string());
        for value in metrics.to_vector().into_iter().skip(1) {
            row.push(value.to_string());
        }
        writer.write_record(&row)?;
    }

    let bytes = writer
        .into_inner()
        .map_err(|e| AnalyticsError::EncodingError(e.to_string()))?;
    String::from_utf8(bytes).map_err(|e| AnalyticsError::EncodingError(e.to_string()))
}

/// Encode the labeled tree as pretty-printed JSON
pub fn dendrogram_json(tree: &Dendrogram) -> Result<String, AnalyticsError> {
    Ok(serde_json::to_string_pretty(tree)?)
}
