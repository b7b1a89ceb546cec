//! cohortlens - Batch analytics for learning-activity event logs
//!
//! cohortlens turns a newline-delimited log of learning events into
//! per-entity behavioral metrics and a hierarchical clustering of the
//! entities, through a deterministic pipeline: event classification → ledger
//! accumulation → metric derivation → Ward clustering → dendrogram labeling.
//!
//! ## Modules
//!
//! - **event**: Caliper-style event parsing and attempt classification
//! - **ledger**: per-entity attempt accumulation (students and problems)
//! - **metrics**: derived behavioral statistics with the `-1.0` undefined
//!   sentinel
//! - **linkage**: min-max scaling, Ward linkage, cophenetic diagnostic
//! - **dendro**: merge-tree materialization and leaf labeling
//! - **report**: CSV metric table and JSON dendrogram encoding

pub mod dendro;
pub mod error;
pub mod event;
pub mod ledger;
pub mod linkage;
pub mod metrics;
pub mod pipeline;
pub mod report;

pub use dendro::{ClusterNode, ClusterTreeBuilder, Dendrogram};
pub use error::AnalyticsError;
pub use event::{AttemptEvent, AttemptOutcome};
pub use ledger::{AttemptHistory, EntityLedger, LedgerRegistry, Perspective};
pub use metrics::{MetricEngine, MetricSnapshot, UNDEFINED_METRIC};
pub use pipeline::{analyze_events, analyze_log, BatchReport, ClusterDiagnostics};

/// cohortlens version embedded in diagnostics output
pub const COHORTLENS_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Producer name for diagnostics output
pub const PRODUCER_NAME: &str = "cohortlens";
