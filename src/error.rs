//! Error types for cohortlens

use thiserror::Error;

/// Errors that can occur while ingesting a log or producing reports
#[derive(Debug, Error)]
pub enum AnalyticsError {
    #[error("Invalid JSON: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("CSV encoding error: {0}")]
    CsvError(#[from] csv::Error),

    #[error("Tree construction error: {0}")]
    TreeError(String),

    #[error("Encoding error: {0}")]
    EncodingError(String),
}
