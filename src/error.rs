//! Error types for per-subject/per-task analysis.
//!
//! Every failure that concerns a single subject/task unit is expressed as an
//! [`AnalysisError`]. The orchestrator decides from the variant whether the
//! unit is skipped with a warning or logged as an error; none of them abort
//! the run.

use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur while analyzing one subject/task unit.
#[derive(Debug, Error)]
pub enum AnalysisError {
    #[error("Unknown task identifier: {0}")]
    UnknownTask(String),

    #[error("Expected exactly one CSV file in {}, found {found}", dir.display())]
    MissingOrAmbiguousSource { dir: PathBuf, found: usize },

    #[error("Missing required column: {0}")]
    MissingColumn(String),

    #[error("Invalid value {value:?} in column {column} (row {row})")]
    InvalidValue {
        column: String,
        row: usize,
        value: String,
    },

    #[error("{0}")]
    StructuralViolation(String),

    #[error("Invalid survey response: {0}")]
    SurveyResponse(String),

    #[error("Malformed literal at offset {offset}: {message}")]
    Literal { offset: usize, message: String },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
}

impl AnalysisError {
    /// Whether this error is an expected skip (logged as a warning) rather
    /// than a data problem (logged as an error).
    pub fn is_skip(&self) -> bool {
        matches!(
            self,
            AnalysisError::UnknownTask(_) | AnalysisError::MissingOrAmbiguousSource { .. }
        )
    }
}

pub type Result<T> = std::result::Result<T, AnalysisError>;
