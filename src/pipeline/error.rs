//! Pipeline error types.

use std::path::PathBuf;

use thiserror::Error;

/// A malformed line in a batch file. Lines are 1-based.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    #[error("line {line}: expected {expected} fields, found {found}")]
    FieldCount { line: usize, expected: usize, found: usize },

    #[error("line {line}: {field} is empty")]
    EmptyField { line: usize, field: &'static str },

    #[error("line {line}: invalid quantity '{value}'")]
    Quantity { line: usize, value: String },

    #[error("line {line}: invalid date '{value}', expected YYYY-MM-DD")]
    Date { line: usize, value: String },
}

/// A lookup that could not be answered. An empty result is not an error.
#[derive(Debug, Error)]
#[error("{lookup} lookup for '{key}' failed: {reason}")]
pub struct LookupError {
    pub lookup: &'static str,
    pub key: String,
    pub reason: String,
}

impl LookupError {
    pub fn new(lookup: &'static str, key: impl Into<String>, reason: impl ToString) -> Self {
        Self {
            lookup,
            key: key.into(),
            reason: reason.to_string(),
        }
    }
}

/// A write or transaction step the store refused.
#[derive(Debug, Error)]
pub enum PersistenceError {
    #[error("record has no usable '{0}' value")]
    MissingField(String),

    #[error("no {table} row for {key}")]
    MissingRow { table: &'static str, key: String },

    #[error("constraint violated: {0}")]
    Constraint(String),

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

/// Why a batch was rolled back (or, for `Source`, never started).
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("parse failed: {0}")]
    Parse(#[from] ParseError),

    #[error("enrichment of shipment '{shipment}' failed: {source}")]
    EnrichmentFailure {
        shipment: String,
        #[source]
        source: LookupError,
    },

    #[error("persisting {stage} failed: {source}")]
    PersistenceFailure {
        /// Shipment code, or the transaction step when no record is involved.
        stage: String,
        #[source]
        source: PersistenceError,
    },

    #[error("batch source {path:?}: {source}")]
    Source {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("{failed} batch(es) failed and were moved to {error_dir:?}")]
    BatchesFailed { failed: usize, error_dir: PathBuf },
}

impl PipelineError {
    pub(crate) fn persistence(stage: impl Into<String>, source: PersistenceError) -> Self {
        PipelineError::PersistenceFailure {
            stage: stage.into(),
            source,
        }
    }
}
