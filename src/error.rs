//! Crate error type.
//!
//! Only structural failures surface as errors; per-value anomalies are
//! recovered locally by the engines and never abort a run.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ProbeError {
    /// The row intuition engine was handed an empty head window.
    #[error("head rows must be a non-empty materialized sequence")]
    EmptyHeadRows,

    /// No qualifying data pattern emerged within the attempt limit.
    #[error("failed to find a data pattern within {attempts} window attempts")]
    DataPattern { attempts: usize },

    /// The statistics driver was constructed from a schema with no columns.
    #[error("schema supplied no usable columns")]
    EmptySchema,

    /// A row handed to the statistics driver lacked a schema column.
    #[error("row {row} is missing expected column '{column}'")]
    MissingColumn { column: String, row: usize },

    /// Lookup by position or label matched no column.
    #[error("column '{0}' not found")]
    UnknownColumn(String),
}
