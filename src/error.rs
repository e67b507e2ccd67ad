//! Error types for u-statprofile.

use serde::Serialize;
use thiserror::Error;

/// All errors produced by u-statprofile operations.
#[derive(Debug, Clone, PartialEq, Error, Serialize)]
pub enum ProfileError {
    /// The dataset cannot be profiled or a column is malformed. Fatal to
    /// the call.
    #[error("invalid input: {reason}")]
    InvalidInput { reason: String },
    /// A single statistical test could not be computed.
    ///
    /// Recovered inside the advisor and recorded against the variable;
    /// it never escapes a `recommend` call.
    #[error("statistical test failed for '{variable}': {reason}")]
    StatisticalTestFailure { variable: String, reason: String },
    /// Column length does not match the dataset row count.
    #[error("expected {expected} elements, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },
    /// CSV parsing failed.
    #[error("CSV parse error at line {line}: {message}")]
    CsvParse { line: usize, message: String },
}

impl ProfileError {
    pub(crate) fn invalid_input(reason: impl Into<String>) -> Self {
        Self::InvalidInput {
            reason: reason.into(),
        }
    }
}
