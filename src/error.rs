//! Error types for the search pipeline.
//!
//! Duplicate candidates and convergence are not errors: duplicates are
//! counted in round statistics and convergence ends the loop through
//! [`crate::search::StopReason`].

use std::path::PathBuf;

use thiserror::Error;

/// Failure reported by an [`crate::oracle::Oracle`] implementation.
#[derive(Debug, Error)]
pub enum OracleError {
    /// Parameter vector has the wrong number of entries.
    #[error("expected {expected} parameters, got {actual}")]
    Arity { expected: usize, actual: usize },

    /// An index falls outside the parameter's value vector.
    #[error("parameter {param} index {index} out of range (len {len})")]
    OutOfRange {
        param: usize,
        index: usize,
        len: usize,
    },

    /// The evaluator itself failed (simulator crash, missing sweep data).
    #[error("evaluation failed: {0}")]
    Failed(String),
}

/// Errors surfaced by the search phases.
#[derive(Debug, Error)]
pub enum SearchError {
    /// A configuration value cannot work with the given pool or space.
    #[error("invalid configuration: {message}")]
    InvalidConfiguration { message: String },

    /// A design without a cost was offered to the evaluated pool.
    #[error("design {params:?} has not been evaluated")]
    UnevaluatedDesign { params: Vec<usize> },

    /// The oracle failed; the current round is aborted.
    #[error("oracle: {0}")]
    Oracle(#[from] OracleError),

    /// Model or metadata checkpoint could not be written or read.
    #[error("checkpoint {}: {message}", path.display())]
    Checkpoint { path: PathBuf, message: String },

    #[error("io: {0}")]
    Io(#[from] std::io::Error),

    #[error("json: {0}")]
    Json(#[from] serde_json::Error),
}

impl SearchError {
    /// Create an InvalidConfiguration error.
    pub fn invalid(message: impl Into<String>) -> Self {
        Self::InvalidConfiguration {
            message: message.into(),
        }
    }

    /// Create a Checkpoint error for `path`.
    pub fn checkpoint(path: impl Into<PathBuf>, message: impl std::fmt::Display) -> Self {
        Self::Checkpoint {
            path: path.into(),
            message: message.to_string(),
        }
    }
}

pub type Result<T, E = SearchError> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn messages_name_the_offending_value() {
        let err = SearchError::invalid("k_top (20) must be smaller than the pool (10)");
        assert_eq!(
            err.to_string(),
            "invalid configuration: k_top (20) must be smaller than the pool (10)"
        );

        let err: SearchError = OracleError::OutOfRange {
            param: 1,
            index: 12,
            len: 10,
        }
        .into();
        assert_eq!(
            err.to_string(),
            "oracle: parameter 1 index 12 out of range (len 10)"
        );

        let err = SearchError::checkpoint("/tmp/ckpt/comparator.mpk", "missing");
        assert_eq!(err.to_string(), "checkpoint /tmp/ckpt/comparator.mpk: missing");
    }
}
