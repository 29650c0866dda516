//! Error types for the prediction pipeline.
//!
//! The request path distinguishes caller mistakes (`InvalidInput`) from
//! failures of the external scoring capability (`ScorerFailure`, `Timeout`).
//! No variant is recovered from locally: every error propagates to the
//! caller, and no default prediction is ever fabricated.

use std::time::Duration;
use thiserror::Error;

/// Errors surfaced by tokenization, scoring, and interpretation.
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum PredictError {
    /// The caller-supplied price series cannot be tokenized
    /// (empty, or contains zero / non-finite values).
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// The external scorer failed or produced malformed output
    /// (wrong-length score vector, non-finite scores, runtime error).
    #[error("scorer failure: {0}")]
    ScorerFailure(String),

    /// Inference did not complete within the configured deadline.
    #[error("inference timed out after {0:?}")]
    Timeout(Duration),
}

impl From<ort::Error> for PredictError {
    fn from(err: ort::Error) -> Self {
        PredictError::ScorerFailure(err.to_string())
    }
}
