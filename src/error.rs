//! Error types returned by the analysis pipeline.

use thiserror::Error as ThisError;

/// Error surfaced to a caller of the analysis pipeline.
///
/// Only [`AnalysisError::InputError`] and [`AnalysisError::ValidationError`] are meant to
/// terminate a run; every other failure mode named in the design (memory budget overruns,
/// degenerate interfaces, disconnected components) is handled internally and only logged.
#[non_exhaustive]
#[derive(Debug, ThisError)]
pub enum AnalysisError {
    /// The input mesh or configuration is unusable (missing, empty, or out of range).
    #[error("invalid input: {0}")]
    InputError(String),
    /// The assembled record failed schema validation. The record is still produced; see
    /// [`crate::assembler::ValidationReport`] for the offending checks.
    #[error("validation failed: {0}")]
    ValidationError(String),
    /// Any other error not represented by a more specific variant.
    #[error("unknown error")]
    Unknown(#[from] anyhow::Error),
}

pub type Result<T> = std::result::Result<T, AnalysisError>;
