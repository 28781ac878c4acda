//! Domain error model.

use thiserror::Error;

use crate::status::JobStatus;

/// Result type used across the domain layer.
pub type DomainResult<T> = Result<T, DomainError>;

/// Domain-level error.
///
/// Keep this focused on deterministic failures (validation, state machine
/// violations, field ownership). Storage and transport concerns belong to the
/// infrastructure crates.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DomainError {
    /// A value failed validation (e.g. malformed input).
    #[error("validation failed: {0}")]
    Validation(String),

    /// A record invariant was violated (missing required field, foreign field write).
    #[error("invariant violated: {0}")]
    InvariantViolation(String),

    /// A status change that is not an edge of the job state machine.
    #[error("illegal transition: {from} -> {to}")]
    IllegalTransition { from: JobStatus, to: JobStatus },

    /// An identifier was invalid (e.g. blank job id).
    #[error("invalid identifier: {0}")]
    InvalidId(String),
}

impl DomainError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn invariant(msg: impl Into<String>) -> Self {
        Self::InvariantViolation(msg.into())
    }

    pub fn invalid_id(msg: impl Into<String>) -> Self {
        Self::InvalidId(msg.into())
    }
}
