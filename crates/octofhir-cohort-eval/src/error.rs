//! Evaluation errors for the cohort engine

use octofhir_cohort_model::{ResolutionError, StoreError, ValidationError};
use thiserror::Error;

/// Result type for evaluation operations
pub type EvalResult<T> = Result<T, EvalError>;

/// Errors that can occur while running a cohort query
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum EvalError {
    /// Criteria rejected before any work was done
    #[error("Invalid criteria: {0}")]
    Validation(#[from] ValidationError),

    /// Concept selector could not be expanded
    #[error("Concept resolution failed: {0}")]
    Resolution(#[from] ResolutionError),

    /// Patient store failure
    #[error("Patient store error: {0}")]
    Store(#[from] StoreError),

    /// Whole operation exceeded its deadline
    #[error("Evaluation timeout after {seconds} seconds")]
    Timeout { seconds: u64 },

    /// Internal error
    #[error("Internal evaluation error: {message}")]
    Internal { message: String },
}

impl EvalError {
    /// Create an internal error
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// Create a timeout error
    pub fn timeout(seconds: u64) -> Self {
        Self::Timeout { seconds }
    }

    /// True for failures caused by the request itself
    pub fn is_client_error(&self) -> bool {
        matches!(self, Self::Validation(_) | Self::Resolution(ResolutionError::UnknownSubset(_)))
    }
}
