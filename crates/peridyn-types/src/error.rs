//! Error types for the peridyn engine.
//!
//! All crates return `PeridynResult<T>` from fallible operations.

use thiserror::Error;

/// Unified error type for the peridyn engine.
#[derive(Debug, Error)]
pub enum PeridynError {
    /// Configuration value is invalid (detected at construction).
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Point cloud data is malformed or inconsistent.
    #[error("Invalid body: {0}")]
    InvalidBody(String),

    /// Material parameter is out of valid range.
    #[error("Invalid material parameter: {0}")]
    InvalidMaterial(String),

    /// Domain decomposition could not be built.
    #[error("Decomposition error: {0}")]
    Decomposition(String),

    /// A previously validated object was found in an invalid state.
    #[error("Consistency check failed: {0}")]
    Consistency(String),

    /// A simulation invariant was violated (e.g., non-finite force density).
    #[error("Invariant violation: {0}")]
    InvariantViolation(String),

    /// A worker aborted the run; every sibling worker fails with this error.
    #[error("Worker rank {rank} aborted the run: {reason}")]
    WorkerFailure {
        rank: usize,
        reason: String,
    },

    /// Result export failed. Never fatal inside the time loop.
    #[error("Export error: {0}")]
    Export(String),

    /// I/O operation failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization/deserialization failure.
    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl PeridynError {
    /// Returns true for errors that are raised before any stepping begins.
    pub fn is_setup_error(&self) -> bool {
        matches!(
            self,
            PeridynError::InvalidConfig(_)
                | PeridynError::InvalidBody(_)
                | PeridynError::InvalidMaterial(_)
                | PeridynError::Decomposition(_)
        )
    }
}

/// Convenience alias for `Result<T, PeridynError>`.
pub type PeridynResult<T> = Result<T, PeridynError>;
