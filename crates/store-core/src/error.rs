//! Store error types.

use thiserror::Error;

/// Errors surfaced by store collaborators.
///
/// These are transient infrastructure failures; callers treat them as
/// "assume unavailable, continue conservatively" rather than crashing.
#[derive(Debug, Clone, Error)]
pub enum StoreError {
    /// Backing service could not be reached.
    #[error("store unavailable: {0}")]
    Unavailable(String),

    /// Operation exceeded its deadline.
    #[error("store operation timed out")]
    Timeout,

    /// Row/record was not found.
    #[error("not found: {0}")]
    NotFound(String),

    /// Serializable transaction conflict; the transaction was rolled back.
    #[error("transaction conflict: {0}")]
    Conflict(String),
}

pub type StoreResult<T> = Result<T, StoreError>;
