//! Error types for the diff crate.

use planhist_history::HistoryError;
use planhist_types::TypeError;

/// Errors that can occur while computing a diff.
#[derive(Debug, thiserror::Error)]
pub enum DiffError {
    /// Fetching a snapshot failed.
    #[error("history error: {0}")]
    History(#[from] HistoryError),

    /// Snapshot content could not be interpreted (e.g. a non-numeric time).
    #[error("invalid snapshot content: {0}")]
    Content(#[from] TypeError),
}

impl DiffError {
    /// Returns `true` when the failure means history does not reach back
    /// far enough.
    pub fn is_not_found(&self) -> bool {
        matches!(self, DiffError::History(e) if e.is_not_found())
    }
}

/// Convenience alias for diff results.
pub type DiffResult<T> = Result<T, DiffError>;
