//! Error types for the blame crate.

use planhist_diff::DiffError;
use planhist_history::HistoryError;
use planhist_types::TypeError;

/// Errors that can occur during blame attribution.
#[derive(Debug, thiserror::Error)]
pub enum BlameError {
    #[error("diff failed: {0}")]
    Diff(#[from] DiffError),

    #[error("history error: {0}")]
    History(#[from] HistoryError),

    /// An attribute value could not be interpreted.
    #[error("invalid attribute value: {0}")]
    Content(#[from] TypeError),
}

/// Convenience alias for blame results.
pub type BlameResult<T> = Result<T, BlameError>;
