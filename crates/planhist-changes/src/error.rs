//! Error types for the change-list crate.

use planhist_diff::DiffError;
use planhist_history::HistoryError;
use planhist_types::TypeError;

/// Errors that can occur while building a change list.
#[derive(Debug, thiserror::Error)]
pub enum ChangeError {
    #[error("diff failed: {0}")]
    Diff(#[from] DiffError),

    #[error("history error: {0}")]
    History(#[from] HistoryError),

    #[error("invalid attribute value: {0}")]
    Content(#[from] TypeError),
}

/// Convenience alias for change-list results.
pub type ChangeResult<T> = Result<T, ChangeError>;
