use planhist_types::TypeError;

use crate::version::VersionId;

/// Errors from version history providers.
#[derive(Debug, thiserror::Error)]
pub enum HistoryError {
    /// The snapshot predates retained history. Scans treat this as the end
    /// of searchable history rather than a failure.
    #[error("snapshot for version {version} not found")]
    NotFound { version: VersionId },

    /// The version is not part of this history.
    #[error("unknown version {0}")]
    UnknownVersion(VersionId),

    /// The snapshot exists but its content cannot be parsed into a tree.
    #[error("malformed snapshot for version {version}: {source}")]
    Malformed {
        version: VersionId,
        #[source]
        source: TypeError,
    },

    /// A version id that cannot be mapped to storage.
    #[error("invalid version id {0:?}")]
    InvalidVersionId(String),

    /// I/O error from the underlying storage.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The version manifest could not be read or written.
    #[error("serialization error: {0}")]
    Serialization(String),
}

impl HistoryError {
    /// Returns `true` when history simply does not reach back this far.
    pub fn is_not_found(&self) -> bool {
        matches!(self, HistoryError::NotFound { .. })
    }
}

/// Result alias for history operations.
pub type HistoryResult<T> = Result<T, HistoryError>;
