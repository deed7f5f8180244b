use chrono::{DateTime, Utc};
use planhist_types::ProjectSnapshot;

use crate::codec::decode_snapshot;
use crate::error::{HistoryError, HistoryResult};
use crate::version::{VersionId, VersionInfo};

/// Source of historical project versions.
///
/// Implementations must satisfy these invariants:
/// - Snapshots are immutable: fetching the same version twice yields the
///   same content.
/// - A snapshot that is not retained is reported as
///   [`HistoryError::NotFound`], never as an I/O failure.
/// - Calls may be slow or remote; callers never assume caching.
pub trait VersionHistory: Send + Sync {
    /// Every known version. Implementations may return them oldest-first or
    /// newest-first; use [`versions_oldest_first`] for a normalized order.
    ///
    /// [`versions_oldest_first`]: VersionHistory::versions_oldest_first
    fn versions(&self) -> HistoryResult<Vec<VersionInfo>>;

    /// Raw bytes of the snapshot file as of `version`.
    fn snapshot_bytes(&self, version: &VersionId) -> HistoryResult<Vec<u8>>;

    /// Fetch and decode the project snapshot as of `version`.
    fn fetch_snapshot(&self, version: &VersionId) -> HistoryResult<ProjectSnapshot> {
        let bytes = self.snapshot_bytes(version)?;
        decode_snapshot(&bytes).map_err(|source| HistoryError::Malformed {
            version: version.clone(),
            source,
        })
    }

    /// Versions sorted by timestamp, oldest first. Ties keep provider order.
    fn versions_oldest_first(&self) -> HistoryResult<Vec<VersionInfo>> {
        let mut versions = self.versions()?;
        let newest_first = versions.len() > 1
            && versions.first().map(|v| v.timestamp) > versions.last().map(|v| v.timestamp);
        if newest_first {
            versions.reverse();
        }
        versions.sort_by_key(|v| v.timestamp);
        Ok(versions)
    }

    fn info(&self, version: &VersionId) -> HistoryResult<VersionInfo> {
        self.versions()?
            .into_iter()
            .find(|v| &v.id == version)
            .ok_or_else(|| HistoryError::UnknownVersion(version.clone()))
    }

    fn author_of(&self, version: &VersionId) -> HistoryResult<String> {
        self.info(version).map(|v| v.author)
    }

    fn timestamp_of(&self, version: &VersionId) -> HistoryResult<DateTime<Utc>> {
        self.info(version).map(|v| v.timestamp)
    }
}
