use std::collections::HashMap;

use chrono::{DateTime, Utc};
use planhist_types::ProjectSnapshot;

use crate::codec::encode_snapshot;
use crate::error::{HistoryError, HistoryResult};
use crate::traits::VersionHistory;
use crate::version::{VersionId, VersionInfo};

/// In-memory version history.
///
/// Intended for tests and embedding. Versions are assigned sequential ids
/// (`v1`, `v2`, ...) in the order they are recorded. Snapshots are stored
/// encoded so that reads go through the same codec as on-disk histories.
#[derive(Debug, Default)]
pub struct InMemoryHistory {
    versions: Vec<VersionInfo>,
    files: HashMap<VersionId, Vec<u8>>,
}

impl InMemoryHistory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.versions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.versions.is_empty()
    }

    /// Record a new version holding `snapshot`.
    pub fn record(
        &mut self,
        author: &str,
        timestamp: DateTime<Utc>,
        snapshot: &ProjectSnapshot,
    ) -> HistoryResult<VersionId> {
        let bytes = encode_snapshot(snapshot)
            .map_err(|e| HistoryError::Serialization(e.to_string()))?;
        Ok(self.record_raw(author, timestamp, Some(bytes)))
    }

    /// Record a version with raw snapshot bytes, or with no retained
    /// snapshot at all when `bytes` is `None`.
    pub fn record_raw(
        &mut self,
        author: &str,
        timestamp: DateTime<Utc>,
        bytes: Option<Vec<u8>>,
    ) -> VersionId {
        let id = VersionId::new(format!("v{}", self.versions.len() + 1));
        self.versions
            .push(VersionInfo::new(id.clone(), author, timestamp));
        if let Some(bytes) = bytes {
            self.files.insert(id.clone(), bytes);
        }
        id
    }
}

impl VersionHistory for InMemoryHistory {
    fn versions(&self) -> HistoryResult<Vec<VersionInfo>> {
        Ok(self.versions.clone())
    }

    fn snapshot_bytes(&self, version: &VersionId) -> HistoryResult<Vec<u8>> {
        if !self.versions.iter().any(|v| &v.id == version) {
            return Err(HistoryError::UnknownVersion(version.clone()));
        }
        self.files
            .get(version)
            .cloned()
            .ok_or_else(|| HistoryError::NotFound {
                version: version.clone(),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use planhist_types::{NodeId, SnapshotBuilder, TeamRoster, TreeKind};

    fn at(hour: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 1, hour, 0, 0).unwrap()
    }

    fn snapshot(name: &str) -> ProjectSnapshot {
        let wbs = SnapshotBuilder::new("WBS")
            .node(NodeId::ROOT, 1, name)
            .build()
            .unwrap();
        ProjectSnapshot::new(TeamRoster::default(), wbs)
    }

    #[test]
    fn records_and_fetches() {
        let mut history = InMemoryHistory::new();
        let v1 = history.record("alice", at(9), &snapshot("A")).unwrap();
        let v2 = history.record("bob", at(10), &snapshot("B")).unwrap();

        assert_eq!(history.len(), 2);
        assert_eq!(history.author_of(&v2).unwrap(), "bob");
        assert_eq!(history.timestamp_of(&v1).unwrap(), at(9));
        let fetched = history.fetch_snapshot(&v2).unwrap();
        assert_eq!(fetched.tree(TreeKind::Wbs).name(NodeId::new(1)), Some("B"));
    }

    #[test]
    fn missing_snapshot_is_not_found() {
        let mut history = InMemoryHistory::new();
        let v1 = history.record_raw("alice", at(9), None);
        let err = history.fetch_snapshot(&v1).unwrap_err();
        assert!(err.is_not_found());
    }

    #[test]
    fn unknown_version_is_not_not_found() {
        let history = InMemoryHistory::new();
        let err = history.fetch_snapshot(&VersionId::new("nope")).unwrap_err();
        assert!(matches!(err, HistoryError::UnknownVersion(_)));
        assert!(!err.is_not_found());
    }

    #[test]
    fn malformed_snapshot_reported() {
        let mut history = InMemoryHistory::new();
        let v1 = history.record_raw("alice", at(9), Some(b"[1,2".to_vec()));
        let err = history.fetch_snapshot(&v1).unwrap_err();
        assert!(matches!(err, HistoryError::Malformed { .. }));
    }
}
