use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use tracing::debug;

use planhist_types::ProjectSnapshot;

use crate::codec::encode_snapshot;
use crate::error::{HistoryError, HistoryResult};
use crate::traits::VersionHistory;
use crate::version::{VersionId, VersionInfo};

/// Name of the version manifest inside a history directory.
pub const MANIFEST_FILE: &str = "versions.json";

/// Directory holding one snapshot file per version.
pub const SNAPSHOT_DIR: &str = "snapshots";

/// Version history stored in a plain directory.
///
/// Layout:
/// ```text
/// <root>/versions.json          [{"id": "...", "author": "...", "timestamp": "..."}]
/// <root>/snapshots/<id>.json    one project snapshot per version
/// ```
///
/// The manifest may list more versions than there are snapshot files (for
/// example after old snapshots were pruned); those versions report
/// [`HistoryError::NotFound`].
#[derive(Debug, Clone)]
pub struct DirectoryHistory {
    root: PathBuf,
}

impl DirectoryHistory {
    pub fn open(root: impl Into<PathBuf>) -> HistoryResult<Self> {
        let root = root.into();
        if !root.join(MANIFEST_FILE).is_file() {
            return Err(HistoryError::Io(io::Error::new(
                io::ErrorKind::NotFound,
                format!("no {MANIFEST_FILE} in {}", root.display()),
            )));
        }
        Ok(Self { root })
    }

    /// Create an empty history directory.
    pub fn create(root: impl Into<PathBuf>) -> HistoryResult<Self> {
        let root = root.into();
        fs::create_dir_all(root.join(SNAPSHOT_DIR))?;
        let history = Self { root };
        history.write_manifest(&[])?;
        Ok(history)
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Append a version to the manifest and store its snapshot.
    pub fn record(
        &self,
        id: &str,
        author: &str,
        timestamp: DateTime<Utc>,
        snapshot: &ProjectSnapshot,
    ) -> HistoryResult<VersionId> {
        let id = VersionId::new(id);
        let path = self.snapshot_path(&id)?;
        let bytes = encode_snapshot(snapshot)
            .map_err(|e| HistoryError::Serialization(e.to_string()))?;
        fs::write(&path, bytes)?;

        let mut versions = self.versions()?;
        versions.push(VersionInfo::new(id.clone(), author, timestamp));
        self.write_manifest(&versions)?;
        debug!(version = %id, path = %path.display(), "recorded version");
        Ok(id)
    }

    fn write_manifest(&self, versions: &[VersionInfo]) -> HistoryResult<()> {
        let json = serde_json::to_vec_pretty(versions)
            .map_err(|e| HistoryError::Serialization(e.to_string()))?;
        fs::write(self.root.join(MANIFEST_FILE), json)?;
        Ok(())
    }

    fn snapshot_path(&self, version: &VersionId) -> HistoryResult<PathBuf> {
        let id = version.as_str();
        let valid = !id.is_empty()
            && id != "."
            && id != ".."
            && !id.contains(['/', '\\'])
            && !id.contains('\0');
        if !valid {
            return Err(HistoryError::InvalidVersionId(id.to_string()));
        }
        Ok(self.root.join(SNAPSHOT_DIR).join(format!("{id}.json")))
    }
}

impl VersionHistory for DirectoryHistory {
    fn versions(&self) -> HistoryResult<Vec<VersionInfo>> {
        let bytes = fs::read(self.root.join(MANIFEST_FILE))?;
        serde_json::from_slice(&bytes).map_err(|e| HistoryError::Serialization(e.to_string()))
    }

    fn snapshot_bytes(&self, version: &VersionId) -> HistoryResult<Vec<u8>> {
        let path = self.snapshot_path(version)?;
        match fs::read(&path) {
            Ok(bytes) => Ok(bytes),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Err(HistoryError::NotFound {
                version: version.clone(),
            }),
            Err(e) => Err(e.into()),
        }
    }
}
