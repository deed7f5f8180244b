use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::debug;

use planhist_history::{VersionHistory, VersionId, VersionInfo};
use planhist_types::attrs::AttrKind;
use planhist_types::{NodeId, ProjectSnapshot, TeamRoster, TreeKind};

use crate::content::ContentTree;
use crate::error::DiffResult;
use crate::tree_diff::{NodeChange, TreeDiff};

/// The diff of one tree across one version transition (A before, B after).
///
/// Changes are attributed to B's author and timestamp. When A and B are not
/// adjacent (merged consecutive versions), nodes created and removed between
/// them never appear in either snapshot and so never surface as changes.
#[derive(Clone, Debug)]
pub struct ProjectDiff {
    version_a: VersionInfo,
    version_b: VersionInfo,
    diff: TreeDiff,
}

impl ProjectDiff {
    /// Fetch both snapshots and diff them.
    ///
    /// Snapshots already held by `prior` are reused instead of fetched. If
    /// the oldest version in history has no retained snapshot it is treated
    /// as an empty project; any other missing snapshot is returned as a
    /// not-found error.
    pub fn compute<H: VersionHistory + ?Sized>(
        history: &H,
        version_a: &VersionInfo,
        version_b: &VersionInfo,
        kind: TreeKind,
        prior: Option<&ProjectDiff>,
    ) -> DiffResult<Self> {
        let snapshot_a = load_snapshot(history, version_a, prior)?;
        let snapshot_b = load_snapshot(history, version_b, prior)?;
        Self::from_snapshots(
            version_a.clone(),
            version_b.clone(),
            snapshot_a,
            snapshot_b,
            kind,
        )
    }

    /// Diff two snapshots that are already in memory.
    pub fn from_snapshots(
        version_a: VersionInfo,
        version_b: VersionInfo,
        snapshot_a: Arc<ProjectSnapshot>,
        snapshot_b: Arc<ProjectSnapshot>,
        kind: TreeKind,
    ) -> DiffResult<Self> {
        let remap = snapshot_b.team().initials_changes(snapshot_a.team());
        if !remap.is_empty() {
            debug!(version = %version_b.id, renamed = remap.len(), "remapping changed initials");
        }
        let base = ContentTree::with_initials_remap(snapshot_a, kind, &remap)?;
        let modified = ContentTree::new(snapshot_b, kind)?;
        let diff = TreeDiff::compute(base, modified);
        debug!(
            from = %version_a.id,
            to = %version_b.id,
            tree = %kind,
            changes = diff.len(),
            "computed diff"
        );
        Ok(Self {
            version_a,
            version_b,
            diff,
        })
    }

    pub fn version_a(&self) -> &VersionInfo {
        &self.version_a
    }

    pub fn version_b(&self) -> &VersionInfo {
        &self.version_b
    }

    /// Nominal author of the transition.
    pub fn author(&self) -> &str {
        &self.version_b.author
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        self.version_b.timestamp
    }

    /// The team as of version B.
    pub fn team(&self) -> &TeamRoster {
        self.diff.modified().team()
    }

    /// Display name for a member's initials, looked up in B's team, then
    /// A's team.
    pub fn member_name(&self, initials: &str) -> String {
        self.diff
            .modified()
            .team()
            .by_initials(initials)
            .or_else(|| self.diff.base().team().by_initials(initials))
            .map(|m| m.name.clone())
            .unwrap_or_else(|| initials.to_string())
    }

    /// Classify a changed attribute against B's team, falling back to A's
    /// for members who left.
    pub fn classify<'a>(&self, attr: &'a str) -> AttrKind<'a> {
        match self.diff.modified().classify(attr) {
            AttrKind::Other => self.diff.base().classify(attr),
            kind => kind,
        }
    }

    pub fn kind(&self) -> TreeKind {
        self.diff.modified().kind()
    }

    pub fn tree_diff(&self) -> &TreeDiff {
        &self.diff
    }

    pub fn changes(&self) -> &[NodeChange] {
        self.diff.changes()
    }

    pub fn base(&self) -> &ContentTree {
        self.diff.base()
    }

    pub fn modified(&self) -> &ContentTree {
        self.diff.modified()
    }

    pub fn is_empty(&self) -> bool {
        self.diff.is_empty()
    }

    /// Full name of a node's path in whichever snapshot holds it.
    pub fn node_path(&self, id: NodeId) -> String {
        let modified = self.diff.modified().tree();
        if modified.contains(id) {
            modified.path(id)
        } else {
            self.diff.base().tree().path(id)
        }
    }

    /// A snapshot this diff already holds for `version`, if any.
    pub fn snapshot_for(&self, version: &VersionId) -> Option<&Arc<ProjectSnapshot>> {
        if *version == self.version_b.id {
            Some(self.diff.modified().snapshot())
        } else if *version == self.version_a.id {
            Some(self.diff.base().snapshot())
        } else {
            None
        }
    }
}

fn load_snapshot<H: VersionHistory + ?Sized>(
    history: &H,
    version: &VersionInfo,
    prior: Option<&ProjectDiff>,
) -> DiffResult<Arc<ProjectSnapshot>> {
    if let Some(snapshot) = prior.and_then(|p| p.snapshot_for(&version.id)) {
        return Ok(Arc::clone(snapshot));
    }
    match history.fetch_snapshot(&version.id) {
        Ok(snapshot) => Ok(Arc::new(snapshot)),
        Err(e) if e.is_not_found() => {
            let oldest = history.versions_oldest_first()?.into_iter().next();
            if oldest.is_some_and(|v| v.id == version.id) {
                debug!(version = %version.id, "no snapshot for first version; using empty project");
                Ok(Arc::new(ProjectSnapshot::empty()))
            } else {
                Err(e.into())
            }
        }
        Err(e) => Err(e.into()),
    }
}
