//! Reported changes and their display rows.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::Serialize;

use planhist_types::{NodeId, TreeSnapshot};

use crate::time_change::ProjectTimeChange;

/// A node as it appears in one snapshot.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct NodeRef {
    pub id: NodeId,
    pub name: String,
    pub path: String,
    /// Outline position, used to order changes top to bottom.
    #[serde(skip)]
    pub position: Vec<usize>,
}

impl NodeRef {
    /// Look a node up in `tree`. Returns `None` if the tree lacks it.
    pub fn locate(tree: &TreeSnapshot, id: NodeId) -> Option<Self> {
        let name = tree.name(id)?.to_string();
        Some(Self {
            id,
            name,
            path: tree.path(id),
            position: tree.position(id),
        })
    }
}

impl fmt::Display for NodeRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "task {} ({})", self.name, self.id)
    }
}

/// One line of a rendered change.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ChangeRow {
    pub indent: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub icon: Option<String>,
    pub message: String,
    /// Rows sharing a group expand and collapse together under the group's
    /// first row.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub group: Option<NodeId>,
}

impl ChangeRow {
    fn new(indent: usize, icon: &str, message: String, group: NodeId) -> Self {
        Self {
            indent,
            icon: Some(icon.to_string()),
            message,
            group: Some(group),
        }
    }
}

/// What happened to one child node.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum NodeChangeKind {
    Added,
    Deleted,
    /// Moved here; `from` is the old parent's path.
    Moved { from: String },
    /// Renamed; `from` is the old name.
    Renamed { from: String },
}

impl NodeChangeKind {
    pub fn icon(&self) -> &'static str {
        match self {
            Self::Added => "node-added",
            Self::Deleted => "node-deleted",
            Self::Moved { .. } => "node-moved",
            Self::Renamed { .. } => "node-renamed",
        }
    }

    fn describe(&self, name: &str) -> String {
        match self {
            Self::Added => format!("added {name}"),
            Self::Deleted => format!("deleted {name}"),
            Self::Moved { from } => format!("moved {name} from {from}"),
            Self::Renamed { from } => format!("renamed {from} to {name}"),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct NodeChangeEntry {
    pub node: NodeRef,
    pub kind: NodeChangeKind,
}

/// Structural changes to the children of one parent node.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ProjectNodeChange {
    pub parent: NodeRef,
    /// Ordered by the children's outline position.
    pub children: Vec<NodeChangeEntry>,
    pub author: String,
    pub timestamp: DateTime<Utc>,
    pub is_last_change: bool,
}

impl ProjectNodeChange {
    pub fn new(parent: NodeRef, author: impl Into<String>, timestamp: DateTime<Utc>) -> Self {
        Self {
            parent,
            children: Vec::new(),
            author: author.into(),
            timestamp,
            is_last_change: false,
        }
    }

    pub fn add(&mut self, node: NodeRef, kind: NodeChangeKind) {
        let at = self
            .children
            .partition_point(|e| e.node.position <= node.position);
        self.children.insert(at, NodeChangeEntry { node, kind });
    }

    pub fn description(&self) -> String {
        let parts: Vec<String> = self
            .children
            .iter()
            .map(|e| e.kind.describe(&e.node.name))
            .collect();
        format!("under {}: {}", self.parent.path, parts.join("; "))
    }

    pub fn rows(&self) -> Vec<ChangeRow> {
        let group = self.parent.id;
        let mut rows = vec![ChangeRow::new(0, "node", self.parent.path.clone(), group)];
        rows.extend(self.children.iter().map(|e| {
            ChangeRow::new(1, e.kind.icon(), e.kind.describe(&e.node.name), group)
        }));
        rows
    }
}

/// One entry of a change list.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ProjectChange {
    Node(ProjectNodeChange),
    Time(ProjectTimeChange),
}

impl ProjectChange {
    pub fn author(&self) -> &str {
        match self {
            Self::Node(c) => &c.author,
            Self::Time(c) => &c.author,
        }
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        match self {
            Self::Node(c) => c.timestamp,
            Self::Time(c) => c.timestamp,
        }
    }

    /// Set on the final change of a scanned range.
    pub fn is_last_change(&self) -> bool {
        match self {
            Self::Node(c) => c.is_last_change,
            Self::Time(c) => c.is_last_change,
        }
    }

    pub(crate) fn set_last_change(&mut self, last: bool) {
        match self {
            Self::Node(c) => c.is_last_change = last,
            Self::Time(c) => c.is_last_change = last,
        }
    }

    /// The node the change is reported under.
    pub fn node(&self) -> &NodeRef {
        match self {
            Self::Node(c) => &c.parent,
            Self::Time(c) => &c.node,
        }
    }

    pub fn description(&self) -> String {
        match self {
            Self::Node(c) => c.description(),
            Self::Time(c) => format!("{} {}", c.node, c.description),
        }
    }

    pub fn rows(&self) -> Vec<ChangeRow> {
        match self {
            Self::Node(c) => c.rows(),
            Self::Time(c) => c.rows(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use planhist_types::SnapshotBuilder;

    fn tree() -> TreeSnapshot {
        SnapshotBuilder::new("WBS")
            .node(NodeId::ROOT, 1, "Phase")
            .node(1, 2, "Design")
            .node(1, 3, "Build")
            .build()
            .unwrap()
    }

    fn at() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 1, 9, 0, 0).unwrap()
    }

    #[test]
    fn children_are_kept_in_outline_order() {
        let tree = tree();
        let parent = NodeRef::locate(&tree, NodeId::new(1)).unwrap();
        let mut change = ProjectNodeChange::new(parent, "alice", at());
        change.add(
            NodeRef::locate(&tree, NodeId::new(3)).unwrap(),
            NodeChangeKind::Added,
        );
        change.add(
            NodeRef::locate(&tree, NodeId::new(2)).unwrap(),
            NodeChangeKind::Renamed {
                from: "Draft".into(),
            },
        );

        assert_eq!(
            change.description(),
            "under /Phase: renamed Draft to Design; added Build"
        );
        let rows = change.rows();
        assert_eq!(rows.len(), 3);
        assert_eq!(rows[0].message, "/Phase");
        assert_eq!(rows[1].icon.as_deref(), Some("node-renamed"));
        assert!(rows.iter().all(|r| r.group == Some(NodeId::new(1))));
    }

    #[test]
    fn missing_node_cannot_be_located() {
        assert!(NodeRef::locate(&tree(), NodeId::new(99)).is_none());
    }
}
