use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::attrs::NODE_NAME_ATTR;

/// Stable identifier of a work-breakdown node.
///
/// Identifiers are unique within a project and are reused by every snapshot
/// in which the node survives, which is what makes cross-snapshot matching
/// possible. Negative identifiers are reserved for synthetic roots.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeId(i32);

impl NodeId {
    /// The synthetic root shared by every snapshot of a tree.
    pub const ROOT: NodeId = NodeId(-1);

    pub const fn new(raw: i32) -> Self {
        Self(raw)
    }

    pub const fn get(self) -> i32 {
        self.0
    }

    /// Returns `true` for synthetic (negative) identifiers.
    pub const fn is_root(self) -> bool {
        self.0 < 0
    }
}

impl From<i32> for NodeId {
    fn from(raw: i32) -> Self {
        Self(raw)
    }
}

impl fmt::Debug for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "NodeId({})", self.0)
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// The diffable content of a node: its attributes plus its display name
/// stored under [`NODE_NAME_ATTR`].
pub type NodeContent = BTreeMap<String, String>;

/// A single node of a work-breakdown tree.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct WbsNode {
    pub id: NodeId,
    pub name: String,
    /// Ordered child identifiers.
    pub children: Vec<NodeId>,
    /// String-encoded attribute values; numbers are parsed on demand.
    pub attributes: BTreeMap<String, String>,
}

impl WbsNode {
    pub fn new(id: impl Into<NodeId>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            children: Vec::new(),
            attributes: BTreeMap::new(),
        }
    }

    pub fn with_attr(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes.insert(name.into(), value.into());
        self
    }

    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attributes.get(name).map(String::as_str)
    }

    pub fn is_leaf(&self) -> bool {
        self.children.is_empty()
    }

    /// Attributes plus the display name, as compared by the diff engine.
    pub fn content(&self) -> NodeContent {
        let mut content = self.attributes.clone();
        content.insert(NODE_NAME_ATTR.to_string(), self.name.clone());
        content
    }
}
