//! Immutable tree snapshots.
//!
//! A [`TreeSnapshot`] is a forest of [`WbsNode`]s hung under a synthetic root
//! ([`NodeId::ROOT`]). Snapshots are validated on construction:
//!
//! - node identifiers are unique;
//! - every child reference resolves to a node in the snapshot;
//! - every node has at most one parent and is reachable from the root.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{TypeError, TypeResult};
use crate::node::{NodeId, WbsNode};
use crate::team::TeamRoster;

/// The kinds of tree a project version carries.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TreeKind {
    /// The work-breakdown structure (project plan).
    Wbs,
    /// Reusable workflow definitions.
    Workflows,
}

impl TreeKind {
    pub const ALL: [TreeKind; 2] = [TreeKind::Wbs, TreeKind::Workflows];

    /// Display name given to the synthetic root of this kind of tree.
    pub fn root_name(self) -> &'static str {
        match self {
            TreeKind::Wbs => "WBS",
            TreeKind::Workflows => "Workflows",
        }
    }
}

impl fmt::Display for TreeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TreeKind::Wbs => f.write_str("wbs"),
            TreeKind::Workflows => f.write_str("workflows"),
        }
    }
}

/// A validated, read-only tree of nodes.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TreeSnapshot {
    nodes: BTreeMap<NodeId, WbsNode>,
    parents: BTreeMap<NodeId, NodeId>,
}

impl TreeSnapshot {
    /// A tree holding only its synthetic root.
    pub fn empty(root_name: &str) -> Self {
        let root = WbsNode::new(NodeId::ROOT, root_name);
        Self {
            nodes: BTreeMap::from([(NodeId::ROOT, root)]),
            parents: BTreeMap::new(),
        }
    }

    /// Build a snapshot from a flat list of nodes, one of which must be the
    /// synthetic root.
    pub fn from_nodes(nodes: Vec<WbsNode>) -> TypeResult<Self> {
        let mut by_id = BTreeMap::new();
        for node in nodes {
            let id = node.id;
            if by_id.insert(id, node).is_some() {
                return Err(TypeError::DuplicateNode(id));
            }
        }
        if !by_id.contains_key(&NodeId::ROOT) {
            return Err(TypeError::MalformedSnapshot("missing root node".into()));
        }

        let mut parents = BTreeMap::new();
        for (id, node) in &by_id {
            for child in &node.children {
                if *child == NodeId::ROOT {
                    return Err(TypeError::MalformedSnapshot(format!(
                        "root listed as a child of {id}"
                    )));
                }
                if !by_id.contains_key(child) {
                    return Err(TypeError::MissingChild {
                        parent: *id,
                        child: *child,
                    });
                }
                if parents.insert(*child, *id).is_some() {
                    return Err(TypeError::MultipleParents(*child));
                }
            }
        }

        let snapshot = Self {
            nodes: by_id,
            parents,
        };
        let reachable: HashSet<NodeId> = snapshot.preorder().into_iter().collect();
        if let Some(orphan) = snapshot.ids().find(|id| !reachable.contains(id)) {
            return Err(TypeError::Unreachable(orphan));
        }
        Ok(snapshot)
    }

    pub fn root(&self) -> &WbsNode {
        &self.nodes[&NodeId::ROOT]
    }

    pub fn get(&self, id: NodeId) -> Option<&WbsNode> {
        self.nodes.get(&id)
    }

    pub fn contains(&self, id: NodeId) -> bool {
        self.nodes.contains_key(&id)
    }

    pub fn name(&self, id: NodeId) -> Option<&str> {
        self.nodes.get(&id).map(|n| n.name.as_str())
    }

    /// Number of nodes, including the root.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Returns `true` if the tree has nothing but its root.
    pub fn is_empty(&self) -> bool {
        self.nodes.len() <= 1
    }

    pub fn ids(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.nodes.keys().copied()
    }

    pub fn parent_of(&self, id: NodeId) -> Option<NodeId> {
        self.parents.get(&id).copied()
    }

    /// Ordered children of a node; empty for leaves and unknown ids.
    pub fn children(&self, id: NodeId) -> &[NodeId] {
        self.nodes
            .get(&id)
            .map(|n| n.children.as_slice())
            .unwrap_or(&[])
    }

    pub fn is_leaf(&self, id: NodeId) -> bool {
        self.children(id).is_empty()
    }

    /// All node ids in depth-first, parent-before-children order.
    pub fn preorder(&self) -> Vec<NodeId> {
        let mut result = Vec::with_capacity(self.nodes.len());
        self.collect_preorder(NodeId::ROOT, &mut result);
        result
    }

    /// Descendants of `id` in preorder, excluding `id` itself.
    pub fn descendants(&self, id: NodeId) -> Vec<NodeId> {
        let mut result = Vec::new();
        for child in self.children(id) {
            self.collect_preorder(*child, &mut result);
        }
        result
    }

    fn collect_preorder(&self, id: NodeId, out: &mut Vec<NodeId>) {
        // Iterative walk; validated snapshots are acyclic but deep trees
        // should not blow the stack.
        let mut stack = vec![id];
        while let Some(current) = stack.pop() {
            if !self.nodes.contains_key(&current) {
                continue;
            }
            out.push(current);
            stack.extend(self.children(current).iter().rev().copied());
        }
    }

    /// Ancestors of `id`, nearest first, ending with the root.
    pub fn ancestors(&self, id: NodeId) -> Vec<NodeId> {
        let mut result = Vec::new();
        let mut current = self.parent_of(id);
        while let Some(parent) = current {
            result.push(parent);
            current = self.parent_of(parent);
        }
        result
    }

    /// Full path of names from below the root down to `id`, e.g. `/Phase 1/Design`.
    pub fn path(&self, id: NodeId) -> String {
        if id == NodeId::ROOT {
            return "/".to_string();
        }
        let mut names: Vec<&str> = self
            .ancestors(id)
            .into_iter()
            .filter(|a| *a != NodeId::ROOT)
            .filter_map(|a| self.name(a))
            .collect();
        names.reverse();
        names.extend(self.name(id));
        format!("/{}", names.join("/"))
    }

    /// Outline position: sibling indexes from the root down to `id`.
    /// Comparing positions lexicographically yields top-to-bottom order.
    pub fn position(&self, id: NodeId) -> Vec<usize> {
        let mut chain = self.ancestors(id);
        chain.reverse();
        chain.push(id);
        chain
            .windows(2)
            .map(|pair| {
                self.children(pair[0])
                    .iter()
                    .position(|c| *c == pair[1])
                    .unwrap_or(usize::MAX)
            })
            .collect()
    }
}

/// Incrementally assembles a [`TreeSnapshot`]; used by codecs and tests.
#[derive(Debug)]
pub struct SnapshotBuilder {
    nodes: Vec<WbsNode>,
    index: HashMap<NodeId, usize>,
    error: Option<TypeError>,
}

impl SnapshotBuilder {
    pub fn new(root_name: impl Into<String>) -> Self {
        Self {
            nodes: vec![WbsNode::new(NodeId::ROOT, root_name)],
            index: HashMap::from([(NodeId::ROOT, 0)]),
            error: None,
        }
    }

    /// Append a node as the last child of `parent`.
    pub fn node(
        mut self,
        parent: impl Into<NodeId>,
        id: impl Into<NodeId>,
        name: impl Into<String>,
    ) -> Self {
        let (parent, id) = (parent.into(), id.into());
        if self.error.is_some() {
            return self;
        }
        if self.index.contains_key(&id) {
            self.error = Some(TypeError::DuplicateNode(id));
            return self;
        }
        let Some(&parent_pos) = self.index.get(&parent) else {
            self.error = Some(TypeError::MalformedSnapshot(format!(
                "parent {parent} of {id} is not defined"
            )));
            return self;
        };
        self.nodes[parent_pos].children.push(id);
        self.index.insert(id, self.nodes.len());
        self.nodes.push(WbsNode::new(id, name));
        self
    }

    /// Set an attribute on a node already added to the builder.
    pub fn attr(
        mut self,
        id: impl Into<NodeId>,
        name: impl Into<String>,
        value: impl Into<String>,
    ) -> Self {
        let id = id.into();
        if self.error.is_some() {
            return self;
        }
        match self.index.get(&id) {
            Some(&pos) => {
                self.nodes[pos].attributes.insert(name.into(), value.into());
            }
            None => {
                self.error = Some(TypeError::MalformedSnapshot(format!(
                    "attribute set on undefined node {id}"
                )));
            }
        }
        self
    }

    pub fn build(self) -> TypeResult<TreeSnapshot> {
        if let Some(err) = self.error {
            return Err(err);
        }
        TreeSnapshot::from_nodes(self.nodes)
    }
}

/// Every tree of one project version, plus the team list that gives meaning
/// to individual time attributes.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ProjectSnapshot {
    team: TeamRoster,
    wbs: TreeSnapshot,
    workflows: TreeSnapshot,
}

impl ProjectSnapshot {
    pub fn new(team: TeamRoster, wbs: TreeSnapshot) -> Self {
        Self {
            team,
            wbs,
            workflows: TreeSnapshot::empty(TreeKind::Workflows.root_name()),
        }
    }

    /// A project version with no team and empty trees.
    pub fn empty() -> Self {
        Self::new(
            TeamRoster::default(),
            TreeSnapshot::empty(TreeKind::Wbs.root_name()),
        )
    }

    pub fn with_workflows(mut self, workflows: TreeSnapshot) -> Self {
        self.workflows = workflows;
        self
    }

    pub fn team(&self) -> &TeamRoster {
        &self.team
    }

    pub fn tree(&self, kind: TreeKind) -> &TreeSnapshot {
        match kind {
            TreeKind::Wbs => &self.wbs,
            TreeKind::Workflows => &self.workflows,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> TreeSnapshot {
        SnapshotBuilder::new("WBS")
            .node(NodeId::ROOT, 1, "Phase 1")
            .node(1, 2, "Design")
            .node(1, 3, "Code")
            .node(NodeId::ROOT, 4, "Phase 2")
            .attr(2, "Time", "5")
            .build()
            .unwrap()
    }

    #[test]
    fn builder_links_parents() {
        let tree = sample();
        assert_eq!(tree.len(), 5);
        assert_eq!(tree.parent_of(NodeId::new(2)), Some(NodeId::new(1)));
        assert_eq!(tree.parent_of(NodeId::new(1)), Some(NodeId::ROOT));
        assert_eq!(tree.parent_of(NodeId::ROOT), None);
        assert_eq!(tree.children(NodeId::new(1)), &[NodeId::new(2), NodeId::new(3)]);
        assert_eq!(tree.get(NodeId::new(2)).unwrap().attr("Time"), Some("5"));
    }

    #[test]
    fn preorder_and_descendants() {
        let tree = sample();
        let ids: Vec<i32> = tree.preorder().iter().map(|id| id.get()).collect();
        assert_eq!(ids, vec![-1, 1, 2, 3, 4]);
        let below: Vec<i32> = tree
            .descendants(NodeId::new(1))
            .iter()
            .map(|id| id.get())
            .collect();
        assert_eq!(below, vec![2, 3]);
    }

    #[test]
    fn paths_and_positions() {
        let tree = sample();
        assert_eq!(tree.path(NodeId::new(3)), "/Phase 1/Code");
        assert_eq!(tree.path(NodeId::ROOT), "/");
        assert_eq!(tree.position(NodeId::new(3)), vec![0, 1]);
        assert_eq!(tree.position(NodeId::new(4)), vec![1]);
        assert!(tree.position(NodeId::new(3)) < tree.position(NodeId::new(4)));
    }

    #[test]
    fn duplicate_ids_rejected() {
        let err = SnapshotBuilder::new("WBS")
            .node(NodeId::ROOT, 1, "A")
            .node(NodeId::ROOT, 1, "B")
            .build()
            .unwrap_err();
        assert_eq!(err, TypeError::DuplicateNode(NodeId::new(1)));
    }

    #[test]
    fn dangling_child_rejected() {
        let mut root = WbsNode::new(NodeId::ROOT, "WBS");
        root.children.push(NodeId::new(8));
        let err = TreeSnapshot::from_nodes(vec![root]).unwrap_err();
        assert!(matches!(err, TypeError::MissingChild { .. }));
    }

    #[test]
    fn cycle_detected_as_unreachable() {
        let root = WbsNode::new(NodeId::ROOT, "WBS");
        let mut a = WbsNode::new(1, "A");
        let mut b = WbsNode::new(2, "B");
        a.children.push(NodeId::new(2));
        b.children.push(NodeId::new(1));
        let err = TreeSnapshot::from_nodes(vec![root, a, b]).unwrap_err();
        assert!(matches!(err, TypeError::Unreachable(_)));
    }

    #[test]
    fn missing_root_rejected() {
        let err = TreeSnapshot::from_nodes(vec![WbsNode::new(1, "A")]).unwrap_err();
        assert!(matches!(err, TypeError::MalformedSnapshot(_)));
    }

    #[test]
    fn project_snapshot_defaults_to_empty_workflows() {
        let project = ProjectSnapshot::new(TeamRoster::default(), sample());
        assert!(project.tree(TreeKind::Workflows).is_empty());
        assert_eq!(project.tree(TreeKind::Wbs).len(), 5);
        assert_eq!(project.tree(TreeKind::Workflows).root().name, "Workflows");
    }

    proptest::proptest! {
        #[test]
        fn generated_trees_validate(picks in proptest::collection::vec(0usize..1000, 0..40)) {
            let mut builder = SnapshotBuilder::new("WBS");
            let mut ids = vec![NodeId::ROOT];
            for (i, pick) in picks.iter().enumerate() {
                let parent = ids[pick % ids.len()];
                let id = NodeId::new(i as i32 + 1);
                builder = builder.node(parent, id, format!("n{i}"));
                ids.push(id);
            }
            let tree = builder.build().unwrap();
            proptest::prop_assert_eq!(tree.len(), picks.len() + 1);
            proptest::prop_assert_eq!(tree.preorder().len(), tree.len());
            for id in tree.ids().filter(|id| *id != NodeId::ROOT) {
                let ancestors = tree.ancestors(id);
                proptest::prop_assert_eq!(ancestors.last(), Some(&NodeId::ROOT));
            }
        }
    }
}
