//! Node-level diff between two snapshots of one tree.
//!
//! Nodes are matched by [`NodeId`]. Identifiers present only in the base tree
//! are deletions, identifiers present only in the modified tree are
//! additions, and matched nodes may be moved, reordered, or edited.
//!
//! Additions and deletions are reported per branch: when a node's parent is
//! added (or deleted) in the same diff, the node is listed in the parent's
//! `descendants` instead of getting its own change. The suppressed ids are
//! still available through [`TreeDiff::changed_nodes`].

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::Arc;

use tracing::warn;

use planhist_types::{
    NodeContent, NodeId, ProjectSnapshot, TeamRoster, TreeKind, TreeSnapshot, TypeResult, WbsNode,
};

use crate::content::ContentTree;

/// The kind of a [`NodeChange`], without its data.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ChangeType {
    Add,
    Delete,
    Move,
    Reorder,
    Edit,
}

impl ChangeType {
    pub const ALL: [ChangeType; 5] = [
        ChangeType::Add,
        ChangeType::Delete,
        ChangeType::Move,
        ChangeType::Reorder,
        ChangeType::Edit,
    ];
}

/// A single change between two trees.
#[derive(Clone, Debug, PartialEq)]
pub enum NodeChange {
    /// A new branch. `descendants` lists the added nodes below it.
    Add {
        node: NodeId,
        parent: NodeId,
        descendants: Vec<NodeId>,
    },
    /// A removed branch. `descendants` lists the removed nodes below it.
    Delete {
        node: NodeId,
        parent: NodeId,
        descendants: Vec<NodeId>,
    },
    /// The node now lives under a different parent.
    Move {
        node: NodeId,
        old_parent: NodeId,
        new_parent: NodeId,
    },
    /// Same parent, different position among the surviving siblings.
    Reorder { node: NodeId, parent: NodeId },
    /// One or more content entries differ. `before` and `after` hold the
    /// full contents so correlated attributes can be inspected together.
    Edit {
        node: NodeId,
        parent: Option<NodeId>,
        before: NodeContent,
        after: NodeContent,
        changed: Vec<String>,
    },
}

impl NodeChange {
    pub fn node(&self) -> NodeId {
        match self {
            NodeChange::Add { node, .. }
            | NodeChange::Delete { node, .. }
            | NodeChange::Move { node, .. }
            | NodeChange::Reorder { node, .. }
            | NodeChange::Edit { node, .. } => *node,
        }
    }

    pub fn change_type(&self) -> ChangeType {
        match self {
            NodeChange::Add { .. } => ChangeType::Add,
            NodeChange::Delete { .. } => ChangeType::Delete,
            NodeChange::Move { .. } => ChangeType::Move,
            NodeChange::Reorder { .. } => ChangeType::Reorder,
            NodeChange::Edit { .. } => ChangeType::Edit,
        }
    }
}

static NO_NODES: BTreeSet<NodeId> = BTreeSet::new();

/// The result of comparing two versions of a tree.
#[derive(Clone, Debug)]
pub struct TreeDiff {
    base: ContentTree,
    modified: ContentTree,
    changes: Vec<NodeChange>,
    changed: BTreeMap<ChangeType, BTreeSet<NodeId>>,
}

impl TreeDiff {
    /// Compare `base` (before) to `modified` (after).
    pub fn compute(base: ContentTree, modified: ContentTree) -> Self {
        let mut changed: BTreeMap<ChangeType, BTreeSet<NodeId>> = ChangeType::ALL
            .iter()
            .map(|t| (*t, BTreeSet::new()))
            .collect();
        let mut changes = Vec::new();

        {
            let a = base.tree();
            let b = modified.tree();

            let deleted: BTreeSet<NodeId> = a.ids().filter(|id| !b.contains(*id)).collect();
            let added: BTreeSet<NodeId> = b.ids().filter(|id| !a.contains(*id)).collect();

            collect_branches(a, &deleted, &mut changes, |node, parent, descendants| {
                NodeChange::Delete {
                    node,
                    parent,
                    descendants,
                }
            });
            collect_branches(b, &added, &mut changes, |node, parent, descendants| {
                NodeChange::Add {
                    node,
                    parent,
                    descendants,
                }
            });

            let reordered = find_reorders(a, b);
            for id in b.preorder() {
                if !a.contains(id) {
                    continue;
                }
                let new_parent = b.parent_of(id);
                if !id.is_root() {
                    match (a.parent_of(id), new_parent) {
                        (Some(old_parent), Some(new_parent)) if old_parent != new_parent => {
                            changes.push(NodeChange::Move {
                                node: id,
                                old_parent,
                                new_parent,
                            });
                        }
                        (Some(_), Some(parent)) => {
                            if reordered.contains(&id) {
                                changes.push(NodeChange::Reorder { node: id, parent });
                            }
                        }
                        _ => {
                            warn!(node = %id, "matched node has no parent; skipping");
                            continue;
                        }
                    }
                }

                if let (Some(before), Some(after)) = (base.content(id), modified.content(id)) {
                    let diffs = changed_keys(before, after);
                    if !diffs.is_empty() {
                        changes.push(NodeChange::Edit {
                            node: id,
                            parent: new_parent,
                            before: before.clone(),
                            after: after.clone(),
                            changed: diffs,
                        });
                    }
                }
            }

            if let Some(set) = changed.get_mut(&ChangeType::Delete) {
                set.extend(deleted);
            }
            if let Some(set) = changed.get_mut(&ChangeType::Add) {
                set.extend(added);
            }
        }

        for change in &changes {
            match change.change_type() {
                ChangeType::Add | ChangeType::Delete => {}
                other => {
                    if let Some(set) = changed.get_mut(&other) {
                        set.insert(change.node());
                    }
                }
            }
        }

        Self {
            base,
            modified,
            changes,
            changed,
        }
    }

    pub fn base(&self) -> &ContentTree {
        &self.base
    }

    pub fn modified(&self) -> &ContentTree {
        &self.modified
    }

    /// Root of the modified tree, the starting point for rollup traversals.
    pub fn modified_root(&self) -> &WbsNode {
        self.modified.tree().root()
    }

    /// Changes in discovery order: deletions, additions, then moves,
    /// reorders and edits in modified-tree preorder.
    pub fn changes(&self) -> &[NodeChange] {
        &self.changes
    }

    pub fn is_empty(&self) -> bool {
        self.changes.is_empty()
    }

    pub fn len(&self) -> usize {
        self.changes.len()
    }

    /// Every node affected by a change of the given type, including nodes
    /// whose add/delete was folded into an ancestor's branch change.
    pub fn changed_nodes(&self, change_type: ChangeType) -> &BTreeSet<NodeId> {
        self.changed.get(&change_type).unwrap_or(&NO_NODES)
    }

    pub fn node_was(&self, change_type: ChangeType, id: NodeId) -> bool {
        self.changed_nodes(change_type).contains(&id)
    }
}

/// Compare two standalone trees. With no team attached, every
/// `<initials>-Time` attribute counts as member time.
pub fn diff_trees(a: &TreeSnapshot, b: &TreeSnapshot) -> TypeResult<TreeDiff> {
    let wrap = |tree: &TreeSnapshot| {
        Arc::new(ProjectSnapshot::new(TeamRoster::default(), tree.clone()))
    };
    let base = ContentTree::without_roster(wrap(a), TreeKind::Wbs)?;
    let modified = ContentTree::without_roster(wrap(b), TreeKind::Wbs)?;
    Ok(TreeDiff::compute(base, modified))
}

/// Emit one change per maximal branch of `members` within `tree`.
fn collect_branches(
    tree: &TreeSnapshot,
    members: &BTreeSet<NodeId>,
    out: &mut Vec<NodeChange>,
    make: impl Fn(NodeId, NodeId, Vec<NodeId>) -> NodeChange,
) {
    if members.is_empty() {
        return;
    }
    for id in tree.preorder() {
        if !members.contains(&id) {
            continue;
        }
        let Some(parent) = tree.parent_of(id) else {
            warn!(node = %id, "changed node has no parent; skipping");
            continue;
        };
        if members.contains(&parent) {
            continue;
        }
        let descendants = tree
            .descendants(id)
            .into_iter()
            .filter(|d| members.contains(d))
            .collect();
        out.push(make(id, parent, descendants));
    }
}

/// Nodes whose relative order among siblings that stayed under the same
/// parent changed. The longest run already in order is kept in place.
fn find_reorders(a: &TreeSnapshot, b: &TreeSnapshot) -> BTreeSet<NodeId> {
    let mut reordered = BTreeSet::new();
    for parent in b.preorder() {
        if !a.contains(parent) {
            continue;
        }
        let old_index: HashMap<NodeId, usize> = a
            .children(parent)
            .iter()
            .filter(|c| b.parent_of(**c) == Some(parent))
            .enumerate()
            .map(|(i, c)| (*c, i))
            .collect();
        let kept: Vec<NodeId> = b
            .children(parent)
            .iter()
            .copied()
            .filter(|c| old_index.contains_key(c))
            .collect();
        let sequence: Vec<usize> = kept.iter().map(|c| old_index[c]).collect();
        let in_order = longest_increasing(&sequence);
        reordered.extend(
            kept.iter()
                .zip(in_order)
                .filter(|(_, stays)| !stays)
                .map(|(id, _)| *id),
        );
    }
    reordered
}

/// Marks the members of one longest strictly increasing subsequence.
fn longest_increasing(sequence: &[usize]) -> Vec<bool> {
    let mut tails: Vec<usize> = Vec::new();
    let mut previous: Vec<Option<usize>> = vec![None; sequence.len()];
    for (i, value) in sequence.iter().enumerate() {
        let pos = tails.partition_point(|t| sequence[*t] < *value);
        if pos > 0 {
            previous[i] = Some(tails[pos - 1]);
        }
        if pos == tails.len() {
            tails.push(i);
        } else {
            tails[pos] = i;
        }
    }

    let mut keep = vec![false; sequence.len()];
    let mut current = tails.last().copied();
    while let Some(i) = current {
        keep[i] = true;
        current = previous[i];
    }
    keep
}

fn changed_keys(before: &NodeContent, after: &NodeContent) -> Vec<String> {
    let keys: BTreeSet<&String> = before.keys().chain(after.keys()).collect();
    keys.into_iter()
        .filter(|k| before.get(*k) != after.get(*k))
        .cloned()
        .collect()
}
