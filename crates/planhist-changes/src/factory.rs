use std::collections::BTreeMap;

use tracing::warn;

use planhist_diff::{NodeChange, ProjectDiff};
use planhist_types::attrs::{nearly_equal, AttrKind, EXPLICIT_TIME_FLAG, TEAM_TIME_ATTR};
use planhist_types::{NodeContent, NodeId, ReportContext, TreeSnapshot};

use crate::change::{NodeChangeKind, NodeRef, ProjectChange, ProjectNodeChange};
use crate::error::ChangeResult;
use crate::time_change::ProjectTimeChange;

/// Turns one [`ProjectDiff`] into reported changes.
///
/// Structural changes are grouped by parent. Time changes are collapsed
/// upward: a parent whose changed children are its only children with time
/// gets a single summary record, and a lone changed descendant is reported
/// once rather than at every level.
pub struct ChangeListFactory<'a> {
    diff: &'a ProjectDiff,
    label: String,
}

impl<'a> ChangeListFactory<'a> {
    pub fn new(diff: &'a ProjectDiff, context: &ReportContext) -> Self {
        Self {
            diff,
            label: context.label(TEAM_TIME_ATTR, "time estimate"),
        }
    }

    /// Changes ordered by tree position, then grouped by author.
    pub fn changes(&self) -> ChangeResult<Vec<ProjectChange>> {
        let mut node_changes: BTreeMap<NodeId, ProjectNodeChange> = BTreeMap::new();
        let mut time_changes: BTreeMap<NodeId, ProjectTimeChange> = BTreeMap::new();
        let base = self.diff.base().tree();
        let modified = self.diff.modified().tree();

        for change in self.diff.changes() {
            match change {
                NodeChange::Add { node, parent, .. } => {
                    self.node_change(&mut node_changes, modified, *parent, *node, NodeChangeKind::Added)
                }
                NodeChange::Delete { node, parent, .. } => {
                    self.node_change(&mut node_changes, base, *parent, *node, NodeChangeKind::Deleted)
                }
                NodeChange::Move {
                    node,
                    old_parent,
                    new_parent,
                } => {
                    let from = base.path(*old_parent);
                    self.node_change(
                        &mut node_changes,
                        modified,
                        *new_parent,
                        *node,
                        NodeChangeKind::Moved { from },
                    )
                }
                NodeChange::Reorder { .. } => {}
                NodeChange::Edit {
                    node,
                    parent,
                    before,
                    after,
                    changed,
                } => {
                    if node.is_root() {
                        continue;
                    }
                    if changed.iter().any(|a| matches!(self.diff.classify(a), AttrKind::NodeName)) {
                        if let (Some(parent), Some(from)) = (parent, base.name(*node)) {
                            let kind = NodeChangeKind::Renamed {
                                from: from.to_string(),
                            };
                            self.node_change(&mut node_changes, modified, *parent, *node, kind);
                        }
                    }
                    if is_time_change(self.diff, before, after, changed) {
                        if let Some(node_ref) = NodeRef::locate(modified, *node) {
                            let change = ProjectTimeChange::from_edit(node_ref, self.diff, &self.label)?;
                            time_changes.insert(*node, change);
                        }
                    }
                }
            }
        }

        self.summarize(&mut time_changes, NodeId::ROOT)?;

        let mut result: Vec<ProjectChange> = time_changes
            .into_values()
            .map(ProjectChange::Time)
            .chain(node_changes.into_values().map(ProjectChange::Node))
            .collect();
        result.sort_by(|a, b| a.node().position.cmp(&b.node().position));
        result.sort_by(|a, b| a.author().cmp(b.author()));
        Ok(result)
    }

    fn node_change(
        &self,
        changes: &mut BTreeMap<NodeId, ProjectNodeChange>,
        tree: &TreeSnapshot,
        parent: NodeId,
        node: NodeId,
        kind: NodeChangeKind,
    ) {
        let (Some(parent_ref), Some(node_ref)) =
            (NodeRef::locate(tree, parent), NodeRef::locate(tree, node))
        else {
            warn!(node = %node, parent = %parent, "changed node missing from snapshot; skipping");
            return;
        };
        changes
            .entry(parent)
            .or_insert_with(|| {
                ProjectNodeChange::new(parent_ref, self.diff.author(), self.diff.timestamp())
            })
            .add(node_ref, kind);
    }

    /// Collapse the time changes below `id` upward. Returns `true` when the
    /// subtree holds no time at all, so it cannot block summarizing its
    /// parent.
    fn summarize(
        &self,
        changes: &mut BTreeMap<NodeId, ProjectTimeChange>,
        id: NodeId,
    ) -> ChangeResult<bool> {
        let modified = self.diff.modified();
        let children = modified.tree().children(id);
        let mut changed_children = Vec::new();
        let mut blocked = false;

        for child in children {
            let child_is_zero = self.summarize(changes, *child)?;
            if changes.contains_key(child) {
                changed_children.push(*child);
            } else if !child_is_zero {
                blocked = true;
            }
        }

        if blocked {
            return Ok(false);
        }
        match changed_children.as_slice() {
            [] if children.is_empty() => Ok(nearly_equal(modified.total_time(id)?, 0.0)),
            [] => Ok(true),
            [only] => {
                // A node with its own record keeps it, and the child's record
                // stays separate.
                if !changes.contains_key(&id) {
                    if let Some(single) = changes.remove(only) {
                        changes.insert(id, single);
                    }
                }
                Ok(false)
            }
            _ => {
                let Some(node_ref) = NodeRef::locate(modified.tree(), id) else {
                    return Ok(false);
                };
                let subtasks: Vec<ProjectTimeChange> = changed_children
                    .iter()
                    .filter_map(|child| changes.remove(child))
                    .collect();
                // Records still held below a summarized child are part of its
                // totals already; only their authors carry over.
                let nested: Vec<ProjectTimeChange> = changed_children
                    .iter()
                    .flat_map(|child| modified.tree().descendants(*child))
                    .filter_map(|below| changes.remove(&below))
                    .collect();
                let mut summary = ProjectTimeChange::summarize(node_ref, subtasks, &self.label);
                for change in &nested {
                    summary.credit(change);
                }
                changes.insert(id, summary);
                Ok(false)
            }
        }
    }
}

/// Individual or zero-assignment changes always count. The aggregate only
/// counts when it is an explicit value, since a bottom-up sum moves with
/// the individual times already reported.
fn is_time_change(
    diff: &ProjectDiff,
    before: &NodeContent,
    after: &NodeContent,
    changed: &[String],
) -> bool {
    changed.iter().any(|attr| match diff.classify(attr) {
        AttrKind::IndividualTime(_) | AttrKind::ZeroAssigned(_) => true,
        AttrKind::TeamTime => {
            before.contains_key(EXPLICIT_TIME_FLAG) || after.contains_key(EXPLICIT_TIME_FLAG)
        }
        _ => false,
    })
}
