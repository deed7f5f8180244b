//! Applies one version transition to the blame store.
//!
//! Rules per change:
//!
//! - **Add** credits the node and its new descendants to the version author,
//!   or to the individual named in `Added By (Sync)` when present.
//! - **Delete** is recorded on the parent as a deleted child. Nodes that were
//!   added within the analyzed window vanish without a trace.
//! - **Move** records the old and new parent path.
//! - **Edit** records renames, individual time changes, the synthesized
//!   `Assigned To` roster, aggregate time changes and any attribute with a
//!   display column. An individual time whose new value matches the
//!   member's synchronized time is credited to that member.
//!
//! After all changes are applied, aggregate time blame is rolled up: a node
//! whose aggregate changed at this transition takes the union of the
//! authors credited on its changed children.

use std::collections::BTreeSet;

use tracing::{debug, warn};

use planhist_diff::{ChangeType, NodeChange, ProjectDiff};
use planhist_types::attrs::{
    format_number, nearly_equal, parse_number, AttrKind, ASSIGNED_TO_ATTR,
    EXPLICIT_TIME_FLAG, PARENT_PATH_ATTR, SYNC_AUTHOR_ATTR, TEAM_TIME_ATTR,
};
use planhist_types::{ColumnResolver, NodeContent, NodeId, TreeSnapshot, TypeResult};

use crate::data::{BlameData, BlameModelData};
use crate::error::BlameResult;
use crate::point::{AuthorSet, BlamePoint};

/// Folds diffs into [`BlameData`].
pub struct BlameEngine<'a> {
    columns: &'a dyn ColumnResolver,
}

impl<'a> BlameEngine<'a> {
    pub fn new(columns: &'a dyn ColumnResolver) -> Self {
        Self { columns }
    }

    /// Apply one transition. Transitions must be applied oldest first.
    pub fn attribute(&self, diff: &ProjectDiff, mut data: BlameData) -> BlameResult<BlameData> {
        let model = data.model_mut(diff.kind());
        let point = BlamePoint::new(diff.timestamp(), diff.author());
        let mut rollup: BTreeSet<&'static str> = BTreeSet::new();

        for change in diff.changes() {
            match change {
                NodeChange::Add {
                    node, descendants, ..
                } => record_add(diff, model, *node, descendants),
                NodeChange::Delete {
                    node,
                    parent,
                    descendants,
                } => record_delete(diff, model, &point, *node, *parent, descendants),
                NodeChange::Move {
                    node,
                    old_parent,
                    new_parent,
                } => {
                    let before = diff.base().tree().path(*old_parent);
                    let after = diff.modified().tree().path(*new_parent);
                    model.node_mut(*node).record_change(
                        PARENT_PATH_ATTR,
                        point.clone(),
                        Some(before),
                        Some(after),
                    );
                }
                NodeChange::Reorder { .. } => {}
                NodeChange::Edit {
                    node,
                    before,
                    after,
                    changed,
                    ..
                } => {
                    if self.record_edit(diff, model, *node, before, after, changed)? {
                        rollup.insert(TEAM_TIME_ATTR);
                    }
                }
            }
        }

        let tree = diff.modified().tree();
        for attr in rollup {
            roll_up(model, tree, NodeId::ROOT, attr, &point);
        }

        debug!(
            version = %diff.version_b().id,
            tree = %diff.kind(),
            changes = diff.changes().len(),
            "applied blame"
        );
        Ok(data)
    }

    /// Returns `true` if the node's aggregate time changed.
    fn record_edit(
        &self,
        diff: &ProjectDiff,
        model: &mut BlameModelData,
        node: NodeId,
        before: &NodeContent,
        after: &NodeContent,
        changed: &[String],
    ) -> BlameResult<bool> {
        let timestamp = diff.timestamp();
        let point = BlamePoint::new(timestamp, diff.author());
        let mut time_authors = AuthorSet::new();
        let mut individual_changed = false;
        let mut total_changed = false;

        for attr in changed {
            match diff.classify(attr) {
                AttrKind::ExplicitTimeFlag => {}
                AttrKind::TeamTime => total_changed = true,
                AttrKind::IndividualTime(initials) => {
                    individual_changed = true;
                    let author = time_author(diff, node, initials)?;
                    time_authors.insert(author.clone());
                    model.node_mut(node).record_change(
                        attr,
                        BlamePoint::new(timestamp, author),
                        number_display(attr, before)?,
                        number_display(attr, after)?,
                    );
                }
                AttrKind::NodeName => model.node_mut(node).record_change(
                    attr,
                    point.clone(),
                    before.get(attr).cloned(),
                    after.get(attr).cloned(),
                ),
                AttrKind::SyncAuthor
                | AttrKind::SyncTime(_)
                | AttrKind::ZeroAssigned(_)
                | AttrKind::Other => {
                    let Some(column) = self.columns.resolve(attr) else {
                        continue;
                    };
                    let shown = |content: &NodeContent| {
                        content
                            .get(attr)
                            .map(|raw| column.display(attr, Some(raw.as_str())))
                            .transpose()
                    };
                    model.node_mut(node).record_change(
                        attr,
                        point.clone(),
                        shown(before)?,
                        shown(after)?,
                    );
                }
            }
        }

        if individual_changed && diff.modified().tree().is_leaf(node) {
            let was = assigned_to(diff, before)?;
            let now = assigned_to(diff, after)?;
            if was != now {
                model.node_mut(node).record_change(
                    ASSIGNED_TO_ATTR,
                    BlamePoint::with_authors(timestamp, time_authors.clone()),
                    Some(was),
                    Some(now),
                );
            }
        }

        if total_changed {
            let mut authors = time_authors;
            if after.contains_key(EXPLICIT_TIME_FLAG) || authors.is_empty() {
                authors.insert(diff.author());
            }
            model.node_mut(node).record_change(
                TEAM_TIME_ATTR,
                BlamePoint::with_authors(timestamp, authors),
                number_display(TEAM_TIME_ATTR, before)?,
                number_display(TEAM_TIME_ATTR, after)?,
            );
        }
        Ok(total_changed)
    }
}

fn record_add(diff: &ProjectDiff, model: &mut BlameModelData, node: NodeId, descendants: &[NodeId]) {
    for id in std::iter::once(node).chain(descendants.iter().copied()) {
        let author = added_by(diff, id);
        model
            .node_mut(id)
            .set_added_by(BlamePoint::new(diff.timestamp(), author));
    }
}

fn record_delete(
    diff: &ProjectDiff,
    model: &mut BlameModelData,
    point: &BlamePoint,
    node: NodeId,
    parent: NodeId,
    descendants: &[NodeId],
) {
    if added_in_window(model, node) {
        debug!(node = %node, "dropping node added and deleted within the window");
        model.remove(node);
        for id in descendants {
            model.remove(*id);
        }
        return;
    }
    for id in descendants {
        if added_in_window(model, *id) {
            debug!(node = %id, "dropping node added and deleted within the window");
            model.remove(*id);
        }
    }
    if diff.tree_diff().node_was(ChangeType::Delete, parent) {
        return;
    }
    let Some(name) = diff.base().tree().name(node) else {
        warn!(node = %node, "deleted node missing from base snapshot; skipping");
        return;
    };
    model
        .node_mut(parent)
        .add_deleted_child(node, name, point.clone());
}

fn added_in_window(model: &BlameModelData, id: NodeId) -> bool {
    model.node(id).is_some_and(|data| data.added_by().is_some())
}

/// The person who created a node: the synchronized author when recorded,
/// otherwise the version author.
fn added_by(diff: &ProjectDiff, id: NodeId) -> String {
    match diff
        .modified()
        .attr(id, SYNC_AUTHOR_ATTR)
        .map(str::trim)
        .filter(|who| !who.is_empty())
    {
        Some(who) => diff.team().resolve_person(who),
        None => diff.author().to_string(),
    }
}

/// The person responsible for a change to `initials`' time on a node.
fn time_author(diff: &ProjectDiff, node: NodeId, initials: &str) -> TypeResult<String> {
    if diff.modified().is_synchronized(node, initials)? {
        Ok(diff.member_name(initials))
    } else {
        Ok(diff.author().to_string())
    }
}

/// Names of members with nonzero time, sorted and comma separated.
fn assigned_to(diff: &ProjectDiff, content: &NodeContent) -> TypeResult<String> {
    let mut names = BTreeSet::new();
    for (attr, value) in content {
        if let AttrKind::IndividualTime(initials) = diff.classify(attr) {
            if !nearly_equal(parse_number(attr, value)?, 0.0) {
                names.insert(diff.member_name(initials));
            }
        }
    }
    Ok(names.into_iter().collect::<Vec<_>>().join(", "))
}

fn number_display(attr: &str, content: &NodeContent) -> TypeResult<Option<String>> {
    content
        .get(attr)
        .map(|value| parse_number(attr, value).map(format_number))
        .transpose()
}

/// Replace the authors at `point` with the union of the children's authors
/// for the same attribute and point. Returns the node's resulting authors,
/// empty when the node has no entry at `point`.
fn roll_up(
    model: &mut BlameModelData,
    tree: &TreeSnapshot,
    id: NodeId,
    attr: &str,
    point: &BlamePoint,
) -> AuthorSet {
    let mut from_children = AuthorSet::new();
    for child in tree.children(id) {
        from_children.merge(&roll_up(model, tree, *child, attr, point));
    }

    let Some(entry) = model
        .existing_mut(id)
        .and_then(|data| data.attribute_mut(attr))
        .and_then(|values| values.point_at_mut(point.timestamp()))
    else {
        return AuthorSet::new();
    };
    if !from_children.is_empty() {
        entry.set_authors(from_children);
    }
    entry.authors().clone()
}
