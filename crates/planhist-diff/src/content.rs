//! Diffable node contents.
//!
//! A [`ContentTree`] pairs a tree snapshot with the per-node content maps the
//! diff engine compares. Contents are "tweaked" before comparison:
//!
//! - attributes keyed by a team member's old initials are renamed to the
//!   member's current initials, so an initials change is not reported as a
//!   reassignment;
//! - the aggregate `Time` attribute is recomputed bottom-up. Leaves sum their
//!   individual times, parents sum their children. A nonzero sum replaces any
//!   explicit value stored on the node; otherwise an explicit value is kept
//!   and the node is marked with `Time@Explicit`.
//!
//! Only attributes keyed by initials on the snapshot's team count as member
//! time. Any other `<prefix>-Time` attribute is an ordinary attribute.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::Arc;

use planhist_types::attrs::{
    classify, format_number, indiv_time_attr, nearly_equal, number_attr, parse_number,
    sync_time_attr, zero_assigned_attr, AttrKind, EXPLICIT_TIME_FLAG, TEAM_TIME_ATTR,
};
use planhist_types::{
    NodeContent, NodeId, ProjectSnapshot, TeamRoster, TreeKind, TreeSnapshot, TypeResult,
};

/// One tree of a project snapshot together with its tweaked node contents.
#[derive(Clone, Debug)]
pub struct ContentTree {
    snapshot: Arc<ProjectSnapshot>,
    kind: TreeKind,
    contents: BTreeMap<NodeId, NodeContent>,
    /// Initials whose attributes count as member time. `None` accepts any.
    members: Option<BTreeSet<String>>,
}

impl ContentTree {
    pub fn new(snapshot: Arc<ProjectSnapshot>, kind: TreeKind) -> TypeResult<Self> {
        Self::with_initials_remap(snapshot, kind, &BTreeMap::new())
    }

    /// Build contents, renaming attributes of members whose initials changed
    /// (`remap` maps old initials to new initials).
    pub fn with_initials_remap(
        snapshot: Arc<ProjectSnapshot>,
        kind: TreeKind,
        remap: &BTreeMap<String, String>,
    ) -> TypeResult<Self> {
        let members = snapshot
            .team()
            .members()
            .iter()
            .map(|m| remap.get(&m.initials).unwrap_or(&m.initials).clone())
            .collect();
        Self::build(snapshot, kind, remap, Some(members))
    }

    /// Build contents for a tree with no team attached. Every
    /// `<initials>-Time` attribute counts as member time.
    pub fn without_roster(snapshot: Arc<ProjectSnapshot>, kind: TreeKind) -> TypeResult<Self> {
        Self::build(snapshot, kind, &BTreeMap::new(), None)
    }

    fn build(
        snapshot: Arc<ProjectSnapshot>,
        kind: TreeKind,
        remap: &BTreeMap<String, String>,
        members: Option<BTreeSet<String>>,
    ) -> TypeResult<Self> {
        let tree = snapshot.tree(kind);
        let mut contents: BTreeMap<NodeId, NodeContent> = tree
            .preorder()
            .into_iter()
            .filter_map(|id| tree.get(id).map(|node| (id, node.content())))
            .collect();

        if !remap.is_empty() {
            for content in contents.values_mut() {
                remap_initials(content, remap);
            }
        }
        apply_bottom_up_time(tree, &mut contents, members.as_ref())?;

        Ok(Self {
            snapshot,
            kind,
            contents,
            members,
        })
    }

    pub fn tree(&self) -> &TreeSnapshot {
        self.snapshot.tree(self.kind)
    }

    pub fn snapshot(&self) -> &Arc<ProjectSnapshot> {
        &self.snapshot
    }

    pub fn team(&self) -> &TeamRoster {
        self.snapshot.team()
    }

    pub fn kind(&self) -> TreeKind {
        self.kind
    }

    /// Like [`classify`], but member attributes for initials outside the
    /// team are [`AttrKind::Other`].
    pub fn classify<'a>(&self, attr: &'a str) -> AttrKind<'a> {
        member_kind(self.members.as_ref(), attr)
    }

    pub fn contains(&self, id: NodeId) -> bool {
        self.contents.contains_key(&id)
    }

    pub fn content(&self, id: NodeId) -> Option<&NodeContent> {
        self.contents.get(&id)
    }

    pub fn attr(&self, id: NodeId, attr: &str) -> Option<&str> {
        self.contents.get(&id)?.get(attr).map(String::as_str)
    }

    /// Returns `true` if the node's aggregate time is an explicit value
    /// rather than a bottom-up sum.
    pub fn has_explicit_time(&self, id: NodeId) -> bool {
        self.attr(id, EXPLICIT_TIME_FLAG).is_some()
    }

    /// The node's aggregate time, zero when absent.
    pub fn total_time(&self, id: NodeId) -> TypeResult<f64> {
        match self.contents.get(&id) {
            Some(content) => Ok(number_attr(content, TEAM_TIME_ATTR)?.unwrap_or(0.0)),
            None => Ok(0.0),
        }
    }

    /// Individual time assignments on a node, keyed by initials.
    pub fn individual_times(&self, id: NodeId) -> TypeResult<BTreeMap<String, f64>> {
        let mut times = BTreeMap::new();
        if let Some(content) = self.contents.get(&id) {
            for (attr, value) in content {
                if let AttrKind::IndividualTime(initials) = self.classify(attr) {
                    times.insert(initials.to_string(), parse_number(attr, value)?);
                }
            }
        }
        Ok(times)
    }

    /// Individual times plus members assigned with zero time, who count as
    /// holding `0`.
    pub fn member_times(&self, id: NodeId) -> TypeResult<BTreeMap<String, f64>> {
        let mut times = self.individual_times(id)?;
        for initials in self.zero_assignments(id) {
            times.entry(initials).or_insert(0.0);
        }
        Ok(times)
    }

    /// Returns `true` when a member's time on a node equals their
    /// synchronized time, i.e. the value came from their own timesheet.
    pub fn is_synchronized(&self, id: NodeId, initials: &str) -> TypeResult<bool> {
        let Some(content) = self.contents.get(&id) else {
            return Ok(false);
        };
        let time = number_attr(content, &indiv_time_attr(initials))?;
        let synced = number_attr(content, &sync_time_attr(initials))?;
        Ok(matches!((time, synced), (Some(t), Some(s)) if nearly_equal(t, s)))
    }

    /// Members flagged as assigned with zero time on a node.
    pub fn zero_assignments(&self, id: NodeId) -> Vec<String> {
        self.contents
            .get(&id)
            .map(|content| {
                content
                    .iter()
                    .filter(|(_, value)| !value.is_empty())
                    .filter_map(|(attr, _)| match self.classify(attr) {
                        AttrKind::ZeroAssigned(initials) => Some(initials.to_string()),
                        _ => None,
                    })
                    .collect()
            })
            .unwrap_or_default()
    }
}

fn member_kind<'a>(members: Option<&BTreeSet<String>>, attr: &'a str) -> AttrKind<'a> {
    match classify(attr) {
        AttrKind::IndividualTime(initials)
        | AttrKind::SyncTime(initials)
        | AttrKind::ZeroAssigned(initials)
            if members.is_some_and(|m| !m.contains(initials)) =>
        {
            AttrKind::Other
        }
        kind => kind,
    }
}

fn remap_initials(content: &mut NodeContent, remap: &BTreeMap<String, String>) {
    let renames: Vec<(String, String)> = content
        .keys()
        .filter_map(|attr| {
            let renamed = match classify(attr) {
                AttrKind::IndividualTime(initials) => remap.get(initials).map(|n| indiv_time_attr(n)),
                AttrKind::SyncTime(initials) => remap.get(initials).map(|n| sync_time_attr(n)),
                AttrKind::ZeroAssigned(initials) => {
                    remap.get(initials).map(|n| zero_assigned_attr(n))
                }
                _ => None,
            }?;
            Some((attr.clone(), renamed))
        })
        .collect();

    // Remove every old name before inserting, so swapped initials do not
    // overwrite each other.
    let moved: Vec<(String, String)> = renames
        .into_iter()
        .filter_map(|(old, new)| content.remove(&old).map(|value| (new, value)))
        .collect();
    content.extend(moved);
}

fn apply_bottom_up_time(
    tree: &TreeSnapshot,
    contents: &mut BTreeMap<NodeId, NodeContent>,
    members: Option<&BTreeSet<String>>,
) -> TypeResult<()> {
    let mut effective: HashMap<NodeId, f64> = HashMap::new();

    for id in tree.preorder().into_iter().rev() {
        let Some(content) = contents.get_mut(&id) else {
            continue;
        };
        let explicit = number_attr(content, TEAM_TIME_ATTR)?;
        let bottom_up = if tree.is_leaf(id) {
            individual_sum(content, members)?
        } else {
            tree.children(id)
                .iter()
                .filter_map(|child| effective.get(child))
                .sum()
        };

        let value = if !nearly_equal(bottom_up, 0.0) {
            content.insert(TEAM_TIME_ATTR.to_string(), format_number(bottom_up));
            bottom_up
        } else if let Some(explicit) = explicit {
            content.insert(EXPLICIT_TIME_FLAG.to_string(), "true".to_string());
            explicit
        } else {
            0.0
        };
        effective.insert(id, value);
    }
    Ok(())
}

fn individual_sum(content: &NodeContent, members: Option<&BTreeSet<String>>) -> TypeResult<f64> {
    let mut sum = 0.0;
    for (attr, value) in content {
        if let AttrKind::IndividualTime(_) = member_kind(members, attr) {
            sum += parse_number(attr, value)?;
        }
    }
    Ok(sum)
}
