//! The blame store.
//!
//! [`BlameData`] holds one [`BlameModelData`] per tree kind. Each model maps
//! node ids to a [`BlameNodeData`] record: who added the node, which of its
//! children were deleted, and an attributed value history per attribute.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::Serialize;

use planhist_types::{NodeId, TreeKind};

use crate::point::BlamePoint;

/// One attributed value: the value an attribute had after `point`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct BlameValue {
    pub point: BlamePoint,
    pub value: Option<String>,
}

/// Attributed value history of one (node, attribute) pair, ordered by point.
///
/// Always starts with an entry at [`BlamePoint::initial`] holding the value
/// the attribute had before the analyzed window.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct BlameValueList {
    entries: Vec<BlameValue>,
}

impl BlameValueList {
    pub fn new(prior_value: Option<String>) -> Self {
        Self {
            entries: vec![BlameValue {
                point: BlamePoint::initial(),
                value: prior_value,
            }],
        }
    }

    /// Record the value after a change. A second record at the same point
    /// replaces the value and merges the authors.
    pub fn record(&mut self, point: BlamePoint, value: Option<String>) {
        match self.entries.binary_search_by(|e| e.point.cmp(&point)) {
            Ok(pos) => {
                let entry = &mut self.entries[pos];
                let mut authors = entry.point.authors().clone();
                authors.merge(point.authors());
                entry.point.set_authors(authors);
                entry.value = value;
            }
            Err(pos) => self.entries.insert(pos, BlameValue { point, value }),
        }
    }

    pub fn entries(&self) -> &[BlameValue] {
        &self.entries
    }

    /// The value before the analyzed window.
    pub fn initial_value(&self) -> Option<&str> {
        self.entries.first().and_then(|e| e.value.as_deref())
    }

    /// The most recent attributed entry, if the attribute changed at all.
    pub fn latest_change(&self) -> Option<&BlameValue> {
        self.entries.last().filter(|e| !e.point.is_initial())
    }

    pub fn point_at(&self, timestamp: DateTime<Utc>) -> Option<&BlamePoint> {
        self.entries
            .iter()
            .find(|e| e.point.timestamp() == timestamp)
            .map(|e| &e.point)
    }

    pub fn point_at_mut(&mut self, timestamp: DateTime<Utc>) -> Option<&mut BlamePoint> {
        self.entries
            .iter_mut()
            .find(|e| e.point.timestamp() == timestamp)
            .map(|e| &mut e.point)
    }

    /// Number of real changes (excluding the initial entry).
    pub fn change_count(&self) -> usize {
        self.entries.len().saturating_sub(1)
    }
}

/// A child that was deleted from a node.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct DeletedChild {
    pub name: String,
    pub point: BlamePoint,
}

/// Blame for one node.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct BlameNodeData {
    #[serde(skip_serializing_if = "Option::is_none")]
    added_by: Option<BlamePoint>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    deleted_children: BTreeMap<NodeId, DeletedChild>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    attributes: BTreeMap<String, BlameValueList>,
}

impl BlameNodeData {
    /// Set only for nodes created within the analyzed window.
    pub fn added_by(&self) -> Option<&BlamePoint> {
        self.added_by.as_ref()
    }

    pub fn set_added_by(&mut self, point: BlamePoint) {
        self.added_by = Some(point);
    }

    pub fn deleted_children(&self) -> &BTreeMap<NodeId, DeletedChild> {
        &self.deleted_children
    }

    pub fn add_deleted_child(&mut self, id: NodeId, name: impl Into<String>, point: BlamePoint) {
        self.deleted_children.insert(
            id,
            DeletedChild {
                name: name.into(),
                point,
            },
        );
    }

    pub fn attributes(&self) -> &BTreeMap<String, BlameValueList> {
        &self.attributes
    }

    pub fn attribute(&self, attr: &str) -> Option<&BlameValueList> {
        self.attributes.get(attr)
    }

    pub fn attribute_mut(&mut self, attr: &str) -> Option<&mut BlameValueList> {
        self.attributes.get_mut(attr)
    }

    /// Record that `attr` changed from `before` to `after` at `point`.
    /// The first change of an attribute seeds its history with `before`.
    pub fn record_change(
        &mut self,
        attr: &str,
        point: BlamePoint,
        before: Option<String>,
        after: Option<String>,
    ) {
        self.attributes
            .entry(attr.to_string())
            .or_insert_with(|| BlameValueList::new(before))
            .record(point, after);
    }

    pub fn is_empty(&self) -> bool {
        self.added_by.is_none() && self.deleted_children.is_empty() && self.attributes.is_empty()
    }
}

/// Blame for every node of one tree kind.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct BlameModelData {
    nodes: BTreeMap<NodeId, BlameNodeData>,
}

impl BlameModelData {
    pub fn node(&self, id: NodeId) -> Option<&BlameNodeData> {
        self.nodes.get(&id)
    }

    /// The record for `id`, created empty if absent.
    pub fn node_mut(&mut self, id: NodeId) -> &mut BlameNodeData {
        self.nodes.entry(id).or_default()
    }

    pub fn existing_mut(&mut self, id: NodeId) -> Option<&mut BlameNodeData> {
        self.nodes.get_mut(&id)
    }

    pub fn remove(&mut self, id: NodeId) -> Option<BlameNodeData> {
        self.nodes.remove(&id)
    }

    pub fn contains(&self, id: NodeId) -> bool {
        self.nodes.contains_key(&id)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (NodeId, &BlameNodeData)> {
        self.nodes.iter().map(|(id, data)| (*id, data))
    }
}

/// Blame for every analyzed tree kind of a project.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct BlameData {
    models: BTreeMap<TreeKind, BlameModelData>,
}

impl BlameData {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn model(&self, kind: TreeKind) -> Option<&BlameModelData> {
        self.models.get(&kind)
    }

    pub fn model_mut(&mut self, kind: TreeKind) -> &mut BlameModelData {
        self.models.entry(kind).or_default()
    }

    pub fn node(&self, kind: TreeKind, id: NodeId) -> Option<&BlameNodeData> {
        self.model(kind)?.node(id)
    }

    /// Attributed value history of one attribute on one node.
    pub fn values(&self, kind: TreeKind, id: NodeId, attr: &str) -> Option<&BlameValueList> {
        self.node(kind, id)?.attribute(attr)
    }

    pub fn is_empty(&self) -> bool {
        self.models.values().all(BlameModelData::is_empty)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(hour: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 1, hour, 0, 0).unwrap()
    }

    #[test]
    fn value_list_is_seeded_and_ordered() {
        let mut list = BlameValueList::new(Some("1".into()));
        list.record(BlamePoint::new(at(12), "bob"), Some("3".into()));
        list.record(BlamePoint::new(at(9), "alice"), Some("2".into()));

        let values: Vec<_> = list.entries().iter().map(|e| e.value.as_deref()).collect();
        assert_eq!(values, vec![Some("1"), Some("2"), Some("3")]);
        assert_eq!(list.initial_value(), Some("1"));
        assert_eq!(list.change_count(), 2);
        assert_eq!(list.latest_change().unwrap().point.timestamp(), at(12));
    }

    #[test]
    fn same_point_merges_authors() {
        let mut list = BlameValueList::new(None);
        list.record(BlamePoint::new(at(9), "alice"), Some("2".into()));
        list.record(BlamePoint::new(at(9), "bob"), Some("4".into()));

        assert_eq!(list.change_count(), 1);
        let point = list.point_at(at(9)).unwrap();
        assert!(point.authors().contains("alice"));
        assert!(point.authors().contains("bob"));
        assert_eq!(list.entries()[1].value.as_deref(), Some("4"));
    }

    #[test]
    fn unchanged_list_has_no_latest_change() {
        let list = BlameValueList::new(Some("x".into()));
        assert!(list.latest_change().is_none());
    }

    #[test]
    fn store_queries_by_kind_node_and_attribute() {
        let mut data = BlameData::new();
        data.model_mut(TreeKind::Wbs).node_mut(NodeId::new(4)).record_change(
            "Notes",
            BlamePoint::new(at(10), "alice"),
            None,
            Some("draft".into()),
        );

        let values = data.values(TreeKind::Wbs, NodeId::new(4), "Notes").unwrap();
        assert_eq!(values.change_count(), 1);
        assert!(data.values(TreeKind::Workflows, NodeId::new(4), "Notes").is_none());
        assert!(!data.is_empty());
    }

    #[test]
    fn serializes_as_nested_maps() {
        let mut data = BlameData::new();
        data.model_mut(TreeKind::Wbs)
            .node_mut(NodeId::new(2))
            .set_added_by(BlamePoint::new(at(8), "alice"));
        let json = serde_json::to_value(&data).unwrap();
        assert_eq!(json["wbs"]["2"]["added_by"]["authors"][0], "alice");
    }
}
