//! JSON snapshot codec.
//!
//! A snapshot file holds the team list and one nested document per tree:
//!
//! ```text
//! {
//!   "team": [{"id": "m1", "initials": "ab", "name": "Alice Brown"}],
//!   "wbs": {"name": "WBS", "children": [
//!     {"id": 1, "name": "Design", "attrs": {"ab-Time": "4"}, "children": []}
//!   ]},
//!   "workflows": {"children": []}
//! }
//! ```
//!
//! Trees that are absent decode as empty trees. Structural problems (duplicate
//! ids, invalid JSON) are reported as [`TypeError`]s.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use planhist_types::{
    NodeId, ProjectSnapshot, TeamRoster, TreeKind, TreeSnapshot, TypeError, TypeResult, WbsNode,
};

#[derive(Debug, Default, Serialize, Deserialize)]
struct ProjectDoc {
    #[serde(default)]
    team: TeamRoster,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    wbs: Option<RootDoc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    workflows: Option<RootDoc>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct RootDoc {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    name: Option<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    attrs: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    children: Vec<NodeDoc>,
}

#[derive(Debug, Serialize, Deserialize)]
struct NodeDoc {
    id: NodeId,
    name: String,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    attrs: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    children: Vec<NodeDoc>,
}

/// Decode a project snapshot from JSON bytes.
pub fn decode_snapshot(bytes: &[u8]) -> TypeResult<ProjectSnapshot> {
    let doc: ProjectDoc =
        serde_json::from_slice(bytes).map_err(|e| TypeError::Serialization(e.to_string()))?;

    let wbs = decode_tree(doc.wbs, TreeKind::Wbs)?;
    let workflows = decode_tree(doc.workflows, TreeKind::Workflows)?;
    Ok(ProjectSnapshot::new(doc.team, wbs).with_workflows(workflows))
}

/// Encode a project snapshot as JSON bytes.
pub fn encode_snapshot(snapshot: &ProjectSnapshot) -> TypeResult<Vec<u8>> {
    let doc = ProjectDoc {
        team: snapshot.team().clone(),
        wbs: Some(encode_tree(snapshot.tree(TreeKind::Wbs))),
        workflows: Some(encode_tree(snapshot.tree(TreeKind::Workflows))),
    };
    serde_json::to_vec_pretty(&doc).map_err(|e| TypeError::Serialization(e.to_string()))
}

fn decode_tree(doc: Option<RootDoc>, kind: TreeKind) -> TypeResult<TreeSnapshot> {
    let Some(doc) = doc else {
        return Ok(TreeSnapshot::empty(kind.root_name()));
    };

    let mut root = WbsNode::new(
        NodeId::ROOT,
        doc.name.unwrap_or_else(|| kind.root_name().to_string()),
    );
    root.attributes = doc.attrs;

    let mut nodes = Vec::new();
    for child in doc.children {
        root.children.push(child.id);
        flatten(child, &mut nodes)?;
    }
    nodes.push(root);
    TreeSnapshot::from_nodes(nodes)
}

fn flatten(doc: NodeDoc, out: &mut Vec<WbsNode>) -> TypeResult<()> {
    if doc.id.is_root() {
        return Err(TypeError::MalformedSnapshot(format!(
            "node {:?} uses reserved id {}",
            doc.name, doc.id
        )));
    }
    let mut node = WbsNode::new(doc.id, doc.name);
    node.attributes = doc.attrs;
    node.children = doc.children.iter().map(|c| c.id).collect();
    out.push(node);
    for child in doc.children {
        flatten(child, out)?;
    }
    Ok(())
}

fn encode_tree(tree: &TreeSnapshot) -> RootDoc {
    let root = tree.root();
    RootDoc {
        name: Some(root.name.clone()),
        attrs: root.attributes.clone(),
        children: root
            .children
            .iter()
            .filter_map(|id| encode_node(tree, *id))
            .collect(),
    }
}

fn encode_node(tree: &TreeSnapshot, id: NodeId) -> Option<NodeDoc> {
    let node = tree.get(id)?;
    Some(NodeDoc {
        id,
        name: node.name.clone(),
        attrs: node.attributes.clone(),
        children: node
            .children
            .iter()
            .filter_map(|child| encode_node(tree, *child))
            .collect(),
    })
}
