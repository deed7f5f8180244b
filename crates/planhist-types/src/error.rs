use thiserror::Error;

use crate::node::NodeId;

/// Errors produced while building or interpreting planhist data.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TypeError {
    #[error("malformed snapshot: {0}")]
    MalformedSnapshot(String),

    #[error("duplicate node id {0}")]
    DuplicateNode(NodeId),

    #[error("node {parent} references missing child {child}")]
    MissingChild { parent: NodeId, child: NodeId },

    #[error("node {0} has more than one parent")]
    MultipleParents(NodeId),

    #[error("node {0} is not reachable from the root")]
    Unreachable(NodeId),

    #[error("attribute {attr:?} has non-numeric value {value:?}")]
    InvalidNumber { attr: String, value: String },

    #[error("serialization error: {0}")]
    Serialization(String),
}

/// Result alias for type-level operations.
pub type TypeResult<T> = Result<T, TypeError>;
