//! Tree diff engine for planhist.
//!
//! Compares two snapshots of a work-breakdown tree, matching nodes by their
//! stable identifiers, and produces a structured change set.
//!
//! # Key Types
//!
//! - [`ContentTree`] -- A snapshot's node contents with bottom-up time sums applied
//! - [`TreeDiff`] / [`NodeChange`] -- Add / Delete / Move / Reorder / Edit changes
//! - [`ProjectDiff`] -- One version transition: authorship, team, and tree diff

pub mod content;
pub mod error;
pub mod project_diff;
pub mod tree_diff;

pub use content::ContentTree;
pub use error::{DiffError, DiffResult};
pub use project_diff::ProjectDiff;
pub use tree_diff::{diff_trees, ChangeType, NodeChange, TreeDiff};
