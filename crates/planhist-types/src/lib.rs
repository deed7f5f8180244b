//! Foundation types for planhist.
//!
//! This crate provides the data model shared by every other planhist crate:
//! the nodes of a work-breakdown tree, immutable tree snapshots, the team
//! roster that owns individual time attributes, and the naming conventions
//! used to interpret string-encoded node attributes.
//!
//! # Key Types
//!
//! - [`NodeId`] -- Stable node identifier, reused across snapshots of a project
//! - [`WbsNode`] -- One node: name, ordered children, attribute map
//! - [`TreeSnapshot`] -- Validated, immutable forest under a synthetic root
//! - [`ProjectSnapshot`] -- All trees of one project version plus its team
//! - [`TeamRoster`] -- Team members and their initials
//! - [`ColumnRegistry`] -- Display formatting for generic attributes

pub mod attrs;
pub mod columns;
pub mod error;
pub mod node;
pub mod snapshot;
pub mod team;

pub use attrs::{classify, format_number, nearly_equal, number_attr, parse_number, AttrKind};
pub use columns::{ColumnDef, ColumnRegistry, ColumnResolver, ReportContext, ValueFormat};
pub use error::{TypeError, TypeResult};
pub use node::{NodeContent, NodeId, WbsNode};
pub use snapshot::{ProjectSnapshot, SnapshotBuilder, TreeKind, TreeSnapshot};
pub use team::{TeamMember, TeamRoster};
