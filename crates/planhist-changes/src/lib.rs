//! Change lists for planhist.
//!
//! Walks a version history from newest to oldest and turns each transition
//! into a short list of human-readable changes: nodes added, deleted, moved
//! or renamed, grouped under their parent, and time estimate changes
//! summarized as high up the tree as they can be described as one change.
//!
//! # Key Types
//!
//! - [`ProjectChange`] -- One reported change (node structure or time)
//! - [`ProjectNodeChange`] -- Structural changes under one parent
//! - [`ProjectTimeChange`] / [`IndivTime`] -- A time change, per person
//! - [`ChangeListFactory`] -- Turns one diff into changes
//! - [`ChangeListBuilder`] -- Scans a history into a [`ProjectChangeList`]

pub mod builder;
pub mod change;
pub mod error;
pub mod factory;
pub mod time_change;

pub use builder::{ChangeListBuilder, ChangeListOptions, ProjectChangeList};
pub use change::{ChangeRow, NodeChangeEntry, NodeChangeKind, NodeRef, ProjectChange, ProjectNodeChange};
pub use error::{ChangeError, ChangeResult};
pub use factory::ChangeListFactory;
pub use time_change::{IndivTime, ProjectTimeChange, TimeCategory};
