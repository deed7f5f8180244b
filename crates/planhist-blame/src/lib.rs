//! Blame attribution for planhist.
//!
//! Folds the diffs of a version history, oldest to newest, into a store that
//! answers "who changed this node or attribute, and when". Time changes
//! pushed back from an individual's own timesheet are credited to that
//! individual, and blame for aggregate time values is rolled up from the
//! leaves that actually changed.
//!
//! # Key Types
//!
//! - [`BlamePoint`] / [`AuthorSet`] -- When a change happened and who made it
//! - [`BlameValueList`] -- Attributed value history of one attribute
//! - [`BlameNodeData`] / [`BlameModelData`] / [`BlameData`] -- The blame store
//! - [`BlameEngine`] -- Applies one version transition to the store
//! - [`BlameScanner`] -- Runs the engine across a version history

pub mod data;
pub mod engine;
pub mod error;
pub mod point;
pub mod scanner;

pub use data::{BlameData, BlameModelData, BlameNodeData, BlameValue, BlameValueList, DeletedChild};
pub use engine::BlameEngine;
pub use error::{BlameError, BlameResult};
pub use point::{AuthorSet, BlamePoint};
pub use scanner::{BlameOptions, BlameScanner};
