//! Version history providers for planhist.
//!
//! The history engines never read storage directly. They consume a
//! [`VersionHistory`]: an ordered list of versions (each with an author and a
//! timestamp) plus the ability to fetch the project snapshot as it existed at
//! a version. A snapshot that predates retained history is reported as
//! [`HistoryError::NotFound`], which scans treat as the end of history.
//!
//! # Key Types
//!
//! - [`VersionHistory`] -- Provider trait consumed by the engines
//! - [`VersionId`] / [`VersionInfo`] -- Version identity and metadata
//! - [`InMemoryHistory`] -- Provider for tests and embedding
//! - [`DirectoryHistory`] -- Provider backed by a manifest and JSON files

pub mod codec;
pub mod error;
pub mod fs;
pub mod memory;
pub mod traits;
pub mod version;

pub use codec::{decode_snapshot, encode_snapshot};
pub use error::{HistoryError, HistoryResult};
pub use fs::DirectoryHistory;
pub use memory::InMemoryHistory;
pub use traits::VersionHistory;
pub use version::{VersionId, VersionInfo};
