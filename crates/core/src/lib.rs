//! Data model for tree watching
//!
//! This crate provides:
//! - Root-relative paths with a fixed `/` separator
//! - Stat records (entry kind, size, mtime)
//! - The snapshot table used as ground truth for change classification

pub mod path;
pub mod snapshot;
pub mod stat;

// Re-exports
pub use path::RelPath;
pub use snapshot::Snapshot;
pub use stat::{EntryKind, StatRecord};
