//! Resource canonicalization: items, lists and participation filters.
//!
//! This module turns parsed generic trees into comparable [`ResourceItem`]s:
//! - Canonicalization of platform-mutated and platform-owned fields
//! - Round-tripping of the tailor bookkeeping annotations
//! - Indexing every reachable JSON pointer for the differ

mod filter;
mod item;
mod list;

pub use filter::{normalize_kind, ResourceFilter};
pub use item::{ResourceItem, Source};
pub use list::ResourceList;

pub(crate) use item::{
    ANNOTATIONS_PATH, APPLIED_CONFIG_ANNOTATION, APPLIED_CONFIG_ANNOTATION_PATH,
    MANAGED_ANNOTATION, MANAGED_ANNOTATION_PATH,
};
