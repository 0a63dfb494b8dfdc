//! Planning module for reconciliation operations.
//!
//! This module handles the comparison between desired and current resource
//! items, producing ordered changesets of create, update and delete actions.

mod change;
mod changeset;
mod diff;

pub use change::{Change, ChangeAction, JsonPatch, PatchOp};
pub use changeset::Changeset;
pub use diff::Differ;
