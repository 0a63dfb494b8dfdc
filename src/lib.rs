// ============================================================================
// Strict linting - Dangerous or non-idiomatic practices are forbidden
// ============================================================================

#![deny(warnings)]                    // All warnings are treated as errors
#![deny(unsafe_code)]                 // Unsafe code is forbidden
#![deny(missing_docs)]                // All public items must be documented
#![deny(dead_code)]                   // Unused code is forbidden
#![deny(non_camel_case_types)]        // Types must follow CamelCase convention

// Additional strictness - Leave nothing unchecked
#![deny(unused_imports)]              // Unused imports are forbidden
#![deny(unused_variables)]            // Unused variables are forbidden
#![deny(unused_must_use)]             // Must handle Result and Option explicitly
#![deny(non_snake_case)]              // Variables and functions must be snake_case
#![deny(non_upper_case_globals)]      // Constants must be UPPER_CASE
#![deny(nonstandard_style)]           // Non-standard code style is forbidden
#![forbid(unsafe_op_in_unsafe_fn)]    // Unsafe ops in unsafe fns are forbidden

// Clippy lints (warnings only)
#![warn(clippy::all)]                 // All standard Clippy lints
#![warn(clippy::pedantic)]            // Very strict Clippy lints
#![warn(clippy::nursery)]             // Experimental lints
#![warn(clippy::unwrap_used)]         // unwrap() warning
#![warn(clippy::expect_used)]         // expect() warning
#![warn(clippy::panic)]               // panic!() warning
#![warn(clippy::print_stdout)]        // println!() warning
#![warn(clippy::todo)]                // TODO warning
#![warn(clippy::unimplemented)]       // unimplemented!() warning
#![warn(clippy::missing_const_for_fn)] // Force const when possible
#![warn(clippy::unwrap_in_result)]    // unwrap() in Result warning
#![warn(clippy::module_inception)]    // Module with same name as crate warning
#![warn(clippy::redundant_clone)]     // Useless clones warning
#![warn(clippy::shadow_unrelated)]    // Shadowing unrelated variables warning
#![warn(clippy::too_many_arguments)]  // Limit function arguments
#![warn(clippy::cognitive_complexity)] // Limit cognitive complexity

// Safety and robustness lints
#![deny(overflowing_literals)]        // Overflowing literals are forbidden
#![deny(arithmetic_overflow)]         // Arithmetic overflow is forbidden

// ============================================================================
// Crate Documentation
// ============================================================================

//! # Tailor
//!
//! A drift-detection and change-planning engine for OpenShift-style clusters.
//!
//! ## Overview
//!
//! Tailor reconciles a set of *desired* resource manifests against the
//! *current* state of resources living on the cluster, and emits the minimal
//! ordered set of mutations required to drive the cluster into the desired
//! state:
//!
//! - Create a resource that only exists in the templates
//! - Update a resource via an RFC 6902 JSON patch set
//! - Delete a resource that only exists on the cluster
//! - Delete and recreate a resource whose immutable fields drifted
//!
//! ## Architecture
//!
//! The engine is purely computational: it consumes two already-parsed generic
//! trees per resource (one desired, one current) and produces a [`Changeset`].
//! Loading templates, talking to the cluster API and executing the changeset
//! are the caller's concern.
//!
//! 1. **Canonicalization**: each tree becomes a [`ResourceItem`] - platform
//!    noise is stripped, tailor bookkeeping annotations are round-tripped,
//!    and every reachable JSON pointer is indexed
//! 2. **Diffing**: the [`Differ`] walks the pointer indexes of a matched pair
//!    and computes a minimal, path-sorted JSON patch set
//! 3. **Planning**: the [`Changeset`] buckets per-resource changes into
//!    create/update/delete and orders them by resource-kind dependency
//!
//! ## Modules
//!
//! - [`pointer`]: RFC 6901 JSON pointer helpers
//! - [`resource`]: resource canonicalization, lists and filters
//! - [`planner`]: change model, differ and changeset assembly
//! - [`error`]: error hierarchy
//!
//! ## Example
//!
//! ```
//! use serde_json::json;
//! use tailor::{Changeset, ResourceList, Source};
//!
//! let desired = json!({
//!     "apiVersion": "v1",
//!     "kind": "PersistentVolumeClaim",
//!     "metadata": { "name": "storage" },
//!     "spec": { "storageClassName": "gp2" }
//! });
//!
//! let mut desired_list =
//!     ResourceList::from_values(Source::Template, vec![desired], None).unwrap();
//! let mut current_list = ResourceList::new(Source::Platform);
//!
//! let changeset = Changeset::new(&mut current_list, &mut desired_list, false, &[]).unwrap();
//! assert_eq!(changeset.create.len(), 1);
//! ```

// ============================================================================
// Modules
// ============================================================================

pub mod error;
pub mod planner;
pub mod pointer;
pub mod resource;

// ============================================================================
// Re-exports
// ============================================================================

pub use error::{PointerError, ResourceError, Result, TailorError};
pub use planner::{Change, ChangeAction, Changeset, Differ, JsonPatch, PatchOp};
pub use resource::{normalize_kind, ResourceFilter, ResourceItem, ResourceList, Source};
