//! Differ: computes the patch set between a desired and a current item.
//!
//! The differ walks the pointer indexes of both items. Prefix bookkeeping
//! keeps the patch set minimal: a whole added or removed subtree is one
//! patch at its root. Drift at an immutable field replaces the update with
//! a delete + create pair.

use std::collections::BTreeMap;

use serde_json::{Map, Value};
use tracing::debug;

use crate::error::{ResourceError, Result};
use crate::pointer;
use crate::resource::{
    ResourceItem, ANNOTATIONS_PATH, APPLIED_CONFIG_ANNOTATION, APPLIED_CONFIG_ANNOTATION_PATH,
    MANAGED_ANNOTATION, MANAGED_ANNOTATION_PATH,
};

use super::change::{Change, JsonPatch, PatchOp};

/// Engine computing the changes between matched resource items.
#[derive(Debug, Default)]
pub struct Differ {
    /// JSON pointers whose platform values are mirrored into the desired
    /// item before comparison, making them invisible to drift detection.
    externally_modified_paths: Vec<String>,
}

impl Differ {
    /// Creates a differ.
    #[must_use]
    pub fn new(externally_modified_paths: Vec<String>) -> Self {
        Self {
            externally_modified_paths,
        }
    }

    /// Computes the changes needed to drive `current` into `desired`.
    ///
    /// Returns a single `Update` or `Noop` change, or a `Delete` + `Create`
    /// pair when an immutable field drifted. Both items are mutated by the
    /// preparation step; callers must treat them as consumed.
    ///
    /// # Errors
    ///
    /// Returns an error if a pointer fails to resolve or an annotation
    /// fails to serialize.
    pub fn changes_from(
        &self,
        desired: &mut ResourceItem,
        current: &mut ResourceItem,
    ) -> Result<Vec<Change>> {
        desired.mirror_externally_modified_paths(current, &self.externally_modified_paths);
        current.scope_annotations_to_managed(desired)?;

        let mut comparison: BTreeMap<String, JsonPatch> = BTreeMap::new();
        let mut added_paths: Vec<String> = Vec::new();

        for path in &desired.paths {
            // Subpaths of an already added path are covered by the parent patch.
            if pointer::includes_prefix(&added_paths, path) {
                continue;
            }
            let desired_value = pointer::resolve(&desired.config, path)?;
            match pointer::resolve(&current.config, path) {
                Err(_) => {
                    if desired.is_immutable_field(path) {
                        debug!(%path, item = %desired.full_name(), "immutable field absent on platform");
                        return Ok(recreate_changes(desired, current));
                    }
                    comparison.insert(path.clone(), JsonPatch::add(path, desired_value.clone()));
                    added_paths.push(path.clone());
                }
                Ok(current_value) => {
                    if desired_value.is_array() || desired_value.is_object() {
                        // Composites compare via their descendants.
                        comparison.insert(path.clone(), JsonPatch::noop(path));
                    } else if desired_value == current_value {
                        comparison.insert(path.clone(), JsonPatch::noop(path));
                    } else if desired.is_immutable_field(path) {
                        debug!(%path, item = %desired.full_name(), "immutable field drifted");
                        return Ok(recreate_changes(desired, current));
                    } else {
                        comparison
                            .insert(path.clone(), JsonPatch::replace(path, desired_value.clone()));
                    }
                }
            }
        }

        let mut deleted_paths: Vec<String> = Vec::new();
        for path in &current.paths {
            if comparison.contains_key(path) {
                continue;
            }
            // Subpaths of an already removed path vanish with the parent.
            if pointer::includes_prefix(&deleted_paths, path) {
                continue;
            }
            if desired.is_immutable_field(path) {
                debug!(%path, item = %desired.full_name(), "immutable field only on platform");
                return Ok(recreate_changes(desired, current));
            }
            comparison.insert(path.clone(), JsonPatch::remove(path));
            deleted_paths.push(path.clone());
        }

        synthesize_annotation_patches(&mut comparison, desired, current)?;

        let patches: Vec<JsonPatch> = comparison
            .into_values()
            .filter(|patch| patch.op != PatchOp::Noop)
            .collect();
        Ok(vec![Change::update(desired, current, patches)])
    }
}

/// Builds the delete + create pair replacing an in-place update when an
/// immutable field drifted.
fn recreate_changes(desired: &ResourceItem, current: &ResourceItem) -> Vec<Change> {
    vec![Change::delete(current), Change::create(desired)]
}

/// Re-injects the tailor bookkeeping annotations into the patch set.
///
/// Canonicalization strips the managed-annotations marker and the
/// applied-config annotation from platform items; here the engine ensures
/// patches exist that keep both in sync on the cluster.
fn synthesize_annotation_patches(
    comparison: &mut BTreeMap<String, JsonPatch>,
    desired: &ResourceItem,
    current: &ResourceItem,
) -> Result<()> {
    expand_annotations_removal(comparison, current);

    let desired_marker = desired.tailor_managed_annotations.join(",");
    let current_marker = current.tailor_managed_annotations.join(",");
    let desired_applied = serialize_applied_fields(&desired.tailor_applied_config_fields)?;
    let current_applied = serialize_applied_fields(&current.tailor_applied_config_fields)?;

    if !current.annotations_present {
        // Child patches below /metadata/annotations would fail without the
        // mapping; fold everything into one enclosing add instead.
        if desired_marker.is_empty() && desired_applied.is_none() {
            return Ok(());
        }
        let patch = comparison
            .entry(ANNOTATIONS_PATH.to_string())
            .or_insert_with(|| JsonPatch::add(ANNOTATIONS_PATH, Value::Object(Map::new())));
        if let Some(Value::Object(map)) = patch.value.as_mut() {
            if !desired_marker.is_empty() {
                map.insert(MANAGED_ANNOTATION.to_string(), Value::String(desired_marker));
            }
            if let Some(applied) = desired_applied {
                map.insert(APPLIED_CONFIG_ANNOTATION.to_string(), Value::String(applied));
            }
        }
        return Ok(());
    }

    match (desired_marker.is_empty(), current_marker.is_empty()) {
        (false, true) => {
            comparison.insert(
                MANAGED_ANNOTATION_PATH.to_string(),
                JsonPatch::add(MANAGED_ANNOTATION_PATH, Value::String(desired_marker)),
            );
        }
        (false, false) if desired_marker != current_marker => {
            comparison.insert(
                MANAGED_ANNOTATION_PATH.to_string(),
                JsonPatch::replace(MANAGED_ANNOTATION_PATH, Value::String(desired_marker)),
            );
        }
        (true, false) => {
            comparison.insert(
                MANAGED_ANNOTATION_PATH.to_string(),
                JsonPatch::remove(MANAGED_ANNOTATION_PATH),
            );
        }
        _ => {}
    }

    match (desired_applied, current_applied) {
        (Some(applied), None) => {
            comparison.insert(
                APPLIED_CONFIG_ANNOTATION_PATH.to_string(),
                JsonPatch::add(APPLIED_CONFIG_ANNOTATION_PATH, Value::String(applied)),
            );
        }
        (Some(applied), Some(existing)) if applied != existing => {
            comparison.insert(
                APPLIED_CONFIG_ANNOTATION_PATH.to_string(),
                JsonPatch::replace(APPLIED_CONFIG_ANNOTATION_PATH, Value::String(applied)),
            );
        }
        (None, Some(_)) => {
            comparison.insert(
                APPLIED_CONFIG_ANNOTATION_PATH.to_string(),
                JsonPatch::remove(APPLIED_CONFIG_ANNOTATION_PATH),
            );
        }
        _ => {}
    }

    Ok(())
}

/// Expands a whole-map removal of `/metadata/annotations` into one removal
/// per remaining key. The live mapping may hold unmanaged entries the
/// engine excluded from comparison and must not delete.
fn expand_annotations_removal(
    comparison: &mut BTreeMap<String, JsonPatch>,
    current: &ResourceItem,
) {
    let removes_whole_map = comparison
        .get(ANNOTATIONS_PATH)
        .is_some_and(|patch| patch.op == PatchOp::Remove);
    if !removes_whole_map {
        return;
    }
    comparison.remove(ANNOTATIONS_PATH);
    let Ok(value) = pointer::resolve(&current.config, ANNOTATIONS_PATH) else {
        return;
    };
    let Some(map) = value.as_object() else {
        return;
    };
    for key in map.keys() {
        let path = format!("{ANNOTATIONS_PATH}/{}", pointer::escape(key));
        comparison.insert(path.clone(), JsonPatch::remove(&path));
    }
}

/// Serializes the applied-config fields to their annotation wire form, or
/// `None` when there are none.
fn serialize_applied_fields(
    fields: &BTreeMap<String, String>,
) -> Result<Option<String>> {
    if fields.is_empty() {
        return Ok(None);
    }
    let json = serde_json::to_string(fields).map_err(|err| {
        ResourceError::malformed_annotation(APPLIED_CONFIG_ANNOTATION, err.to_string())
    })?;
    Ok(Some(json))
}
