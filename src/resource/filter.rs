//! Participation filter for resource lists.
//!
//! Decides which resources take part in a planning pass, by kind, by
//! `Kind/name`, or by `key=value` label.

use crate::error::{ResourceError, Result};

use super::item::ResourceItem;

/// Short and lowercase kind aliases mapped to canonical kind names.
const KIND_MAPPING: [(&str, &str); 17] = [
    ("svc", "Service"),
    ("service", "Service"),
    ("route", "Route"),
    ("dc", "DeploymentConfig"),
    ("deploymentconfig", "DeploymentConfig"),
    ("bc", "BuildConfig"),
    ("buildconfig", "BuildConfig"),
    ("is", "ImageStream"),
    ("imagestream", "ImageStream"),
    ("pvc", "PersistentVolumeClaim"),
    ("persistentvolumeclaim", "PersistentVolumeClaim"),
    ("template", "Template"),
    ("cm", "ConfigMap"),
    ("configmap", "ConfigMap"),
    ("secret", "Secret"),
    ("rolebinding", "RoleBinding"),
    ("serviceaccount", "ServiceAccount"),
];

/// Resolves a user-supplied kind (short or lowercase form) to its canonical
/// name. Canonical names pass through unchanged.
///
/// # Errors
///
/// Returns an error for kinds the engine does not know.
pub fn normalize_kind(kind: &str) -> Result<String> {
    let lowered = kind.to_lowercase();
    KIND_MAPPING
        .iter()
        .find(|(alias, _)| *alias == lowered)
        .map(|(_, canonical)| (*canonical).to_string())
        .ok_or_else(|| {
            ResourceError::UnknownKind {
                kind: kind.to_string(),
            }
            .into()
        })
}

/// Decides which resources participate in a planning pass.
///
/// An empty filter matches everything.
#[derive(Debug, Clone, Default)]
pub struct ResourceFilter {
    /// Canonical kind names to include; empty means all kinds.
    pub kinds: Vec<String>,
    /// Exact `Kind/name` to include.
    pub name: Option<String>,
    /// `key=value` label selector.
    pub label: Option<String>,
}

impl ResourceFilter {
    /// Creates a filter, normalizing the given kinds.
    ///
    /// # Errors
    ///
    /// Returns an error for unknown kinds.
    pub fn new(kinds: &[&str], name: Option<&str>, label: Option<&str>) -> Result<Self> {
        let mut normalized = Vec::with_capacity(kinds.len());
        for kind in kinds {
            normalized.push(normalize_kind(kind)?);
        }
        normalized.sort();
        normalized.dedup();
        Ok(Self {
            kinds: normalized,
            name: name.map(str::to_string),
            label: label.map(str::to_string),
        })
    }

    /// Returns true if the item participates.
    #[must_use]
    pub fn matches(&self, item: &ResourceItem) -> bool {
        if let Some(name) = &self.name
            && name != &item.full_name()
        {
            return false;
        }
        if !self.kinds.is_empty() && !self.kinds.iter().any(|kind| kind == &item.kind) {
            return false;
        }
        if let Some(label) = &self.label
            && !item.has_label(label)
        {
            return false;
        }
        true
    }
}
