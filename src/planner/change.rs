//! Change and JSON patch model.
//!
//! A [`Change`] is one planned mutation on one resource. Updates carry an
//! ordered RFC 6902 patch set; creates and deletes carry the full desired or
//! current state instead.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use similar::TextDiff;

use crate::resource::ResourceItem;

/// Per-resource action planned by the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeAction {
    /// The resource only exists in the templates.
    Create,
    /// The resource drifted and can be patched in place.
    Update,
    /// The resource only exists on the platform.
    Delete,
    /// The resource is in sync.
    Noop,
}

impl std::fmt::Display for ChangeAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Create => "create",
            Self::Update => "update",
            Self::Delete => "delete",
            Self::Noop => "noop",
        };
        write!(f, "{s}")
    }
}

/// RFC 6902 operation kind.
///
/// `Noop` is internal bookkeeping for the differ and never appears in an
/// emitted change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PatchOp {
    /// Add a value at a path that does not exist yet.
    Add,
    /// Replace the value at an existing path.
    Replace,
    /// Remove the value at an existing path.
    Remove,
    /// No operation; dropped at emission.
    Noop,
}

/// One RFC 6902 patch operation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JsonPatch {
    /// Operation kind.
    pub op: PatchOp,
    /// JSON pointer the operation applies to.
    pub path: String,
    /// Operand, present for `add` and `replace`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<Value>,
}

impl JsonPatch {
    /// Creates an `add` patch.
    #[must_use]
    pub fn add(path: impl Into<String>, value: Value) -> Self {
        Self {
            op: PatchOp::Add,
            path: path.into(),
            value: Some(value),
        }
    }

    /// Creates a `replace` patch.
    #[must_use]
    pub fn replace(path: impl Into<String>, value: Value) -> Self {
        Self {
            op: PatchOp::Replace,
            path: path.into(),
            value: Some(value),
        }
    }

    /// Creates a `remove` patch.
    #[must_use]
    pub fn remove(path: impl Into<String>) -> Self {
        Self {
            op: PatchOp::Remove,
            path: path.into(),
            value: None,
        }
    }

    /// Creates an internal `noop` patch.
    #[must_use]
    pub fn noop(path: impl Into<String>) -> Self {
        Self {
            op: PatchOp::Noop,
            path: path.into(),
            value: None,
        }
    }
}

/// One planned mutation on one resource.
#[derive(Debug, Clone)]
pub struct Change {
    /// What to do with the resource.
    pub action: ChangeAction,
    /// Resource kind.
    pub kind: String,
    /// Resource name.
    pub name: String,
    /// Patches sorted ascending by path; only populated for updates.
    pub patches: Vec<JsonPatch>,
    /// YAML rendering of the current configuration (empty for creates).
    pub current_state: String,
    /// YAML rendering of the desired configuration (empty for deletes).
    pub desired_state: String,
}

impl Change {
    /// Creates a `Create` change for a desired item without counterpart.
    #[must_use]
    pub(crate) fn create(item: &ResourceItem) -> Self {
        Self {
            action: ChangeAction::Create,
            kind: item.kind.clone(),
            name: item.name.clone(),
            patches: Vec::new(),
            current_state: String::new(),
            desired_state: item.yaml_config(),
        }
    }

    /// Creates a `Delete` change for a current item without counterpart.
    #[must_use]
    pub(crate) fn delete(item: &ResourceItem) -> Self {
        Self {
            action: ChangeAction::Delete,
            kind: item.kind.clone(),
            name: item.name.clone(),
            patches: Vec::new(),
            current_state: item.yaml_config(),
            desired_state: String::new(),
        }
    }

    /// Creates an `Update` change from a computed patch set, or a `Noop`
    /// change when the set is empty. Patches must already be sorted by path.
    #[must_use]
    pub(crate) fn update(
        desired: &ResourceItem,
        current: &ResourceItem,
        patches: Vec<JsonPatch>,
    ) -> Self {
        let action = if patches.is_empty() {
            ChangeAction::Noop
        } else {
            ChangeAction::Update
        };
        Self {
            action,
            kind: desired.kind.clone(),
            name: desired.name.clone(),
            patches,
            current_state: current.yaml_config(),
            desired_state: desired.yaml_config(),
        }
    }

    /// Returns the short `kind/name` form, e.g. `dc/foo`.
    #[must_use]
    pub fn item_name(&self) -> String {
        format!("{}/{}", short_kind(&self.kind), self.name)
    }

    /// Renders the patches as a JSON array, compact for wire transmission
    /// or pretty for human output.
    #[must_use]
    pub fn json_patches(&self, pretty: bool) -> String {
        let rendered = if pretty {
            serde_json::to_string_pretty(&self.patches)
        } else {
            serde_json::to_string(&self.patches)
        };
        rendered.unwrap_or_default()
    }

    /// Renders a unified diff between current and desired state with three
    /// lines of context.
    #[must_use]
    pub fn diff(&self) -> String {
        let text_diff = TextDiff::from_lines(&self.current_state, &self.desired_state);
        text_diff
            .unified_diff()
            .context_radius(3)
            .header("Current State", "Desired State")
            .to_string()
    }
}

impl std::fmt::Display for Change {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {}/{}", self.action, self.kind, self.name)
    }
}

/// Maps canonical kind names to their short CLI form. Unknown kinds render
/// unchanged.
fn short_kind(kind: &str) -> &str {
    match kind {
        "Service" => "svc",
        "Route" => "route",
        "DeploymentConfig" => "dc",
        "BuildConfig" => "bc",
        "ImageStream" => "is",
        "PersistentVolumeClaim" => "pvc",
        "Template" => "template",
        "ConfigMap" => "cm",
        "Secret" => "secret",
        "RoleBinding" => "rolebinding",
        "ServiceAccount" => "serviceaccount",
        _ => kind,
    }
}
