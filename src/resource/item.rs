//! Resource items and the canonicalization pipeline.
//!
//! A [`ResourceItem`] is the comparable view of one resource: identity,
//! labels and annotations are extracted, platform-owned fields are stripped,
//! tailor bookkeeping annotations are round-tripped, and every reachable
//! JSON pointer is indexed into a path list the differ walks.

use std::collections::{BTreeMap, HashMap};

use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::{Map, Value};
use tracing::debug;

use crate::error::{ResourceError, Result};
use crate::pointer;

/// Path of the annotations mapping inside a resource tree.
pub(crate) const ANNOTATIONS_PATH: &str = "/metadata/annotations";

/// Annotation key recording which annotation keys tailor manages.
pub(crate) const MANAGED_ANNOTATION: &str = "tailor.opendevstack.org/managed-annotations";

/// Pointer of the managed-annotations annotation (key escaped per RFC 6901).
pub(crate) const MANAGED_ANNOTATION_PATH: &str =
    "/metadata/annotations/tailor.opendevstack.org~1managed-annotations";

/// Annotation key recording last-applied values for platform-mutated fields.
pub(crate) const APPLIED_CONFIG_ANNOTATION: &str = "tailor.opendevstack.org/applied-config";

/// Pointer of the applied-config annotation (key escaped per RFC 6901).
pub(crate) const APPLIED_CONFIG_ANNOTATION_PATH: &str =
    "/metadata/annotations/tailor.opendevstack.org~1applied-config";

/// Fields the platform owns outright; deleted from every resource.
const PLATFORM_MANAGED_SIMPLE_FIELDS: [&str; 6] = [
    "/metadata/generation",
    "/metadata/creationTimestamp",
    "/spec/tags",
    "/status",
    "/spec/volumeName",
    "/spec/template/metadata/creationTimestamp",
];

/// Platform-owned fields addressed by pattern (array indices vary).
static PLATFORM_MANAGED_REGEX_FIELDS: Lazy<Vec<Regex>> = Lazy::new(|| {
    vec![
        Regex::new("^/spec/triggers/[0-9]+/imageChangeParams/lastTriggeredImage")
            .expect("pattern is valid"),
    ]
});

/// Spec fields the platform mutates after apply; their last-applied values
/// are recorded in the applied-config annotation.
static PLATFORM_MODIFIED_FIELDS: Lazy<Vec<Regex>> = Lazy::new(|| {
    vec![Regex::new("/spec/template/spec/containers/[0-9]+/image$").expect("pattern is valid")]
});

/// Pointers that cannot be patched in place, per resource kind. Any drift
/// at one of these forces a delete + create pair.
static IMMUTABLE_FIELDS: Lazy<HashMap<&'static str, Vec<&'static str>>> = Lazy::new(|| {
    HashMap::from([
        ("Route", vec!["/spec/host"]),
        (
            "PersistentVolumeClaim",
            vec![
                "/spec/accessModes",
                "/spec/storageClassName",
                "/spec/resources/requests/storage",
            ],
        ),
        ("Secret", vec!["/type"]),
    ])
});

/// Origin of a resource item.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Source {
    /// Desired state, rendered from a template.
    Template,
    /// Current state, read from the platform.
    Platform,
}

impl Source {
    /// Returns the lowercase name of the source.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Template => "template",
            Self::Platform => "platform",
        }
    }
}

impl std::fmt::Display for Source {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Canonicalized view of one resource.
///
/// Created once from a parsed tree and canonicalized immediately. The
/// differ's preparation step may mutate it afterwards; it is read-only from
/// then on.
#[derive(Debug, Clone)]
pub struct ResourceItem {
    /// Where the resource came from.
    pub source: Source,
    /// Resource kind, e.g. `DeploymentConfig`.
    pub kind: String,
    /// Resource name.
    pub name: String,
    /// Labels mapping (possibly empty).
    pub labels: Map<String, Value>,
    /// Annotations mapping minus the tailor bookkeeping annotations.
    pub annotations: Map<String, Value>,
    /// Whether the original tree had an annotations mapping at all.
    ///
    /// Distinguishes "absent" from "empty": patching below
    /// `/metadata/annotations` requires the mapping to exist.
    pub annotations_present: bool,
    /// The post-canonicalization configuration tree.
    pub config: Value,
    /// Every JSON pointer existing in `config`, parents before descendants.
    pub paths: Vec<String>,
    /// Sorted unique annotation keys managed by tailor for this resource.
    pub tailor_managed_annotations: Vec<String>,
    /// JSON pointer to stringified value, for spec fields the platform
    /// mutates after apply.
    pub tailor_applied_config_fields: BTreeMap<String, String>,
}

impl ResourceItem {
    /// Creates an item from a parsed resource tree, canonicalizing it.
    ///
    /// The tree is consumed: canonicalization strips platform-owned fields
    /// and tailor bookkeeping annotations in place.
    ///
    /// # Errors
    ///
    /// Returns an error if `/kind` or `/metadata/name` are missing or not
    /// strings, or if a tailor annotation fails to round-trip.
    pub fn new(config: Value, source: Source) -> Result<Self> {
        let mut item = Self {
            source,
            kind: String::new(),
            name: String::new(),
            labels: Map::new(),
            annotations: Map::new(),
            annotations_present: false,
            config,
            paths: Vec::new(),
            tailor_managed_annotations: Vec::new(),
            tailor_applied_config_fields: BTreeMap::new(),
        };
        item.canonicalize()?;
        Ok(item)
    }

    /// Returns the `Kind/Name` form of the item.
    #[must_use]
    pub fn full_name(&self) -> String {
        format!("{}/{}", self.kind, self.name)
    }

    /// Returns true if the item carries the given `key=value` label.
    #[must_use]
    pub fn has_label(&self, label: &str) -> bool {
        let Some((key, expected)) = label.split_once('=') else {
            return false;
        };
        self.labels.get(key).and_then(Value::as_str) == Some(expected)
    }

    /// Renders the canonical configuration as YAML.
    #[must_use]
    pub fn yaml_config(&self) -> String {
        serde_yaml::to_string(&self.config).unwrap_or_default()
    }

    /// Returns true if `path` cannot be patched in place for this kind.
    #[must_use]
    pub fn is_immutable_field(&self, path: &str) -> bool {
        IMMUTABLE_FIELDS
            .get(self.kind.as_str())
            .is_some_and(|fields| fields.iter().any(|field| *field == path))
    }

    /// Runs the fixed canonicalization pipeline. Every step runs
    /// unconditionally; branching only on the source.
    fn canonicalize(&mut self) -> Result<()> {
        self.extract_identity()?;
        self.capture_annotations();
        self.extract_managed_annotations()?;
        self.replay_applied_config()?;
        self.strip_simple_fields();
        self.walk_paths();
        self.strip_regex_fields()?;
        self.mirror_platform_modified_fields()?;
        Ok(())
    }

    /// Reads kind, name and labels out of the tree.
    fn extract_identity(&mut self) -> Result<()> {
        self.kind = self.required_string("/kind")?;
        self.name = self.required_string("/metadata/name")?;
        if let Ok(labels) = pointer::resolve(&self.config, "/metadata/labels")
            && let Some(map) = labels.as_object()
        {
            self.labels = map.clone();
        }
        Ok(())
    }

    /// Copies the annotations mapping, remembering whether it existed.
    fn capture_annotations(&mut self) {
        if let Ok(annotations) = pointer::resolve(&self.config, ANNOTATIONS_PATH)
            && let Some(map) = annotations.as_object()
        {
            self.annotations_present = true;
            self.annotations = map.clone();
        }
    }

    /// Figures out which annotations tailor manages.
    ///
    /// For platform items only the keys listed in the managed-annotations
    /// marker are managed; the marker itself is stripped. For template
    /// items every annotation is managed.
    fn extract_managed_annotations(&mut self) -> Result<()> {
        match self.source {
            Source::Platform => {
                let Some(value) = self.annotations.get(MANAGED_ANNOTATION).cloned() else {
                    return Ok(());
                };
                let joined = value.as_str().ok_or_else(|| {
                    ResourceError::malformed_annotation(MANAGED_ANNOTATION, "expected a string value")
                })?;
                self.tailor_managed_annotations = joined
                    .split(',')
                    .filter(|part| !part.is_empty())
                    .map(str::to_string)
                    .collect();
                self.tailor_managed_annotations.sort();
                self.tailor_managed_annotations.dedup();
                pointer::delete(&mut self.config, MANAGED_ANNOTATION_PATH)
                    .map_err(|_| ResourceError::invariant(MANAGED_ANNOTATION_PATH))?;
                self.annotations.remove(MANAGED_ANNOTATION);
            }
            Source::Template => {
                self.tailor_managed_annotations = self.annotations.keys().cloned().collect();
                self.tailor_managed_annotations.sort();
            }
        }
        Ok(())
    }

    /// Replays the applied-config annotation into the spec (platform only).
    ///
    /// The platform overwrites some applied values with actual ones. To keep
    /// a stable comparison basis, the recorded last-applied values are copied
    /// back over whatever the platform mutated them to, and the annotation is
    /// stripped.
    fn replay_applied_config(&mut self) -> Result<()> {
        if self.source != Source::Platform {
            return Ok(());
        }
        let Some(value) = self.annotations.get(APPLIED_CONFIG_ANNOTATION).cloned() else {
            return Ok(());
        };
        let raw = value.as_str().ok_or_else(|| {
            ResourceError::malformed_annotation(APPLIED_CONFIG_ANNOTATION, "expected a string value")
        })?;
        let fields: BTreeMap<String, String> = serde_json::from_str(raw).map_err(|err| {
            ResourceError::malformed_annotation(APPLIED_CONFIG_ANNOTATION, err.to_string())
        })?;
        for (path, applied) in &fields {
            debug!(%path, value = %applied, item = %self.full_name(), "replaying applied config");
            pointer::set(&mut self.config, path, Value::String(applied.clone())).map_err(
                |err| {
                    ResourceError::malformed_annotation(
                        APPLIED_CONFIG_ANNOTATION,
                        format!("could not set {path}: {err}"),
                    )
                },
            )?;
        }
        self.tailor_applied_config_fields = fields;
        pointer::delete(&mut self.config, APPLIED_CONFIG_ANNOTATION_PATH)
            .map_err(|_| ResourceError::invariant(APPLIED_CONFIG_ANNOTATION_PATH))?;
        self.annotations.remove(APPLIED_CONFIG_ANNOTATION);
        Ok(())
    }

    /// Deletes platform-owned simple fields, if present.
    fn strip_simple_fields(&mut self) {
        for path in PLATFORM_MANAGED_SIMPLE_FIELDS {
            if pointer::delete(&mut self.config, path).is_ok() {
                debug!(path, item = %self.full_name(), "removed platform managed field");
            }
        }
    }

    /// Indexes every pointer reachable in the config.
    fn walk_paths(&mut self) {
        let mut paths = Vec::new();
        walk_value(&self.config, "", &mut paths);
        self.paths = paths;
    }

    /// Deletes platform-owned fields addressed by pattern.
    fn strip_regex_fields(&mut self) -> Result<()> {
        let matched: Vec<String> = self
            .paths
            .iter()
            .filter(|path| {
                PLATFORM_MANAGED_REGEX_FIELDS
                    .iter()
                    .any(|field| field.is_match(path))
            })
            .cloned()
            .collect();
        for path in &matched {
            debug!(%path, item = %self.full_name(), "removing platform managed path");
            pointer::delete(&mut self.config, path)
                .map_err(|_| ResourceError::invariant(path.clone()))?;
        }
        self.paths.retain(|path| {
            !matched
                .iter()
                .any(|removed| removed == path || pointer::is_prefix(removed, path))
        });
        Ok(())
    }

    /// Records spec fields the platform will mutate after apply
    /// (template only). The differ serializes the recorded values into the
    /// applied-config annotation at patch-emission time.
    fn mirror_platform_modified_fields(&mut self) -> Result<()> {
        if self.source != Source::Template {
            return Ok(());
        }
        let mut mirrored = BTreeMap::new();
        for path in &self.paths {
            if !PLATFORM_MODIFIED_FIELDS.iter().any(|field| field.is_match(path)) {
                continue;
            }
            let value = pointer::resolve(&self.config, path)?;
            let scalar = value
                .as_str()
                .ok_or_else(|| ResourceError::NotAString { pointer: path.clone() })?;
            mirrored.insert(path.clone(), scalar.to_string());
        }
        self.tailor_applied_config_fields.extend(mirrored);
        Ok(())
    }

    /// Reads a required string field.
    fn required_string(&self, path: &str) -> Result<String> {
        let value = pointer::resolve(&self.config, path).map_err(|_| {
            ResourceError::MissingField {
                pointer: path.to_string(),
            }
        })?;
        let scalar = value.as_str().ok_or_else(|| ResourceError::NotAString {
            pointer: path.to_string(),
        })?;
        Ok(scalar.to_string())
    }

    /// Mirrors externally-controlled values from the platform item into this
    /// template item, making them invisible to comparison.
    ///
    /// Paths absent in the platform item, or unsettable here, are skipped.
    pub(crate) fn mirror_externally_modified_paths(
        &mut self,
        platform_item: &ResourceItem,
        externally_modified_paths: &[String],
    ) {
        for path in externally_modified_paths {
            let value = match pointer::resolve(&platform_item.config, path) {
                Ok(value) => value.clone(),
                Err(_) => {
                    debug!(%path, item = %platform_item.full_name(), "no such path in platform item");
                    continue;
                }
            };
            if let Err(err) = pointer::set(&mut self.config, path, value.clone()) {
                debug!(%path, item = %self.full_name(), error = %err, "could not mirror externally modified path");
                continue;
            }
            let mut subtree = vec![path.clone()];
            walk_value(&value, path, &mut subtree);
            for subpath in subtree {
                if !self.paths.contains(&subpath) {
                    self.paths.push(subpath);
                }
            }
        }
    }

    /// Deletes every annotation on this platform item that is neither
    /// managed here nor in the given template item, scoping annotation
    /// comparison to the managed union.
    pub(crate) fn scope_annotations_to_managed(
        &mut self,
        template_item: &ResourceItem,
    ) -> Result<()> {
        let unmanaged: Vec<String> = self
            .annotations
            .keys()
            .filter(|key| {
                !template_item
                    .tailor_managed_annotations
                    .iter()
                    .any(|managed| managed == *key)
                    && !self
                        .tailor_managed_annotations
                        .iter()
                        .any(|managed| managed == *key)
            })
            .cloned()
            .collect();
        for key in &unmanaged {
            let path = format!("{ANNOTATIONS_PATH}/{}", pointer::escape(key));
            debug!(%path, item = %self.full_name(), "removing unmanaged annotation from comparison");
            pointer::delete(&mut self.config, &path)
                .map_err(|_| ResourceError::invariant(path.clone()))?;
            self.paths.retain(|existing| existing != &path);
        }
        Ok(())
    }
}

/// Appends the pointer of every location under `value` to `paths`, parents
/// before descendants. Keys are escaped per RFC 6901.
fn walk_value(value: &Value, prefix: &str, paths: &mut Vec<String>) {
    match value {
        Value::Object(map) => {
            for (key, child) in map {
                let child_pointer = format!("{prefix}/{}", pointer::escape(key));
                paths.push(child_pointer.clone());
                walk_value(child, &child_pointer, paths);
            }
        }
        Value::Array(items) => {
            for (index, child) in items.iter().enumerate() {
                let child_pointer = format!("{prefix}/{index}");
                paths.push(child_pointer.clone());
                walk_value(child, &child_pointer, paths);
            }
        }
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn deployment_config() -> Value {
        json!({
            "apiVersion": "apps.openshift.io/v1",
            "kind": "DeploymentConfig",
            "metadata": {
                "name": "foo",
                "labels": { "app": "foo" }
            },
            "spec": {
                "replicas": 1,
                "template": {
                    "metadata": {},
                    "spec": {
                        "containers": [
                            { "image": "bar/foo:latest", "name": "foo" }
                        ]
                    }
                },
                "triggers": [
                    {
                        "imageChangeParams": {
                            "automatic": true,
                            "lastTriggeredImage": "bar/foo@sha256:abc"
                        },
                        "type": "ImageChange"
                    }
                ]
            },
            "status": { "latestVersion": 3 }
        })
    }

    #[test]
    fn test_extracts_identity_and_labels() {
        let item = ResourceItem::new(deployment_config(), Source::Template).unwrap();
        assert_eq!(item.kind, "DeploymentConfig");
        assert_eq!(item.name, "foo");
        assert_eq!(item.full_name(), "DeploymentConfig/foo");
        assert_eq!(item.labels.get("app"), Some(&json!("foo")));
        assert!(item.has_label("app=foo"));
        assert!(!item.has_label("app=bar"));
        assert!(!item.has_label("app"));
    }

    #[test]
    fn test_rejects_missing_kind() {
        let tree = json!({ "metadata": { "name": "foo" } });
        let err = ResourceItem::new(tree, Source::Template).unwrap_err();
        assert!(err.to_string().contains("/kind"));
    }

    #[test]
    fn test_rejects_non_string_name() {
        let tree = json!({ "kind": "Service", "metadata": { "name": 42 } });
        let err = ResourceItem::new(tree, Source::Template).unwrap_err();
        assert!(err.to_string().contains("/metadata/name"));
    }

    #[test]
    fn test_tracks_annotation_presence() {
        let absent = ResourceItem::new(deployment_config(), Source::Platform).unwrap();
        assert!(!absent.annotations_present);
        assert!(absent.annotations.is_empty());

        let mut tree = deployment_config();
        pointer::set(&mut tree, ANNOTATIONS_PATH, json!({})).unwrap();
        let empty = ResourceItem::new(tree, Source::Platform).unwrap();
        assert!(empty.annotations_present);
        assert!(empty.annotations.is_empty());
    }

    #[test]
    fn test_strips_platform_owned_fields() {
        let item = ResourceItem::new(deployment_config(), Source::Platform).unwrap();
        assert!(pointer::resolve(&item.config, "/status").is_err());
        assert!(pointer::resolve(
            &item.config,
            "/spec/triggers/0/imageChangeParams/lastTriggeredImage"
        )
        .is_err());
        assert!(pointer::resolve(&item.config, "/spec/triggers/0/imageChangeParams/automatic").is_ok());
        assert!(!item
            .paths
            .iter()
            .any(|path| path.contains("lastTriggeredImage") || path.starts_with("/status")));
    }

    #[test]
    fn test_paths_resolve_with_parents_first() {
        let item = ResourceItem::new(deployment_config(), Source::Template).unwrap();
        for path in &item.paths {
            assert!(pointer::resolve(&item.config, path).is_ok(), "dangling {path}");
        }
        let parent = item
            .paths
            .iter()
            .position(|path| path == "/spec/template/spec")
            .unwrap();
        let child = item
            .paths
            .iter()
            .position(|path| path == "/spec/template/spec/containers/0")
            .unwrap();
        assert!(parent < child);
    }

    #[test]
    fn test_escapes_map_keys_in_paths() {
        let tree = json!({
            "kind": "ConfigMap",
            "metadata": {
                "name": "foo",
                "annotations": { "a/b": "c" }
            }
        });
        let item = ResourceItem::new(tree, Source::Template).unwrap();
        assert!(item
            .paths
            .iter()
            .any(|path| path == "/metadata/annotations/a~1b"));
    }

    #[test]
    fn test_template_manages_all_annotations() {
        let tree = json!({
            "kind": "ImageStream",
            "metadata": {
                "name": "foo",
                "annotations": { "b": "2", "a": "1" }
            }
        });
        let item = ResourceItem::new(tree, Source::Template).unwrap();
        assert_eq!(item.tailor_managed_annotations, vec!["a", "b"]);
    }

    #[test]
    fn test_platform_managed_annotations_come_from_marker() {
        let tree = json!({
            "kind": "ImageStream",
            "metadata": {
                "name": "foo",
                "annotations": {
                    "bar": "baz",
                    "unmanaged": "x",
                    "tailor.opendevstack.org/managed-annotations": "foo,bar"
                }
            }
        });
        let item = ResourceItem::new(tree, Source::Platform).unwrap();
        assert_eq!(item.tailor_managed_annotations, vec!["bar", "foo"]);
        assert!(!item.annotations.contains_key(MANAGED_ANNOTATION));
        assert!(pointer::resolve(&item.config, MANAGED_ANNOTATION_PATH).is_err());
        assert!(pointer::resolve(&item.config, "/metadata/annotations/bar").is_ok());
    }

    #[test]
    fn test_platform_without_marker_manages_nothing() {
        let tree = json!({
            "kind": "ImageStream",
            "metadata": {
                "name": "foo",
                "annotations": { "bar": "baz" }
            }
        });
        let item = ResourceItem::new(tree, Source::Platform).unwrap();
        assert!(item.tailor_managed_annotations.is_empty());
    }

    #[test]
    fn test_replays_applied_config() {
        let mut tree = deployment_config();
        pointer::set(
            &mut tree,
            "/spec/template/spec/containers/0/image",
            json!("bar/foo@sha256:123"),
        )
        .unwrap();
        pointer::set(
            &mut tree,
            ANNOTATIONS_PATH,
            json!({
                "tailor.opendevstack.org/applied-config":
                    "{\"/spec/template/spec/containers/0/image\":\"bar/foo:latest\"}"
            }),
        )
        .unwrap();

        let item = ResourceItem::new(tree, Source::Platform).unwrap();
        assert_eq!(
            pointer::resolve(&item.config, "/spec/template/spec/containers/0/image").unwrap(),
            &json!("bar/foo:latest")
        );
        assert_eq!(
            item.tailor_applied_config_fields
                .get("/spec/template/spec/containers/0/image"),
            Some(&String::from("bar/foo:latest"))
        );
        assert!(!item.annotations.contains_key(APPLIED_CONFIG_ANNOTATION));
        assert!(pointer::resolve(&item.config, APPLIED_CONFIG_ANNOTATION_PATH).is_err());
    }

    #[test]
    fn test_rejects_malformed_applied_config() {
        let mut tree = deployment_config();
        pointer::set(
            &mut tree,
            ANNOTATIONS_PATH,
            json!({ "tailor.opendevstack.org/applied-config": "not json" }),
        )
        .unwrap();
        let err = ResourceItem::new(tree, Source::Platform).unwrap_err();
        assert!(err.to_string().contains("applied-config"));
    }

    #[test]
    fn test_template_mirrors_container_images() {
        let item = ResourceItem::new(deployment_config(), Source::Template).unwrap();
        assert_eq!(
            item.tailor_applied_config_fields
                .get("/spec/template/spec/containers/0/image"),
            Some(&String::from("bar/foo:latest"))
        );

        let platform = ResourceItem::new(deployment_config(), Source::Platform).unwrap();
        assert!(platform.tailor_applied_config_fields.is_empty());
    }

    #[test]
    fn test_immutable_fields_are_kind_aware() {
        let pvc = json!({
            "kind": "PersistentVolumeClaim",
            "metadata": { "name": "foo" },
            "spec": { "storageClassName": "gp2" }
        });
        let item = ResourceItem::new(pvc, Source::Template).unwrap();
        assert!(item.is_immutable_field("/spec/storageClassName"));
        assert!(item.is_immutable_field("/spec/resources/requests/storage"));
        assert!(!item.is_immutable_field("/spec/resources"));

        let service = json!({ "kind": "Service", "metadata": { "name": "foo" } });
        let other = ResourceItem::new(service, Source::Template).unwrap();
        assert!(!other.is_immutable_field("/spec/host"));
    }

    #[test]
    fn test_yaml_config_renders() {
        let item = ResourceItem::new(deployment_config(), Source::Template).unwrap();
        let yaml = item.yaml_config();
        assert!(yaml.contains("kind: DeploymentConfig"));
        assert!(yaml.contains("name: foo"));
    }
}
