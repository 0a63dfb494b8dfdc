//! Changeset assembly: classify per-resource changes and order them.
//!
//! A changeset is the plan of one reconciliation pass: which resources to
//! create, update and delete. The intended execution order across buckets
//! is delete, then create, then update; executing it is the caller's
//! contract.

use tracing::debug;

use crate::error::Result;
use crate::resource::ResourceList;

use super::change::{Change, ChangeAction};
use super::diff::Differ;

/// Workloads must not start before their storage exists, and must be torn
/// down before their storage is removed.
const STORAGE_KIND: &str = "PersistentVolumeClaim";
const WORKLOAD_KIND: &str = "DeploymentConfig";

/// The ordered plan produced by one planning pass.
#[derive(Debug, Default)]
pub struct Changeset {
    /// Resources to create, storage kinds first.
    pub create: Vec<Change>,
    /// Resources to update, storage kinds first.
    pub update: Vec<Change>,
    /// Resources to delete, workload kinds first.
    pub delete: Vec<Change>,
}

impl Changeset {
    /// Builds a changeset from the current and desired resource lists.
    ///
    /// Desired items without a current counterpart become creates; current
    /// items without a desired counterpart become deletes (skipped when
    /// `upsert_only` is set); matched pairs run through the differ. Items
    /// in both lists are mutated by the differ's preparation step.
    ///
    /// # Errors
    ///
    /// Returns the first differ error.
    pub fn new(
        current_list: &mut ResourceList,
        desired_list: &mut ResourceList,
        upsert_only: bool,
        externally_modified_paths: &[String],
    ) -> Result<Self> {
        let differ = Differ::new(externally_modified_paths.to_vec());
        let mut changeset = Self::default();

        for desired_index in 0..desired_list.items.len() {
            let (kind, name) = {
                let item = &desired_list.items[desired_index];
                (item.kind.clone(), item.name.clone())
            };
            if let Some(current_index) = current_list.position(&kind, &name) {
                let changes = differ.changes_from(
                    &mut desired_list.items[desired_index],
                    &mut current_list.items[current_index],
                )?;
                for change in changes {
                    changeset.add(change);
                }
            } else {
                debug!(item = %format!("{kind}/{name}"), "no current counterpart, creating");
                changeset.add(Change::create(&desired_list.items[desired_index]));
            }
        }

        for item in &current_list.items {
            if desired_list.get_item(&item.kind, &item.name).is_some() {
                continue;
            }
            if upsert_only {
                debug!(item = %item.full_name(), "no desired counterpart, kept (upsert only)");
                continue;
            }
            debug!(item = %item.full_name(), "no desired counterpart, deleting");
            changeset.add(Change::delete(item));
        }

        Ok(changeset)
    }

    /// Adds a change into its bucket, keeping the dependency order. Noop
    /// changes are not planned.
    pub fn add(&mut self, change: Change) {
        match change.action {
            ChangeAction::Create => {
                insert_ordered(&mut self.create, change, STORAGE_KIND, WORKLOAD_KIND);
            }
            ChangeAction::Update => {
                insert_ordered(&mut self.update, change, STORAGE_KIND, WORKLOAD_KIND);
            }
            ChangeAction::Delete => {
                insert_ordered(&mut self.delete, change, WORKLOAD_KIND, STORAGE_KIND);
            }
            ChangeAction::Noop => {}
        }
    }

    /// Returns true if no changes are planned.
    #[must_use]
    pub fn is_blank(&self) -> bool {
        self.create.is_empty() && self.update.is_empty() && self.delete.is_empty()
    }
}

/// Inserts `change` into `bucket`, keeping every `first`-kind entry before
/// every `second`-kind entry. All other kinds preserve insertion order.
fn insert_ordered(bucket: &mut Vec<Change>, change: Change, first: &str, second: &str) {
    if change.kind == first
        && let Some(position) = bucket.iter().position(|existing| existing.kind == second)
    {
        bucket.insert(position, change);
        return;
    }
    bucket.push(change);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resource::Source;
    use serde_json::{json, Value};

    fn persistent_volume_claim(name: &str, storage: &str) -> Value {
        json!({
            "apiVersion": "v1",
            "kind": "PersistentVolumeClaim",
            "metadata": { "name": name },
            "spec": {
                "accessModes": ["ReadWriteOnce"],
                "resources": { "requests": { "storage": storage } },
                "storageClassName": "gp2"
            }
        })
    }

    fn deployment_config(name: &str) -> Value {
        json!({
            "apiVersion": "apps.openshift.io/v1",
            "kind": "DeploymentConfig",
            "metadata": { "name": name },
            "spec": { "replicas": 1 }
        })
    }

    fn list(source: Source, values: Vec<Value>) -> ResourceList {
        ResourceList::from_values(source, values, None).unwrap()
    }

    fn bucket_change(kind: &str, action: ChangeAction) -> Change {
        Change {
            action,
            kind: kind.to_string(),
            name: String::from("foo"),
            patches: Vec::new(),
            current_state: String::new(),
            desired_state: String::new(),
        }
    }

    #[test]
    fn test_matching_lists_are_blank() {
        let mut current = list(
            Source::Platform,
            vec![persistent_volume_claim("foo", "5Gi")],
        );
        let mut desired = list(
            Source::Template,
            vec![persistent_volume_claim("foo", "5Gi")],
        );
        let changeset = Changeset::new(&mut current, &mut desired, false, &[]).unwrap();
        assert!(changeset.is_blank());
    }

    #[test]
    fn test_desired_only_item_is_created() {
        let mut current = ResourceList::new(Source::Platform);
        let mut desired = list(Source::Template, vec![deployment_config("foo")]);
        let changeset = Changeset::new(&mut current, &mut desired, false, &[]).unwrap();
        assert_eq!(changeset.create.len(), 1);
        assert_eq!(changeset.create[0].action, ChangeAction::Create);
        assert!(changeset.update.is_empty());
        assert!(changeset.delete.is_empty());
    }

    #[test]
    fn test_current_only_item_is_deleted() {
        let mut current = list(Source::Platform, vec![deployment_config("foo")]);
        let mut desired = ResourceList::new(Source::Template);
        let changeset = Changeset::new(&mut current, &mut desired, false, &[]).unwrap();
        assert_eq!(changeset.delete.len(), 1);
        assert!(changeset.create.is_empty());
    }

    #[test]
    fn test_upsert_only_skips_deletions() {
        let mut current = list(Source::Platform, vec![deployment_config("foo")]);
        let mut desired = ResourceList::new(Source::Template);
        let changeset = Changeset::new(&mut current, &mut desired, true, &[]).unwrap();
        assert!(changeset.is_blank());
    }

    #[test]
    fn test_drifted_pair_is_updated() {
        let mut current = list(Source::Platform, vec![deployment_config("foo")]);
        let mut desired_tree = deployment_config("foo");
        crate::pointer::set(&mut desired_tree, "/spec/replicas", json!(3)).unwrap();
        let mut desired = list(Source::Template, vec![desired_tree]);
        let changeset = Changeset::new(&mut current, &mut desired, false, &[]).unwrap();
        assert_eq!(changeset.update.len(), 1);
        assert_eq!(changeset.update[0].patches.len(), 1);
    }

    #[test]
    fn test_immutable_drift_lands_in_delete_and_create() {
        let mut current = list(
            Source::Platform,
            vec![persistent_volume_claim("foo", "5Gi")],
        );
        let mut desired = list(
            Source::Template,
            vec![persistent_volume_claim("foo", "10Gi")],
        );
        let changeset = Changeset::new(&mut current, &mut desired, false, &[]).unwrap();
        assert_eq!(changeset.delete.len(), 1);
        assert_eq!(changeset.create.len(), 1);
        assert!(changeset.update.is_empty());
        assert_eq!(changeset.delete[0].name, "foo");
        assert_eq!(changeset.create[0].name, "foo");
    }

    #[test]
    fn test_storage_created_before_workload() {
        let mut current = ResourceList::new(Source::Platform);
        let mut desired = list(
            Source::Template,
            vec![
                deployment_config("app"),
                persistent_volume_claim("storage", "5Gi"),
            ],
        );
        let changeset = Changeset::new(&mut current, &mut desired, false, &[]).unwrap();
        assert_eq!(changeset.create[0].kind, "PersistentVolumeClaim");
        assert_eq!(changeset.create[1].kind, "DeploymentConfig");
    }

    #[test]
    fn test_workload_deleted_before_storage() {
        let mut current = list(
            Source::Platform,
            vec![
                persistent_volume_claim("storage", "5Gi"),
                deployment_config("app"),
            ],
        );
        let mut desired = ResourceList::new(Source::Template);
        let changeset = Changeset::new(&mut current, &mut desired, false, &[]).unwrap();
        assert_eq!(changeset.delete[0].kind, "DeploymentConfig");
        assert_eq!(changeset.delete[1].kind, "PersistentVolumeClaim");
    }

    #[test]
    fn test_storage_updated_before_workload() {
        let mut changeset = Changeset::default();
        changeset.add(bucket_change("DeploymentConfig", ChangeAction::Update));
        changeset.add(bucket_change("PersistentVolumeClaim", ChangeAction::Update));
        assert_eq!(changeset.update[0].kind, "PersistentVolumeClaim");
        assert_eq!(changeset.update[1].kind, "DeploymentConfig");
    }

    #[test]
    fn test_other_kinds_preserve_insertion_order() {
        let mut changeset = Changeset::default();
        changeset.add(bucket_change("Service", ChangeAction::Create));
        changeset.add(bucket_change("ConfigMap", ChangeAction::Create));
        changeset.add(bucket_change("Secret", ChangeAction::Create));
        let kinds: Vec<&str> = changeset.create.iter().map(|c| c.kind.as_str()).collect();
        assert_eq!(kinds, vec!["Service", "ConfigMap", "Secret"]);
    }

    #[test]
    fn test_noop_changes_are_not_planned() {
        let mut changeset = Changeset::default();
        changeset.add(bucket_change("Service", ChangeAction::Noop));
        assert!(changeset.is_blank());
    }
}
