//! Resource lists: the canonicalized items of one source.

use serde_json::Value;
use tracing::debug;

use crate::error::Result;

use super::filter::ResourceFilter;
use super::item::{ResourceItem, Source};

/// The resources of one source, template or platform.
#[derive(Debug)]
pub struct ResourceList {
    /// Where the items came from.
    pub source: Source,
    /// The canonicalized items, in insertion order.
    pub items: Vec<ResourceItem>,
}

impl ResourceList {
    /// Creates an empty list.
    #[must_use]
    pub const fn new(source: Source) -> Self {
        Self {
            source,
            items: Vec::new(),
        }
    }

    /// Builds a list from pre-parsed resource trees, canonicalizing each.
    ///
    /// Each tree must be rooted at the resource object, not an enclosing
    /// list. Items not matching `filter` are skipped.
    ///
    /// # Errors
    ///
    /// Returns the first canonicalization error.
    pub fn from_values(
        source: Source,
        values: Vec<Value>,
        filter: Option<&ResourceFilter>,
    ) -> Result<Self> {
        let mut list = Self::new(source);
        for value in values {
            let item = ResourceItem::new(value, source)?;
            if filter.is_some_and(|f| !f.matches(&item)) {
                debug!(item = %item.full_name(), %source, "item filtered out");
                continue;
            }
            list.items.push(item);
        }
        Ok(list)
    }

    /// Looks up an item by kind and name.
    #[must_use]
    pub fn get_item(&self, kind: &str, name: &str) -> Option<&ResourceItem> {
        self.items
            .iter()
            .find(|item| item.kind == kind && item.name == name)
    }

    /// Index of the item with the given kind and name.
    pub(crate) fn position(&self, kind: &str, name: &str) -> Option<usize> {
        self.items
            .iter()
            .position(|item| item.kind == kind && item.name == name)
    }

    /// Number of items in the list.
    #[must_use]
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Returns true if the list holds no items.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}
