use std::collections::BTreeMap;

use groupward_core::cache::CacheableMetadata;

use super::item::{CalculatedPermissionsItem, GLOBAL_IDENTIFIER, PermissionScope};

type ItemKey = (PermissionScope, String);

/// Mutable permission set used while calculators run.
#[derive(Debug, Clone, Default)]
pub struct RefinableCalculatedPermissions {
    items: BTreeMap<ItemKey, CalculatedPermissionsItem>,
    metadata: CacheableMetadata,
}

impl RefinableCalculatedPermissions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an item, unioning it with any item already present under the
    /// same scope and identifier.
    pub fn add_item(&mut self, item: CalculatedPermissionsItem) -> &mut Self {
        let key = item.key();
        let merged = match self.items.get(&key) {
            Some(existing) => existing.merge(&item),
            None => item,
        };
        self.items.insert(key, merged);
        self
    }

    pub fn remove_item(&mut self, scope: PermissionScope, identifier: &str) -> &mut Self {
        self.items.remove(&(scope, identifier.to_string()));
        self
    }

    pub fn remove_items_by_scope(&mut self, scope: PermissionScope) -> &mut Self {
        self.items.retain(|(item_scope, _), _| *item_scope != scope);
        self
    }

    /// Merge another calculator's result into this one.
    pub fn merge(&mut self, other: RefinableCalculatedPermissions) -> &mut Self {
        for (_, item) in other.items {
            self.add_item(item);
        }
        self.metadata.merge(&other.metadata);
        self
    }

    pub fn item(&self, scope: PermissionScope, identifier: &str) -> Option<&CalculatedPermissionsItem> {
        self.items.get(&(scope, identifier.to_string()))
    }

    pub fn metadata_mut(&mut self) -> &mut CacheableMetadata {
        &mut self.metadata
    }

    pub fn freeze(self) -> CalculatedPermissions {
        CalculatedPermissions {
            items: self.items,
            metadata: self.metadata,
        }
    }
}

/// Every permission grant applicable to one account.
///
/// Equality is structural, so calculating twice for the same account
/// yields equal sets.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CalculatedPermissions {
    items: BTreeMap<ItemKey, CalculatedPermissionsItem>,
    metadata: CacheableMetadata,
}

impl CalculatedPermissions {
    pub fn item(&self, scope: PermissionScope, identifier: &str) -> Option<&CalculatedPermissionsItem> {
        self.items.get(&(scope, identifier.to_string()))
    }

    pub fn items(&self) -> impl Iterator<Item = &CalculatedPermissionsItem> {
        self.items.values()
    }

    pub fn items_by_scope(
        &self,
        scope: PermissionScope,
    ) -> impl Iterator<Item = &CalculatedPermissionsItem> {
        self.items.values().filter(move |item| item.scope() == scope)
    }

    /// Identifiers of every item in `scope`.
    pub fn identifiers(&self, scope: PermissionScope) -> Vec<&str> {
        self.items_by_scope(scope).map(|item| item.identifier()).collect()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Whether the account bypasses group access altogether.
    pub fn is_global_admin(&self) -> bool {
        self.item(PermissionScope::Global, GLOBAL_IDENTIFIER)
            .is_some_and(CalculatedPermissionsItem::is_admin)
    }

    pub fn metadata(&self) -> &CacheableMetadata {
        &self.metadata
    }
}
