use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

/// Identifier of the single item in [`PermissionScope::Global`].
pub const GLOBAL_IDENTIFIER: &str = "global";

/// Breadth of a permission grant.
///
/// `Outsider` and `Insider` are the two group type scopes: their
/// identifier is a group type ID and they apply to non-members and
/// members of that type's groups respectively.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
pub enum PermissionScope {
    /// Identifier is a group ID.
    Individual,
    Outsider,
    Insider,
    /// Identifier is always [`GLOBAL_IDENTIFIER`].
    Global,
}

impl PermissionScope {
    pub fn as_str(&self) -> &'static str {
        match self {
            PermissionScope::Individual => "individual",
            PermissionScope::Outsider => "outsider",
            PermissionScope::Insider => "insider",
            PermissionScope::Global => "global",
        }
    }

    pub fn is_group_type(&self) -> bool {
        matches!(self, PermissionScope::Outsider | PermissionScope::Insider)
    }
}

/// "This identifier, in this scope, has these permissions (or is admin)."
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CalculatedPermissionsItem {
    scope: PermissionScope,
    identifier: String,
    permissions: BTreeSet<String>,
    admin: bool,
}

impl CalculatedPermissionsItem {
    pub fn new<I, S>(
        scope: PermissionScope,
        identifier: impl Into<String>,
        permissions: I,
        admin: bool,
    ) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            scope,
            identifier: identifier.into(),
            permissions: permissions.into_iter().map(Into::into).collect(),
            admin,
        }
    }

    pub fn scope(&self) -> PermissionScope {
        self.scope
    }

    pub fn identifier(&self) -> &str {
        &self.identifier
    }

    pub fn permissions(&self) -> &BTreeSet<String> {
        &self.permissions
    }

    pub fn is_admin(&self) -> bool {
        self.admin
    }

    pub fn has_permission(&self, permission: &str) -> bool {
        self.admin || self.permissions.contains(permission)
    }

    /// Union of both items' grants. Callers merge only items with the
    /// same scope and identifier.
    pub fn merge(&self, other: &CalculatedPermissionsItem) -> Self {
        debug_assert_eq!(self.key(), other.key());
        Self {
            scope: self.scope,
            identifier: self.identifier.clone(),
            permissions: self.permissions.union(&other.permissions).cloned().collect(),
            admin: self.admin || other.admin,
        }
    }

    pub(crate) fn key(&self) -> (PermissionScope, String) {
        (self.scope, self.identifier.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn admin_implies_every_permission() {
        let item = CalculatedPermissionsItem::new(
            PermissionScope::Individual,
            "5",
            Vec::<String>::new(),
            true,
        );
        assert!(item.has_permission("anything at all"));
    }

    #[test]
    fn merge_unions_permissions_and_admin() {
        let view = CalculatedPermissionsItem::new(PermissionScope::Individual, "5", ["view group"], false);
        let edit = CalculatedPermissionsItem::new(PermissionScope::Individual, "5", ["edit group"], true);
        let merged = view.merge(&edit);
        assert!(merged.permissions().contains("view group"));
        assert!(merged.permissions().contains("edit group"));
        assert!(merged.is_admin());
    }
}
