use groupward_core::cache::CONTEXT_USER_PERMISSIONS;

use super::{PermissionCalculator, PermissionSnapshot};
use crate::permission::{
    CalculatedPermissionsItem, GLOBAL_IDENTIFIER, PermissionScope, RefinableCalculatedPermissions,
};

/// Grants global admin to accounts holding the bypass site permission.
#[derive(Debug, Clone)]
pub struct BypassPermissionCalculator {
    permission: String,
}

impl BypassPermissionCalculator {
    pub fn new(permission: impl Into<String>) -> Self {
        Self {
            permission: permission.into(),
        }
    }
}

impl PermissionCalculator for BypassPermissionCalculator {
    fn name(&self) -> &'static str {
        "bypass"
    }

    fn calculate(&self, snapshot: &PermissionSnapshot) -> RefinableCalculatedPermissions {
        let mut calculated = RefinableCalculatedPermissions::new();
        calculated.metadata_mut().add_cache_context(CONTEXT_USER_PERMISSIONS);
        if snapshot.account.has_permission(&self.permission) {
            calculated.add_item(CalculatedPermissionsItem::new(
                PermissionScope::Global,
                GLOBAL_IDENTIFIER,
                Vec::<String>::new(),
                true,
            ));
        }
        calculated
    }
}
