use groupward_core::cache::CONTEXT_USER;
use groupward_core::models::group_role::role_cache_tag;
use groupward_core::models::relationship::{MEMBERSHIP_PLUGIN_ID, entity_list_cache_tag};

use super::{PermissionCalculator, PermissionSnapshot};
use crate::permission::{CalculatedPermissionsItem, PermissionScope, RefinableCalculatedPermissions};

/// Grants the permissions of the roles assigned on each membership,
/// scoped to that membership's group.
///
/// Every membership yields an item, even one without roles: an
/// individual item is what marks a group as governed by membership
/// rather than by group type grants.
#[derive(Debug, Default, Clone, Copy)]
pub struct IndividualPermissionCalculator;

impl PermissionCalculator for IndividualPermissionCalculator {
    fn name(&self) -> &'static str {
        "individual"
    }

    fn calculate(&self, snapshot: &PermissionSnapshot) -> RefinableCalculatedPermissions {
        let mut calculated = RefinableCalculatedPermissions::new();
        calculated.metadata_mut().add_cache_context(CONTEXT_USER);

        if let Some(account_id) = snapshot.account.entity_id() {
            calculated
                .metadata_mut()
                .add_cache_tag(entity_list_cache_tag(MEMBERSHIP_PLUGIN_ID, &account_id));
        }

        for membership in &snapshot.memberships {
            let mut permissions = Vec::new();
            let mut admin = false;

            for role_id in &membership.group_roles {
                // Track stale IDs too so recreating the role invalidates.
                calculated.metadata_mut().add_cache_tag(role_cache_tag(role_id));
                let Some(role) = snapshot.role(role_id) else {
                    tracing::warn!(
                        role_id = %role_id,
                        group_id = %membership.group_id,
                        "membership references a missing group role, skipping"
                    );
                    continue;
                };
                if role.group_type_id != membership.group_type_id {
                    tracing::warn!(
                        role_id = %role_id,
                        group_id = %membership.group_id,
                        "membership references a role of another group type, skipping"
                    );
                    continue;
                }
                admin |= role.admin;
                permissions.extend(role.permissions.iter().cloned());
            }

            calculated.add_item(CalculatedPermissionsItem::new(
                PermissionScope::Individual,
                membership.group_id.to_string(),
                permissions,
                admin,
            ));
        }

        calculated
    }
}
