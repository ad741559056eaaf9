use groupward_core::cache::CONTEXT_USER_ROLES;
use groupward_core::models::group_role::{GROUP_ROLE_LIST_CACHE_TAG, RoleScope};
use groupward_core::models::group_type::GROUP_TYPE_LIST_CACHE_TAG;

use super::{PermissionCalculator, PermissionSnapshot};
use crate::permission::{CalculatedPermissionsItem, PermissionScope, RefinableCalculatedPermissions};

/// Grants outsider and insider roles per group type, based on the site
/// roles the account holds.
///
/// Whether the account actually is a member of a given group is decided
/// later, by whoever consumes the insider and outsider items.
#[derive(Debug, Default, Clone, Copy)]
pub struct SynchronizedPermissionCalculator;

impl PermissionCalculator for SynchronizedPermissionCalculator {
    fn name(&self) -> &'static str {
        "synchronized"
    }

    fn calculate(&self, snapshot: &PermissionSnapshot) -> RefinableCalculatedPermissions {
        let mut calculated = RefinableCalculatedPermissions::new();
        calculated
            .metadata_mut()
            .add_cache_context(CONTEXT_USER_ROLES)
            .add_cache_tags([GROUP_TYPE_LIST_CACHE_TAG, GROUP_ROLE_LIST_CACHE_TAG]);

        let site_roles = &snapshot.account.roles;
        for group_type in &snapshot.group_types {
            calculated.metadata_mut().add_cache_tag(group_type.cache_tag());

            for scope in [RoleScope::Outsider, RoleScope::Insider] {
                // Anonymous accounts can never be members.
                if scope == RoleScope::Insider && snapshot.account.is_anonymous() {
                    continue;
                }

                let mut applies = false;
                let mut permissions = Vec::new();
                let mut admin = false;
                for role in snapshot
                    .synchronized_roles(&group_type.id)
                    .filter(|role| role.scope == scope)
                {
                    calculated.metadata_mut().add_cache_tag(role.cache_tag());
                    if !role.applies_to_site_roles(site_roles.iter()) {
                        continue;
                    }
                    applies = true;
                    admin |= role.admin;
                    permissions.extend(role.permissions.iter().cloned());
                }

                if applies {
                    let item_scope = match scope {
                        RoleScope::Insider => PermissionScope::Insider,
                        _ => PermissionScope::Outsider,
                    };
                    calculated.add_item(CalculatedPermissionsItem::new(
                        item_scope,
                        group_type.id.clone(),
                        permissions,
                        admin,
                    ));
                }
            }
        }

        calculated
    }
}
