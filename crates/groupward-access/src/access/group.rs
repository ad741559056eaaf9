use groupward_core::cache::{CONTEXT_USER, CONTEXT_USER_PERMISSIONS};
use groupward_core::models::account::Account;
use groupward_core::models::group::Group;
use groupward_core::models::group_type::GroupType;

use crate::access_result::AccessResult;
use crate::checker::GroupContext;
use crate::config::AccessConfig;
use crate::relation::{Operation, PermissionDefinition};

pub const VIEW_GROUP: &str = "view group";
pub const EDIT_GROUP: &str = "edit group";
pub const DELETE_GROUP: &str = "delete group";
pub const VIEW_ANY_UNPUBLISHED_GROUP: &str = "view any unpublished group";
pub const VIEW_OWN_UNPUBLISHED_GROUP: &str = "view own unpublished group";
pub const ACCESS_CONTENT_OVERVIEW: &str = "access content overview";
/// Grants every group-level operation on the group.
pub const ADMINISTER_GROUP: &str = "administer group";

/// Site permission to create groups of `group_type_id`.
pub fn create_group_permission(group_type_id: &str) -> String {
    format!("create {group_type_id} group")
}

/// Permissions defined by groups themselves.
pub fn group_permissions() -> Vec<PermissionDefinition> {
    [
        (ADMINISTER_GROUP, "Administer group", true),
        (VIEW_GROUP, "View group", false),
        (VIEW_ANY_UNPUBLISHED_GROUP, "View any unpublished group", false),
        (VIEW_OWN_UNPUBLISHED_GROUP, "View own unpublished group", false),
        (EDIT_GROUP, "Edit group", false),
        (DELETE_GROUP, "Delete group", false),
        (ACCESS_CONTENT_OVERVIEW, "Access all entities overview", false),
    ]
    .into_iter()
    .map(|(name, title, restrict_access)| PermissionDefinition {
        name: name.into(),
        title: title.into(),
        provider: "group".into(),
        restrict_access,
    })
    .collect()
}

/// Access to group entities.
#[derive(Debug, Clone)]
pub struct GroupAccessControl {
    bypass_permission: String,
}

impl GroupAccessControl {
    pub fn new(config: &AccessConfig) -> Self {
        Self {
            bypass_permission: config.bypass_permission.clone(),
        }
    }

    pub fn access(&self, group: &Group, operation: Operation, context: &GroupContext) -> AccessResult {
        let result = if context.is_admin() || context.has_permission(ADMINISTER_GROUP) {
            AccessResult::allowed()
        } else {
            match operation {
                Operation::View if group.status => AccessResult::allowed_if(context.has_permission(VIEW_GROUP)),
                Operation::View | Operation::ViewUnpublished => {
                    AccessResult::allowed_if(context.has_permission(VIEW_ANY_UNPUBLISHED_GROUP))
                        .or_if(
                            AccessResult::allowed_if(
                                context.is_owner(group.owner_id)
                                    && context.has_permission(VIEW_OWN_UNPUBLISHED_GROUP),
                            )
                            .add_cache_context(CONTEXT_USER),
                        )
                }
                Operation::Update => AccessResult::allowed_if(context.has_permission(EDIT_GROUP)),
                Operation::Delete => AccessResult::allowed_if(context.has_permission(DELETE_GROUP)),
                Operation::Create => AccessResult::neutral(),
            }
        };
        result
            .add_cacheable_dependency(&context.metadata())
            .add_cache_tags([group.cache_tag()])
    }

    /// Creating a group is a site-level decision: the account needs
    /// `create {type} group` or the bypass permission.
    pub fn create_access(&self, account: &Account, group_type: &GroupType) -> AccessResult {
        AccessResult::allowed_if(
            account.has_permission(&self.bypass_permission)
                || account.has_permission(&create_group_permission(&group_type.id)),
        )
        .add_cache_context(CONTEXT_USER_PERMISSIONS)
        .add_cache_tags([group_type.cache_tag()])
    }
}
