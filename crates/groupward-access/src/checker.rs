//! Group permission checks for a single group.

use std::sync::Arc;

use groupward_core::cache::{CONTEXT_USER_GROUP_PERMISSIONS, CacheableMetadata};
use groupward_core::error::GroupResult;
use groupward_core::models::account::Account;
use groupward_core::models::group::Group;
use groupward_core::models::relationship::{MEMBERSHIP_PLUGIN_ID, entity_list_cache_tag};
use groupward_core::repository::RelationshipRepository;
use uuid::Uuid;

use crate::calculator::{ChainPermissionCalculator, PermissionSource};
use crate::permission::{CalculatedPermissions, PermissionScope};

/// Whether `permission` holds in a group, given the account's calculated
/// permissions and whether it is a member.
///
/// An individual item for the group takes precedence over the group
/// type's outsider grants, even when it grants less.
pub fn has_permission_in_group(
    permissions: &CalculatedPermissions,
    group_id: Uuid,
    group_type_id: &str,
    is_member: bool,
    permission: &str,
) -> bool {
    if permissions.is_global_admin() {
        return true;
    }

    let individual = permissions.item(PermissionScope::Individual, &group_id.to_string());
    if individual.is_some_and(|item| item.has_permission(permission)) {
        return true;
    }

    if is_member {
        permissions
            .item(PermissionScope::Insider, group_type_id)
            .is_some_and(|item| item.has_permission(permission))
    } else if individual.is_none() {
        permissions
            .item(PermissionScope::Outsider, group_type_id)
            .is_some_and(|item| item.has_permission(permission))
    } else {
        false
    }
}

/// The permission state of one account towards one group.
#[derive(Debug, Clone)]
pub struct GroupContext {
    pub account: Account,
    pub group_id: Uuid,
    pub group_type_id: String,
    pub permissions: Arc<CalculatedPermissions>,
    pub is_member: bool,
}

impl GroupContext {
    pub fn has_permission(&self, permission: &str) -> bool {
        has_permission_in_group(
            &self.permissions,
            self.group_id,
            &self.group_type_id,
            self.is_member,
            permission,
        )
    }

    /// Admin through an individual, insider or outsider item, or global.
    pub fn is_admin(&self) -> bool {
        if self.permissions.is_global_admin() {
            return true;
        }
        let individual = self
            .permissions
            .item(PermissionScope::Individual, &self.group_id.to_string());
        if individual.is_some_and(|item| item.is_admin()) {
            return true;
        }
        let scope = if self.is_member {
            PermissionScope::Insider
        } else if individual.is_none() {
            PermissionScope::Outsider
        } else {
            return false;
        };
        self.permissions
            .item(scope, &self.group_type_id)
            .is_some_and(|item| item.is_admin())
    }

    /// Whether the account's ID is `owner_id`.
    pub fn is_owner(&self, owner_id: Option<Uuid>) -> bool {
        self.account.id.is_some() && self.account.id == owner_id
    }

    /// What a decision taken on this context varies by.
    pub fn metadata(&self) -> CacheableMetadata {
        let mut metadata = self.permissions.metadata().clone();
        metadata.add_cache_context(CONTEXT_USER_GROUP_PERMISSIONS);
        if let Some(account_id) = self.account.entity_id() {
            metadata.add_cache_tag(entity_list_cache_tag(MEMBERSHIP_PLUGIN_ID, &account_id));
        }
        metadata
    }
}

/// Builds [`GroupContext`]s and answers `has_permission_in_group`.
pub struct GroupPermissionChecker<S: PermissionSource, M: RelationshipRepository> {
    calculator: Arc<ChainPermissionCalculator<S>>,
    relationships: M,
}

impl<S: PermissionSource, M: RelationshipRepository> GroupPermissionChecker<S, M> {
    pub fn new(calculator: Arc<ChainPermissionCalculator<S>>, relationships: M) -> Self {
        Self {
            calculator,
            relationships,
        }
    }

    pub fn calculator(&self) -> &Arc<ChainPermissionCalculator<S>> {
        &self.calculator
    }

    pub fn relationships(&self) -> &M {
        &self.relationships
    }

    pub async fn is_member(&self, account: &Account, group_id: Uuid) -> GroupResult<bool> {
        match account.entity_id() {
            Some(account_id) => Ok(self
                .relationships
                .get_membership(group_id, &account_id)
                .await?
                .is_some()),
            None => Ok(false),
        }
    }

    pub async fn context(
        &self,
        account: &Account,
        group_id: Uuid,
        group_type_id: &str,
    ) -> GroupResult<GroupContext> {
        let permissions = self.calculator.calculate_permissions(account).await?;
        let is_member = self.is_member(account, group_id).await?;
        Ok(GroupContext {
            account: account.clone(),
            group_id,
            group_type_id: group_type_id.to_string(),
            permissions,
            is_member,
        })
    }

    pub async fn group_context(&self, account: &Account, group: &Group) -> GroupResult<GroupContext> {
        self.context(account, group.id, &group.group_type_id).await
    }

    pub async fn has_permission_in_group(
        &self,
        permission: &str,
        account: &Account,
        group: &Group,
    ) -> GroupResult<bool> {
        let context = self.group_context(account, group).await?;
        let granted = context.has_permission(permission);
        tracing::debug!(
            permission,
            group_id = %group.id,
            account = ?account.id,
            granted,
            "checked group permission"
        );
        Ok(granted)
    }
}
