use std::sync::Arc;

use groupward_core::cache::CONTEXT_USER;
use groupward_core::models::relationship::GroupRelationship;

use super::{Operation, Ownership, PermissionProvider, PermissionTarget, RelationTypeDefinition};
use crate::access_result::AccessResult;
use crate::checker::GroupContext;

/// Access decisions of one relation plugin, expressed through its
/// permission provider.
#[derive(Clone)]
pub struct RelationAccessControl {
    definition: Arc<RelationTypeDefinition>,
    provider: Arc<dyn PermissionProvider>,
}

impl RelationAccessControl {
    pub fn new(definition: Arc<RelationTypeDefinition>, provider: Arc<dyn PermissionProvider>) -> Self {
        Self {
            definition,
            provider,
        }
    }

    pub fn definition(&self) -> &RelationTypeDefinition {
        &self.definition
    }

    fn is_plugin_admin(&self, context: &GroupContext) -> bool {
        context.is_admin()
            || self
                .provider
                .admin_permission()
                .is_some_and(|permission| context.has_permission(&permission))
    }

    /// Allowed through the "any" permission, or through the "own"
    /// permission when the account owns the record.
    fn any_or_own(
        &self,
        context: &GroupContext,
        operation: Operation,
        target: PermissionTarget,
        owner: Option<uuid::Uuid>,
    ) -> AccessResult {
        let any = self.provider.permission(operation, target, Ownership::Any);
        if any.is_some_and(|permission| context.has_permission(&permission)) {
            return AccessResult::allowed();
        }
        let own = self.provider.permission(operation, target, Ownership::Own);
        match own {
            Some(permission) => {
                AccessResult::allowed_if(context.is_owner(owner) && context.has_permission(&permission))
                    .add_cache_context(CONTEXT_USER)
            }
            None => AccessResult::neutral(),
        }
    }

    /// Access to the relationship record itself.
    pub fn relationship_access(
        &self,
        relationship: &GroupRelationship,
        operation: Operation,
        context: &GroupContext,
    ) -> AccessResult {
        let metadata = context.metadata();
        let result = if self.is_plugin_admin(context) {
            AccessResult::allowed()
        } else {
            match operation {
                Operation::View | Operation::Update | Operation::Delete => self.any_or_own(
                    context,
                    operation,
                    PermissionTarget::Relationship,
                    relationship.owner_id,
                ),
                Operation::ViewUnpublished | Operation::Create => AccessResult::neutral(),
            }
        };
        result
            .add_cacheable_dependency(&metadata)
            .add_cache_tags(relationship.list_cache_tags())
    }

    /// Access to add an existing entity to the group.
    pub fn relationship_create_access(&self, context: &GroupContext) -> AccessResult {
        let permission = self.provider.permission(
            Operation::Create,
            PermissionTarget::Relationship,
            Ownership::Any,
        );
        AccessResult::allowed_if(
            self.is_plugin_admin(context)
                || permission.is_some_and(|permission| context.has_permission(&permission)),
        )
        .add_cacheable_dependency(&context.metadata())
    }

    /// Access to the grouped entity, as grouped by `relationship`.
    ///
    /// Publication state and ownership are those recorded on the
    /// relationship.
    pub fn entity_access(
        &self,
        relationship: &GroupRelationship,
        operation: Operation,
        context: &GroupContext,
    ) -> AccessResult {
        if !self.definition.entity_access {
            return AccessResult::neutral();
        }
        let metadata = context.metadata();
        let result = if self.is_plugin_admin(context) {
            AccessResult::allowed()
        } else {
            match operation {
                Operation::View if !relationship.status => self.any_or_own(
                    context,
                    Operation::ViewUnpublished,
                    PermissionTarget::Entity,
                    relationship.owner_id,
                ),
                Operation::View
                | Operation::ViewUnpublished
                | Operation::Update
                | Operation::Delete => self.any_or_own(
                    context,
                    operation,
                    PermissionTarget::Entity,
                    relationship.owner_id,
                ),
                Operation::Create => AccessResult::neutral(),
            }
        };
        result
            .add_cacheable_dependency(&metadata)
            .add_cache_tags(relationship.list_cache_tags())
    }

    /// Access to create a new entity straight into the group.
    pub fn entity_create_access(&self, context: &GroupContext) -> AccessResult {
        if !self.definition.entity_access {
            return AccessResult::neutral();
        }
        let permission = self
            .provider
            .permission(Operation::Create, PermissionTarget::Entity, Ownership::Any);
        AccessResult::allowed_if(
            self.is_plugin_admin(context)
                || permission.is_some_and(|permission| context.has_permission(&permission)),
        )
        .add_cacheable_dependency(&context.metadata())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use groupward_core::models::account::Account;
    use uuid::Uuid;

    use super::*;
    use crate::permission::{CalculatedPermissionsItem, PermissionScope, RefinableCalculatedPermissions};
    use crate::relation::DefaultPermissionProvider;
    use crate::testing::membership_in;

    fn control() -> RelationAccessControl {
        let definition = Arc::new(
            RelationTypeDefinition::new("group_node:article", "node")
                .with_bundle("article")
                .with_entity_access(),
        );
        let provider = Arc::new(DefaultPermissionProvider::new((*definition).clone(), true, true));
        RelationAccessControl::new(definition, provider)
    }

    fn context(account: &Account, group_id: Uuid, perms: &[&str]) -> GroupContext {
        let mut refinable = RefinableCalculatedPermissions::new();
        refinable.add_item(CalculatedPermissionsItem::new(
            PermissionScope::Individual,
            group_id.to_string(),
            perms.iter().copied(),
            false,
        ));
        GroupContext {
            account: account.clone(),
            group_id,
            group_type_id: "default".into(),
            permissions: Arc::new(refinable.freeze()),
            is_member: true,
        }
    }

    fn article_in(group_id: Uuid, owner: &Account) -> GroupRelationship {
        let mut relationship = membership_in(group_id, owner, "default", &[]);
        relationship.plugin_id = "group_node:article".into();
        relationship.entity_type_id = "node".into();
        relationship.entity_id = "42".into();
        relationship
    }

    #[test]
    fn published_entity_needs_view_permission() {
        let account = Account::authenticated(Uuid::new_v4());
        let group_id = Uuid::new_v4();
        let relationship = article_in(group_id, &account);

        let granted = context(&account, group_id, &["view group_node:article entity"]);
        assert!(control().entity_access(&relationship, Operation::View, &granted).is_allowed());

        let denied = context(&account, group_id, &[]);
        assert!(!control().entity_access(&relationship, Operation::View, &denied).is_allowed());
    }

    #[test]
    fn unpublished_entity_needs_unpublished_permission() {
        let account = Account::authenticated(Uuid::new_v4());
        let group_id = Uuid::new_v4();
        let mut relationship = article_in(group_id, &account);
        relationship.status = false;

        let viewer = context(&account, group_id, &["view group_node:article entity"]);
        assert!(!control().entity_access(&relationship, Operation::View, &viewer).is_allowed());

        let own_unpublished = context(
            &account,
            group_id,
            &["view own unpublished group_node:article entity"],
        );
        assert!(
            control()
                .entity_access(&relationship, Operation::View, &own_unpublished)
                .is_allowed()
        );
    }

    #[test]
    fn own_permission_requires_ownership() {
        let owner = Account::authenticated(Uuid::new_v4());
        let other = Account::authenticated(Uuid::new_v4());
        let group_id = Uuid::new_v4();
        let relationship = article_in(group_id, &owner);

        let perms = &["update own group_node:article relationship"];
        assert!(
            control()
                .relationship_access(&relationship, Operation::Update, &context(&owner, group_id, perms))
                .is_allowed()
        );
        assert!(
            !control()
                .relationship_access(&relationship, Operation::Update, &context(&other, group_id, perms))
                .is_allowed()
        );
    }

    #[test]
    fn create_access_uses_create_permissions() {
        let account = Account::authenticated(Uuid::new_v4());
        let group_id = Uuid::new_v4();
        let ctx = context(&account, group_id, &["create group_node:article entity"]);
        assert!(control().entity_create_access(&ctx).is_allowed());
        assert!(!control().relationship_create_access(&ctx).is_allowed());
    }
}
