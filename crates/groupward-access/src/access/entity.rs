use std::sync::Arc;

use groupward_core::error::GroupResult;
use groupward_core::models::account::Account;
use groupward_core::models::entity::EntityRef;
use groupward_core::models::relationship::plugin_list_cache_tag;
use groupward_core::repository::RelationshipRepository;

use crate::access_result::AccessResult;
use crate::calculator::PermissionSource;
use crate::checker::GroupPermissionChecker;
use crate::relation::{Operation, RelationTypeRegistry};

/// Access to host entities that may be grouped.
///
/// Entities in no group are none of this layer's business: the result is
/// neutral and the host decides. Grouped entities are allowed as soon as
/// one of their groups allows the operation, and forbidden otherwise.
pub struct GroupedEntityAccess<S: PermissionSource, M: RelationshipRepository> {
    checker: Arc<GroupPermissionChecker<S, M>>,
    registry: Arc<RelationTypeRegistry>,
}

impl<S: PermissionSource, M: RelationshipRepository> GroupedEntityAccess<S, M> {
    pub fn new(checker: Arc<GroupPermissionChecker<S, M>>, registry: Arc<RelationTypeRegistry>) -> Self {
        Self { checker, registry }
    }

    pub async fn entity_access(
        &self,
        entity: &EntityRef,
        operation: Operation,
        account: &Account,
    ) -> GroupResult<AccessResult> {
        let plugin_ids = self
            .registry
            .plugin_ids_by_entity_type_access(&entity.entity_type_id);
        let Some(entity_id) = entity.id.as_deref() else {
            return Ok(AccessResult::neutral());
        };
        if plugin_ids.is_empty() {
            return Ok(AccessResult::neutral());
        }

        let list_tags: Vec<String> = plugin_ids.iter().map(|id| plugin_list_cache_tag(id)).collect();
        let relationships = self
            .checker
            .relationships()
            .load_by_entity(entity_id, &plugin_ids)
            .await?;
        if relationships.is_empty() {
            return Ok(AccessResult::neutral().add_cache_tags(list_tags));
        }

        let mut result = AccessResult::neutral().add_cache_tags(list_tags);
        for relationship in &relationships {
            let context = self
                .checker
                .context(account, relationship.group_id, &relationship.group_type_id)
                .await?;
            let decision = self
                .registry
                .access_control(&relationship.plugin_id)?
                .entity_access(relationship, operation, &context);
            result = result.or_if(decision);
            if result.is_allowed() {
                return Ok(result);
            }
        }

        tracing::debug!(
            entity_type = %entity.entity_type_id,
            entity_id,
            operation = operation.as_str(),
            "no group grants access to grouped entity"
        );
        Ok(AccessResult::forbidden("no group grants access to this grouped entity")
            .add_cacheable_dependency(result.metadata()))
    }
}
