//! Adding entities to groups, with the validation relation plugins
//! demand.

use std::collections::BTreeSet;
use std::sync::Arc;

use groupward_core::error::{GroupError, GroupResult};
use groupward_core::models::account::Account;
use groupward_core::models::entity::EntityRef;
use groupward_core::models::group::{CreateGroup, Group};
use groupward_core::models::relationship::{
    CreateRelationship, GroupRelationship, MEMBERSHIP_PLUGIN_ID, RelationshipValues,
};
use groupward_core::repository::{GroupRepository, GroupTypeRepository, RelationshipRepository};
use uuid::Uuid;

use crate::relation::RelationTypeRegistry;

pub struct RelationshipManager<G, T, M> {
    groups: G,
    group_types: T,
    relationships: M,
    registry: Arc<RelationTypeRegistry>,
}

impl<G, T, M> RelationshipManager<G, T, M>
where
    G: GroupRepository,
    T: GroupTypeRepository,
    M: RelationshipRepository,
{
    pub fn new(groups: G, group_types: T, relationships: M, registry: Arc<RelationTypeRegistry>) -> Self {
        Self {
            groups,
            group_types,
            relationships,
            registry,
        }
    }

    /// Add `entity` to `group` through `plugin_id`.
    ///
    /// Fails with a storage error when the group or entity is unsaved, the
    /// plugin is not installed on the group type, or the entity does not
    /// match the plugin's entity type and bundle. Fails with a cardinality
    /// error when the plugin's limits would be exceeded.
    pub async fn add_relationship(
        &self,
        group: &Group,
        plugin_id: &str,
        entity: &EntityRef,
        values: RelationshipValues,
    ) -> GroupResult<GroupRelationship> {
        let definition = self.registry.definition(plugin_id)?;

        match self.groups.get_by_id(group.id).await {
            Ok(_) => {}
            Err(GroupError::NotFound { .. }) => {
                return Err(GroupError::Storage(
                    "cannot add an entity to an unsaved group".into(),
                ));
            }
            Err(err) => return Err(err),
        }

        let group_type = self.group_types.get_by_id(&group.group_type_id).await?;
        if !group_type.has_plugin(plugin_id) {
            return Err(GroupError::Storage(format!(
                "relation plugin {plugin_id} is not installed on group type {}",
                group_type.id
            )));
        }

        let Some(entity_id) = entity.id.clone() else {
            return Err(GroupError::Storage(
                "cannot add an unsaved entity to a group".into(),
            ));
        };
        if !definition.accepts(&entity.entity_type_id, entity.bundle.as_deref()) {
            return Err(GroupError::Storage(format!(
                "entity {}:{entity_id} does not match relation plugin {plugin_id}",
                entity.entity_type_id
            )));
        }
        if !definition.is_membership() && !values.group_roles.is_empty() {
            return Err(GroupError::validation(
                "only memberships carry group roles",
            ));
        }

        let existing = self
            .relationships
            .load_by_entity(&entity_id, &[plugin_id.to_string()])
            .await?;
        let in_group = existing
            .iter()
            .filter(|relationship| relationship.group_id == group.id)
            .count();
        if definition.entity_cardinality > 0 && in_group >= definition.entity_cardinality as usize {
            return Err(GroupError::Cardinality {
                plugin_id: plugin_id.to_string(),
                entity_id,
                limit: definition.entity_cardinality,
            });
        }
        let other_groups: BTreeSet<Uuid> = existing
            .iter()
            .map(|relationship| relationship.group_id)
            .filter(|group_id| *group_id != group.id)
            .collect();
        if definition.group_cardinality > 0
            && in_group == 0
            && other_groups.len() >= definition.group_cardinality as usize
        {
            return Err(GroupError::Cardinality {
                plugin_id: plugin_id.to_string(),
                entity_id,
                limit: definition.group_cardinality,
            });
        }

        let relationship = self
            .relationships
            .create(CreateRelationship {
                group_id: group.id,
                group_type_id: group.group_type_id.clone(),
                plugin_id: plugin_id.to_string(),
                entity_type_id: entity.entity_type_id.clone(),
                entity_id,
                status: values.status.unwrap_or(entity.published),
                owner_id: values.owner_id.or(entity.owner_id),
                group_roles: values.group_roles,
            })
            .await?;
        tracing::info!(
            relationship_id = %relationship.id,
            group_id = %group.id,
            plugin_id,
            "added entity to group"
        );
        Ok(relationship)
    }

    pub async fn add_member(
        &self,
        group: &Group,
        account_id: Uuid,
        group_roles: Vec<String>,
    ) -> GroupResult<GroupRelationship> {
        self.add_relationship(
            group,
            MEMBERSHIP_PLUGIN_ID,
            &EntityRef::user(account_id),
            RelationshipValues {
                status: Some(true),
                owner_id: Some(account_id),
                group_roles,
            },
        )
        .await
    }

    pub async fn get_member(
        &self,
        group: &Group,
        account_id: Uuid,
    ) -> GroupResult<Option<GroupRelationship>> {
        self.relationships
            .get_membership(group.id, &account_id.to_string())
            .await
    }

    /// Returns whether a membership existed.
    pub async fn remove_member(&self, group: &Group, account_id: Uuid) -> GroupResult<bool> {
        match self.get_member(group, account_id).await? {
            Some(membership) => {
                self.relationships.delete(membership.id).await?;
                tracing::info!(group_id = %group.id, %account_id, "removed group member");
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Relationships of `group`, optionally through one plugin only.
    pub async fn relationships(
        &self,
        group: &Group,
        plugin_id: Option<&str>,
    ) -> GroupResult<Vec<GroupRelationship>> {
        if let Some(plugin_id) = plugin_id {
            self.registry.definition(plugin_id)?;
        }
        self.relationships.load_by_group(group.id, plugin_id).await
    }

    /// Create a group, making its creator a member when the group type
    /// asks for it.
    ///
    /// The group is deleted again when the creator membership cannot be
    /// added.
    pub async fn create_group(&self, input: CreateGroup, creator: &Account) -> GroupResult<Group> {
        let group_type = self.group_types.get_by_id(&input.group_type_id).await?;
        let input = CreateGroup {
            owner_id: input.owner_id.or(creator.id),
            ..input
        };
        let group = self.groups.create(input).await?;

        let Some(creator_id) = creator.id.filter(|_| group_type.creator_membership) else {
            return Ok(group);
        };
        if let Err(err) = self
            .add_member(&group, creator_id, group_type.creator_roles.clone())
            .await
        {
            tracing::warn!(
                group_id = %group.id,
                error = %err,
                "creator membership failed, removing group"
            );
            self.groups.delete(group.id).await?;
            return Err(err);
        }
        Ok(group)
    }
}
