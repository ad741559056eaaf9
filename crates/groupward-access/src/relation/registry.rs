use std::collections::BTreeMap;
use std::sync::Arc;

use groupward_core::error::{GroupError, GroupResult};
use groupward_core::models::entity::EntityTypeDefinition;
use groupward_core::models::group_type::GroupType;
use groupward_core::schema::{GROUP_ENTITY_TYPE, groups};

use super::{
    DefaultPermissionProvider, MembershipPermissionProvider, PermissionDefinition,
    PermissionProvider, RelationAccessControl, RelationTypeDefinition,
};
use crate::access::group::group_permissions;

/// Everything registered for one plugin ID.
#[derive(Clone)]
pub struct RelationHandler {
    pub definition: Arc<RelationTypeDefinition>,
    pub permission_provider: Arc<dyn PermissionProvider>,
    pub access_control: RelationAccessControl,
}

/// Explicit table of relation plugins and the host entity types they
/// group.
pub struct RelationTypeRegistry {
    entity_types: BTreeMap<String, EntityTypeDefinition>,
    handlers: BTreeMap<String, RelationHandler>,
}

impl RelationTypeRegistry {
    /// An empty registry knowing only the `group` entity type.
    pub fn new() -> Self {
        let mut entity_types = BTreeMap::new();
        entity_types.insert(
            GROUP_ENTITY_TYPE.to_string(),
            EntityTypeDefinition::new(GROUP_ENTITY_TYPE, groups::TABLE)
                .with_bundle_key(groups::TYPE)
                .with_owner_key(groups::OWNER)
                .with_status_key(groups::STATUS),
        );
        Self {
            entity_types,
            handlers: BTreeMap::new(),
        }
    }

    /// A registry with the `user` entity type and the membership plugin.
    pub fn with_builtins() -> GroupResult<Self> {
        let mut registry = Self::new();
        registry.register_entity_type(EntityTypeDefinition::new("user", "users"));
        let membership = RelationTypeDefinition::membership();
        let provider = Arc::new(MembershipPermissionProvider::new(membership.clone()));
        registry.register_with_provider(membership, provider)?;
        Ok(registry)
    }

    pub fn register_entity_type(&mut self, definition: EntityTypeDefinition) -> &mut Self {
        self.entity_types.insert(definition.id.clone(), definition);
        self
    }

    pub fn entity_type(&self, entity_type_id: &str) -> Option<&EntityTypeDefinition> {
        self.entity_types.get(entity_type_id)
    }

    /// Register a plugin with the default permission provider.
    pub fn register(&mut self, definition: RelationTypeDefinition) -> GroupResult<()> {
        let entity_type = self.entity_type(&definition.entity_type_id).ok_or_else(|| {
            GroupError::validation(format!(
                "relation plugin {} targets unknown entity type {}",
                definition.id, definition.entity_type_id
            ))
        })?;
        let provider = Arc::new(DefaultPermissionProvider::new(
            definition.clone(),
            entity_type.is_ownable(),
            entity_type.is_publishable(),
        ));
        self.register_with_provider(definition, provider)
    }

    /// Register a plugin with its own permission provider.
    pub fn register_with_provider(
        &mut self,
        definition: RelationTypeDefinition,
        provider: Arc<dyn PermissionProvider>,
    ) -> GroupResult<()> {
        if self.handlers.contains_key(&definition.id) {
            return Err(GroupError::AlreadyExists {
                entity: format!("relation plugin {}", definition.id),
            });
        }
        if !self.entity_types.contains_key(&definition.entity_type_id) {
            return Err(GroupError::validation(format!(
                "relation plugin {} targets unknown entity type {}",
                definition.id, definition.entity_type_id
            )));
        }
        let definition = Arc::new(definition);
        let handler = RelationHandler {
            access_control: RelationAccessControl::new(Arc::clone(&definition), Arc::clone(&provider)),
            permission_provider: provider,
            definition: Arc::clone(&definition),
        };
        tracing::debug!(plugin_id = %definition.id, "registered relation plugin");
        self.handlers.insert(definition.id.clone(), handler);
        Ok(())
    }

    pub fn handler(&self, plugin_id: &str) -> GroupResult<&RelationHandler> {
        self.handlers
            .get(plugin_id)
            .ok_or_else(|| GroupError::UnknownPlugin(plugin_id.to_string()))
    }

    pub fn definition(&self, plugin_id: &str) -> GroupResult<&RelationTypeDefinition> {
        Ok(&self.handler(plugin_id)?.definition)
    }

    pub fn permission_provider(&self, plugin_id: &str) -> GroupResult<&dyn PermissionProvider> {
        Ok(self.handler(plugin_id)?.permission_provider.as_ref())
    }

    pub fn access_control(&self, plugin_id: &str) -> GroupResult<&RelationAccessControl> {
        Ok(&self.handler(plugin_id)?.access_control)
    }

    pub fn has_plugin(&self, plugin_id: &str) -> bool {
        self.handlers.contains_key(plugin_id)
    }

    pub fn plugin_ids(&self) -> Vec<String> {
        self.handlers.keys().cloned().collect()
    }

    pub fn definitions(&self) -> impl Iterator<Item = &RelationTypeDefinition> {
        self.handlers.values().map(|handler| handler.definition.as_ref())
    }

    /// Plugins whose grouped entities are of `entity_type_id`.
    pub fn plugin_ids_by_entity_type(&self, entity_type_id: &str) -> Vec<String> {
        self.definitions()
            .filter(|definition| definition.entity_type_id == entity_type_id)
            .map(|definition| definition.id.clone())
            .collect()
    }

    /// Like [`plugin_ids_by_entity_type`](Self::plugin_ids_by_entity_type),
    /// restricted to plugins governing entity access.
    pub fn plugin_ids_by_entity_type_access(&self, entity_type_id: &str) -> Vec<String> {
        self.definitions()
            .filter(|definition| {
                definition.entity_type_id == entity_type_id && definition.entity_access
            })
            .map(|definition| definition.id.clone())
            .collect()
    }

    /// Plugins that could still be installed on `group_type`.
    pub fn installable_plugins(&self, group_type: &GroupType) -> Vec<&RelationTypeDefinition> {
        self.definitions()
            .filter(|definition| !group_type.has_plugin(&definition.id))
            .collect()
    }

    /// Plugins installed on every group type.
    pub fn enforced_plugin_ids(&self) -> Vec<String> {
        self.definitions()
            .filter(|definition| definition.enforced)
            .map(|definition| definition.id.clone())
            .collect()
    }

    /// Every group-level permission: those of groups themselves followed
    /// by those of each plugin.
    pub fn build_permissions(&self) -> Vec<PermissionDefinition> {
        let mut permissions = group_permissions();
        for handler in self.handlers.values() {
            for permission in handler.permission_provider.build_permissions() {
                if !permissions.iter().any(|existing| existing.name == permission.name) {
                    permissions.push(permission);
                }
            }
        }
        permissions
    }
}

impl Default for RelationTypeRegistry {
    fn default() -> Self {
        Self::new()
    }
}
