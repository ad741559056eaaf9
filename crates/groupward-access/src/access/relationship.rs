use std::sync::Arc;

use groupward_core::error::GroupResult;
use groupward_core::models::relationship::GroupRelationship;

use crate::access_result::AccessResult;
use crate::checker::GroupContext;
use crate::relation::{Operation, RelationTypeRegistry};

/// Access to relationships, delegated to each plugin's handler.
#[derive(Clone)]
pub struct RelationshipAccessControl {
    registry: Arc<RelationTypeRegistry>,
}

impl RelationshipAccessControl {
    pub fn new(registry: Arc<RelationTypeRegistry>) -> Self {
        Self { registry }
    }

    pub fn access(
        &self,
        relationship: &GroupRelationship,
        operation: Operation,
        context: &GroupContext,
    ) -> GroupResult<AccessResult> {
        Ok(self
            .registry
            .access_control(&relationship.plugin_id)?
            .relationship_access(relationship, operation, context))
    }

    /// Access to add an existing entity through `plugin_id`.
    pub fn create_access(&self, plugin_id: &str, context: &GroupContext) -> GroupResult<AccessResult> {
        Ok(self
            .registry
            .access_control(plugin_id)?
            .relationship_create_access(context))
    }

    /// Access to create a new entity into the group through `plugin_id`.
    pub fn create_entity_access(
        &self,
        plugin_id: &str,
        context: &GroupContext,
    ) -> GroupResult<AccessResult> {
        Ok(self
            .registry
            .access_control(plugin_id)?
            .entity_create_access(context))
    }
}
