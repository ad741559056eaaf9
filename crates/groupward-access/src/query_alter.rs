//! Listing query alteration.
//!
//! Rather than loading every candidate row and checking access on each,
//! the account's calculated permissions are compiled into conditions on
//! the listing query itself. See [`scoped`] for how grants map onto
//! conditions.

mod entity;
mod group;
mod relationship;
pub mod scoped;

use std::sync::Arc;

use groupward_core::cache::CONTEXT_USER_PERMISSIONS;
use groupward_core::error::GroupResult;
use groupward_core::models::account::Account;
use groupward_core::query::SelectQuery;
use groupward_core::schema::{GROUP_ENTITY_TYPE, RELATIONSHIP_ENTITY_TYPE};

pub use entity::{EntityQueryAlter, GROUPED_ALIAS};
pub use group::GroupQueryAlter;
pub use relationship::RelationshipQueryAlter;
pub use scoped::MEMBERSHIP_ALIAS;

use crate::calculator::{ChainPermissionCalculator, PermissionSource};
use crate::permission::CalculatedPermissions;
use crate::relation::{Operation, RelationTypeRegistry};

/// Entry point for altering a listing of any entity type.
pub struct QueryAccess<S: PermissionSource> {
    calculator: Arc<ChainPermissionCalculator<S>>,
    registry: Arc<RelationTypeRegistry>,
}

impl<S: PermissionSource> QueryAccess<S> {
    pub fn new(calculator: Arc<ChainPermissionCalculator<S>>, registry: Arc<RelationTypeRegistry>) -> Self {
        Self {
            calculator,
            registry,
        }
    }

    /// Restrict `query`, a listing of `entity_type_id`, to rows `account`
    /// may perform `operation` on.
    pub async fn alter_query(
        &self,
        query: &mut SelectQuery,
        entity_type_id: &str,
        operation: Operation,
        account: &Account,
    ) -> GroupResult<()> {
        query.metadata_mut().add_cache_context(CONTEXT_USER_PERMISSIONS);
        if account.has_permission(&self.calculator.config().bypass_permission) {
            tracing::debug!(account = ?account.id, entity_type_id, "bypassing group query access");
            return Ok(());
        }
        if !self.applies_to(entity_type_id) {
            return Ok(());
        }
        let permissions = self.calculator.calculate_permissions(account).await?;
        self.alter_with(query, entity_type_id, operation, account, &permissions)
    }

    /// Whether listings of `entity_type_id` are subject to group access.
    pub fn applies_to(&self, entity_type_id: &str) -> bool {
        entity_type_id == GROUP_ENTITY_TYPE
            || entity_type_id == RELATIONSHIP_ENTITY_TYPE
            || !self
                .registry
                .plugin_ids_by_entity_type_access(entity_type_id)
                .is_empty()
    }

    /// Alteration with already calculated permissions.
    pub fn alter_with(
        &self,
        query: &mut SelectQuery,
        entity_type_id: &str,
        operation: Operation,
        account: &Account,
        permissions: &CalculatedPermissions,
    ) -> GroupResult<()> {
        match entity_type_id {
            GROUP_ENTITY_TYPE => {
                GroupQueryAlter::new(permissions, account).alter(query, operation);
                Ok(())
            }
            RELATIONSHIP_ENTITY_TYPE => {
                RelationshipQueryAlter::new(permissions, account, &self.registry).alter(query, operation)
            }
            other => match self.registry.entity_type(other) {
                Some(entity_type) => {
                    EntityQueryAlter::new(permissions, account, &self.registry, entity_type)
                        .alter(query, operation)
                }
                None => Ok(()),
            },
        }
    }
}
