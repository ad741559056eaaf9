//! Repository trait definitions for data access abstraction.
//!
//! All repository operations are async. Implementations report the cache
//! tags of everything they write to a [`CacheTagInvalidator`] so computed
//! permissions never outlive the data they were computed from.
//!
//! [`CacheTagInvalidator`]: crate::cache::CacheTagInvalidator

use uuid::Uuid;

use crate::error::GroupResult;
use crate::models::{
    group::{CreateGroup, Group, UpdateGroup},
    group_role::{CreateGroupRole, GroupRole, UpdateGroupRole},
    group_type::{CreateGroupType, GroupType, UpdateGroupType},
    relationship::{CreateRelationship, GroupRelationship, UpdateRelationship},
};

/// Pagination parameters for list queries.
#[derive(Debug, Clone)]
pub struct Pagination {
    pub offset: u64,
    pub limit: u64,
}

impl Default for Pagination {
    fn default() -> Self {
        Self {
            offset: 0,
            limit: 50,
        }
    }
}

/// A paginated result set.
#[derive(Debug, Clone)]
pub struct PaginatedResult<T> {
    pub items: Vec<T>,
    pub total: u64,
    pub offset: u64,
    pub limit: u64,
}

// ---------------------------------------------------------------------------
// Configuration entities
// ---------------------------------------------------------------------------

pub trait GroupTypeRepository: Send + Sync {
    /// Create a group type, install its enforced plugins and create its
    /// internal synchronized roles (`{id}-anonymous`, `{id}-outsider`,
    /// `{id}-member`).
    fn create(&self, input: CreateGroupType)
    -> impl Future<Output = GroupResult<GroupType>> + Send;
    fn get_by_id(&self, id: &str) -> impl Future<Output = GroupResult<GroupType>> + Send;
    fn list(&self) -> impl Future<Output = GroupResult<Vec<GroupType>>> + Send;
    fn update(
        &self,
        id: &str,
        input: UpdateGroupType,
    ) -> impl Future<Output = GroupResult<GroupType>> + Send;
    /// Delete the type together with its roles. Fails while groups of the
    /// type exist.
    fn delete(&self, id: &str) -> impl Future<Output = GroupResult<()>> + Send;

    /// Make a relation plugin available to groups of this type.
    fn install_plugin(
        &self,
        id: &str,
        plugin_id: &str,
    ) -> impl Future<Output = GroupResult<GroupType>> + Send;
    /// Enforced plugins cannot be uninstalled.
    fn uninstall_plugin(
        &self,
        id: &str,
        plugin_id: &str,
    ) -> impl Future<Output = GroupResult<GroupType>> + Send;
}

pub trait GroupRoleRepository: Send + Sync {
    fn create(&self, input: CreateGroupRole)
    -> impl Future<Output = GroupResult<GroupRole>> + Send;
    fn get_by_id(&self, id: &str) -> impl Future<Output = GroupResult<GroupRole>> + Send;
    /// Load the roles that exist among `ids`; unknown IDs are omitted.
    fn get_many(&self, ids: &[String]) -> impl Future<Output = GroupResult<Vec<GroupRole>>> + Send;
    fn list_by_group_type(
        &self,
        group_type_id: &str,
    ) -> impl Future<Output = GroupResult<Vec<GroupRole>>> + Send;
    /// Every outsider and insider role across all group types.
    fn list_synchronized(&self) -> impl Future<Output = GroupResult<Vec<GroupRole>>> + Send;
    fn update(
        &self,
        id: &str,
        input: UpdateGroupRole,
    ) -> impl Future<Output = GroupResult<GroupRole>> + Send;
    fn grant_permissions(
        &self,
        id: &str,
        permissions: &[String],
    ) -> impl Future<Output = GroupResult<GroupRole>> + Send;
    fn revoke_permissions(
        &self,
        id: &str,
        permissions: &[String],
    ) -> impl Future<Output = GroupResult<GroupRole>> + Send;
    /// Internal and locked roles cannot be deleted.
    fn delete(&self, id: &str) -> impl Future<Output = GroupResult<()>> + Send;
}

// ---------------------------------------------------------------------------
// Content entities
// ---------------------------------------------------------------------------

pub trait GroupRepository: Send + Sync {
    fn create(&self, input: CreateGroup) -> impl Future<Output = GroupResult<Group>> + Send;
    fn get_by_id(&self, id: Uuid) -> impl Future<Output = GroupResult<Group>> + Send;
    fn list(
        &self,
        pagination: Pagination,
    ) -> impl Future<Output = GroupResult<PaginatedResult<Group>>> + Send;
    fn update(
        &self,
        id: Uuid,
        input: UpdateGroup,
    ) -> impl Future<Output = GroupResult<Group>> + Send;
    /// Delete the group and every relationship it owns.
    fn delete(&self, id: Uuid) -> impl Future<Output = GroupResult<()>> + Send;
}

pub trait RelationshipRepository: Send + Sync {
    fn create(
        &self,
        input: CreateRelationship,
    ) -> impl Future<Output = GroupResult<GroupRelationship>> + Send;
    fn get_by_id(&self, id: Uuid) -> impl Future<Output = GroupResult<GroupRelationship>> + Send;
    fn update(
        &self,
        id: Uuid,
        input: UpdateRelationship,
    ) -> impl Future<Output = GroupResult<GroupRelationship>> + Send;
    fn delete(&self, id: Uuid) -> impl Future<Output = GroupResult<()>> + Send;

    /// Relationships of a group, optionally restricted to one plugin.
    fn load_by_group(
        &self,
        group_id: Uuid,
        plugin_id: Option<&str>,
    ) -> impl Future<Output = GroupResult<Vec<GroupRelationship>>> + Send;
    /// Relationships pointing at one entity through any of `plugin_ids`.
    fn load_by_entity(
        &self,
        entity_id: &str,
        plugin_ids: &[String],
    ) -> impl Future<Output = GroupResult<Vec<GroupRelationship>>> + Send;
    /// All memberships of the user with entity ID `account_id`.
    fn load_memberships(
        &self,
        account_id: &str,
    ) -> impl Future<Output = GroupResult<Vec<GroupRelationship>>> + Send;
    fn get_membership(
        &self,
        group_id: Uuid,
        account_id: &str,
    ) -> impl Future<Output = GroupResult<Option<GroupRelationship>>> + Send;
    fn count_by_plugins(
        &self,
        plugin_ids: &[String],
    ) -> impl Future<Output = GroupResult<u64>> + Send;
}
