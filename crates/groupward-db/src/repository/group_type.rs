//! SurrealDB implementation of [`GroupTypeRepository`].

use std::collections::BTreeSet;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use groupward_core::cache::{CacheTagInvalidator, NullInvalidator};
use groupward_core::error::{GroupError, GroupResult};
use groupward_core::models::account::{ANONYMOUS_ROLE, AUTHENTICATED_ROLE};
use groupward_core::models::group_role::{
    CreateGroupRole, GROUP_ROLE_LIST_CACHE_TAG, RoleScope, role_cache_tag,
};
use groupward_core::models::group_type::{
    CreateGroupType, GROUP_TYPE_LIST_CACHE_TAG, GroupType, UpdateGroupType, anonymous_role_id,
    group_type_cache_tag, member_role_id, outsider_role_id,
};
use groupward_core::repository::{GroupRoleRepository, GroupTypeRepository};
use surrealdb::{Connection, Surreal};
use surrealdb_types::SurrealValue;

use super::{CountRow, SurrealGroupRoleRepository, SurrealRelationshipRepository, not_found};
use crate::error::DbError;

#[derive(Debug, SurrealValue)]
struct GroupTypeRow {
    record_id: String,
    label: String,
    description: String,
    creator_membership: bool,
    creator_wizard: bool,
    creator_roles: Vec<String>,
    installed_plugins: Vec<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<GroupTypeRow> for GroupType {
    fn from(row: GroupTypeRow) -> Self {
        GroupType {
            id: row.record_id,
            label: row.label,
            description: row.description,
            creator_membership: row.creator_membership,
            creator_wizard: row.creator_wizard,
            creator_roles: row.creator_roles,
            installed_plugins: row.installed_plugins.into_iter().collect(),
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

/// The synchronized roles every group type is created with.
fn internal_roles(group_type_id: &str) -> [CreateGroupRole; 3] {
    let internal = |role: CreateGroupRole| CreateGroupRole {
        internal: true,
        ..role
    };
    [
        internal(CreateGroupRole::synchronized(
            anonymous_role_id(group_type_id),
            group_type_id,
            "Anonymous",
            RoleScope::Outsider,
            ANONYMOUS_ROLE,
        )),
        internal(CreateGroupRole::synchronized(
            outsider_role_id(group_type_id),
            group_type_id,
            "Outsider",
            RoleScope::Outsider,
            AUTHENTICATED_ROLE,
        )),
        internal(CreateGroupRole::synchronized(
            member_role_id(group_type_id),
            group_type_id,
            "Member",
            RoleScope::Insider,
            AUTHENTICATED_ROLE,
        )),
    ]
}

/// SurrealDB implementation of the group type repository.
#[derive(Clone)]
pub struct SurrealGroupTypeRepository<C: Connection> {
    db: Surreal<C>,
    invalidator: Arc<dyn CacheTagInvalidator>,
    roles: SurrealGroupRoleRepository<C>,
    relationships: SurrealRelationshipRepository<C>,
}

impl<C: Connection> SurrealGroupTypeRepository<C> {
    pub fn new(db: Surreal<C>) -> Self {
        Self {
            roles: SurrealGroupRoleRepository::new(db.clone()),
            relationships: SurrealRelationshipRepository::new(db.clone()),
            db,
            invalidator: Arc::new(NullInvalidator),
        }
    }

    /// Also hands the invalidator to the role and relationship
    /// repositories used for cascades.
    pub fn with_invalidator(mut self, invalidator: Arc<dyn CacheTagInvalidator>) -> Self {
        self.roles = self.roles.with_invalidator(invalidator.clone());
        self.relationships = self.relationships.with_invalidator(invalidator.clone());
        self.invalidator = invalidator;
        self
    }

    pub fn with_relationships(mut self, relationships: SurrealRelationshipRepository<C>) -> Self {
        self.relationships = relationships;
        self
    }

    fn invalidate(&self, id: &str) {
        self.invalidator.invalidate_tags(&[
            group_type_cache_tag(id),
            GROUP_TYPE_LIST_CACHE_TAG.to_string(),
        ]);
    }

    async fn select(&self, id: Option<&str>) -> GroupResult<Vec<GroupType>> {
        let query = match id {
            Some(_) => {
                "SELECT meta::id(id) AS record_id, * FROM group_type \
                 WHERE id = type::record('group_type', $id)"
            }
            None => "SELECT meta::id(id) AS record_id, * FROM group_type ORDER BY record_id ASC",
        };
        let mut builder = self.db.query(query);
        if let Some(id) = id {
            builder = builder.bind(("id", id.to_string()));
        }
        let mut result = builder.await.map_err(DbError::from)?;
        let rows: Vec<GroupTypeRow> = result.take(0).map_err(DbError::from)?;
        Ok(rows.into_iter().map(GroupType::from).collect())
    }

    async fn set_plugins(&self, id: &str, plugins: BTreeSet<String>) -> GroupResult<GroupType> {
        self.db
            .query(
                "UPDATE type::record('group_type', $id) SET \
                 installed_plugins = $plugins, updated_at = time::now()",
            )
            .bind(("id", id.to_string()))
            .bind(("plugins", plugins.into_iter().collect::<Vec<_>>()))
            .await
            .map_err(DbError::from)?
            .check()
            .map_err(|e| DbError::Statement(e.to_string()))?;
        self.invalidate(id);
        self.get_by_id(id).await
    }
}

impl<C: Connection> GroupTypeRepository for SurrealGroupTypeRepository<C> {
    async fn create(&self, input: CreateGroupType) -> GroupResult<GroupType> {
        if input.id.trim().is_empty() {
            return Err(GroupError::validation("group type ID must not be empty"));
        }
        if !self.select(Some(&input.id)).await?.is_empty() {
            return Err(GroupError::AlreadyExists {
                entity: format!("group_type {}", input.id),
            });
        }

        let plugins: Vec<String> = CreateGroupType::enforced_plugins().into_iter().collect();
        self.db
            .query(
                "CREATE type::record('group_type', $id) SET \
                 label = $label, description = $description, \
                 creator_membership = $creator_membership, \
                 creator_wizard = $creator_wizard, \
                 creator_roles = $creator_roles, \
                 installed_plugins = $plugins",
            )
            .bind(("id", input.id.clone()))
            .bind(("label", input.label))
            .bind(("description", input.description))
            .bind(("creator_membership", input.creator_membership))
            .bind(("creator_wizard", input.creator_wizard))
            .bind(("creator_roles", input.creator_roles))
            .bind(("plugins", plugins))
            .await
            .map_err(DbError::from)?
            .check()
            .map_err(|e| DbError::Statement(e.to_string()))?;

        for role in internal_roles(&input.id) {
            self.roles.create(role).await?;
        }

        self.invalidate(&input.id);
        tracing::info!(group_type_id = %input.id, "created group type");
        self.get_by_id(&input.id).await
    }

    async fn get_by_id(&self, id: &str) -> GroupResult<GroupType> {
        self.select(Some(id))
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| not_found("group_type", id).into())
    }

    async fn list(&self) -> GroupResult<Vec<GroupType>> {
        self.select(None).await
    }

    async fn update(&self, id: &str, input: UpdateGroupType) -> GroupResult<GroupType> {
        self.get_by_id(id).await?;

        let mut sets = Vec::new();
        if input.label.is_some() {
            sets.push("label = $label");
        }
        if input.description.is_some() {
            sets.push("description = $description");
        }
        if input.creator_membership.is_some() {
            sets.push("creator_membership = $creator_membership");
        }
        if input.creator_wizard.is_some() {
            sets.push("creator_wizard = $creator_wizard");
        }
        if input.creator_roles.is_some() {
            sets.push("creator_roles = $creator_roles");
        }
        sets.push("updated_at = time::now()");

        let query = format!(
            "UPDATE type::record('group_type', $id) SET {}",
            sets.join(", ")
        );
        let mut builder = self.db.query(&query).bind(("id", id.to_string()));
        if let Some(label) = input.label {
            builder = builder.bind(("label", label));
        }
        if let Some(description) = input.description {
            builder = builder.bind(("description", description));
        }
        if let Some(creator_membership) = input.creator_membership {
            builder = builder.bind(("creator_membership", creator_membership));
        }
        if let Some(creator_wizard) = input.creator_wizard {
            builder = builder.bind(("creator_wizard", creator_wizard));
        }
        if let Some(creator_roles) = input.creator_roles {
            builder = builder.bind(("creator_roles", creator_roles));
        }
        builder
            .await
            .map_err(DbError::from)?
            .check()
            .map_err(|e| DbError::Statement(e.to_string()))?;

        self.invalidate(id);
        self.get_by_id(id).await
    }

    async fn delete(&self, id: &str) -> GroupResult<()> {
        self.get_by_id(id).await?;

        let mut result = self
            .db
            .query("SELECT count() AS total FROM groups WHERE group_type_id = $id GROUP ALL")
            .bind(("id", id.to_string()))
            .await
            .map_err(DbError::from)?;
        let rows: Vec<CountRow> = result.take(0).map_err(DbError::from)?;
        let groups = rows.first().map(|r| r.total).unwrap_or(0);
        if groups > 0 {
            return Err(GroupError::validation(format!(
                "group type {id} still has {groups} group(s)"
            )));
        }

        let role_ids: Vec<String> = self
            .roles
            .list_by_group_type(id)
            .await?
            .into_iter()
            .map(|role| role.id)
            .collect();
        self.db
            .query(
                "DELETE group_role WHERE group_type_id = $id; \
                 DELETE type::record('group_type', $id);",
            )
            .bind(("id", id.to_string()))
            .await
            .map_err(DbError::from)?
            .check()
            .map_err(|e| DbError::Statement(e.to_string()))?;

        let mut tags: Vec<String> = role_ids
            .iter()
            .map(|role_id| role_cache_tag(role_id))
            .collect();
        tags.push(GROUP_ROLE_LIST_CACHE_TAG.to_string());
        self.invalidator.invalidate_tags(&tags);
        self.invalidate(id);
        tracing::info!(group_type_id = id, "deleted group type");
        Ok(())
    }

    async fn install_plugin(&self, id: &str, plugin_id: &str) -> GroupResult<GroupType> {
        let group_type = self.get_by_id(id).await?;
        if group_type.has_plugin(plugin_id) {
            return Ok(group_type);
        }
        let mut plugins = group_type.installed_plugins;
        plugins.insert(plugin_id.to_string());
        tracing::info!(group_type_id = id, plugin_id, "installed relation plugin");
        self.set_plugins(id, plugins).await
    }

    async fn uninstall_plugin(&self, id: &str, plugin_id: &str) -> GroupResult<GroupType> {
        if CreateGroupType::enforced_plugins().contains(plugin_id) {
            return Err(GroupError::validation(format!(
                "relation plugin {plugin_id} is enforced and cannot be uninstalled"
            )));
        }
        let group_type = self.get_by_id(id).await?;
        if !group_type.has_plugin(plugin_id) {
            return Ok(group_type);
        }
        let removed = self.relationships.delete_by_plugin(id, plugin_id).await?;
        let mut plugins = group_type.installed_plugins;
        plugins.remove(plugin_id);
        tracing::info!(
            group_type_id = id,
            plugin_id,
            relationships = removed,
            "uninstalled relation plugin"
        );
        self.set_plugins(id, plugins).await
    }
}
