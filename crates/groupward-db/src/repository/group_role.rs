//! SurrealDB implementation of [`GroupRoleRepository`].

use std::collections::BTreeSet;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use groupward_core::cache::{CacheTagInvalidator, NullInvalidator};
use groupward_core::error::{GroupError, GroupResult};
use groupward_core::models::group_role::{
    CreateGroupRole, GROUP_ROLE_LIST_CACHE_TAG, GroupRole, RoleScope, UpdateGroupRole,
    role_cache_tag,
};
use groupward_core::repository::GroupRoleRepository;
use surrealdb::{Connection, Surreal};
use surrealdb_types::SurrealValue;

use super::not_found;
use crate::error::DbError;

const SELECT_ROLE: &str = "SELECT meta::id(id) AS record_id, * FROM group_role";

#[derive(Debug, SurrealValue)]
struct GroupRoleRow {
    record_id: String,
    group_type_id: String,
    label: String,
    scope: String,
    global_role: Option<String>,
    admin: bool,
    internal: bool,
    locked: bool,
    weight: i64,
    permissions: Vec<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl GroupRoleRow {
    fn try_into_role(self) -> Result<GroupRole, DbError> {
        let scope = RoleScope::parse(&self.scope)
            .ok_or_else(|| DbError::Corrupt(format!("unknown role scope: {}", self.scope)))?;
        let weight = i32::try_from(self.weight)
            .map_err(|e| DbError::Corrupt(format!("role weight out of range: {e}")))?;
        Ok(GroupRole {
            id: self.record_id,
            group_type_id: self.group_type_id,
            label: self.label,
            scope,
            global_role: self.global_role,
            admin: self.admin,
            internal: self.internal,
            locked: self.locked,
            weight,
            permissions: self.permissions.into_iter().collect(),
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

/// SurrealDB implementation of the group role repository.
#[derive(Clone)]
pub struct SurrealGroupRoleRepository<C: Connection> {
    db: Surreal<C>,
    invalidator: Arc<dyn CacheTagInvalidator>,
}

impl<C: Connection> SurrealGroupRoleRepository<C> {
    pub fn new(db: Surreal<C>) -> Self {
        Self {
            db,
            invalidator: Arc::new(NullInvalidator),
        }
    }

    pub fn with_invalidator(mut self, invalidator: Arc<dyn CacheTagInvalidator>) -> Self {
        self.invalidator = invalidator;
        self
    }

    fn invalidate(&self, role_id: &str) {
        self.invalidator.invalidate_tags(&[
            role_cache_tag(role_id),
            GROUP_ROLE_LIST_CACHE_TAG.to_string(),
        ]);
    }

    async fn select_one(&self, id: &str) -> GroupResult<Option<GroupRole>> {
        let mut result = self
            .db
            .query(format!("{SELECT_ROLE} WHERE id = type::record('group_role', $id)"))
            .bind(("id", id.to_string()))
            .await
            .map_err(DbError::from)?;
        let rows: Vec<GroupRoleRow> = result.take(0).map_err(DbError::from)?;
        Ok(rows
            .into_iter()
            .next()
            .map(GroupRoleRow::try_into_role)
            .transpose()?)
    }

    async fn select_many(
        &self,
        filter: &str,
        bind: (&'static str, serde_json::Value),
    ) -> GroupResult<Vec<GroupRole>> {
        let mut result = self
            .db
            .query(format!("{SELECT_ROLE} WHERE {filter} ORDER BY weight ASC, record_id ASC"))
            .bind(bind)
            .await
            .map_err(DbError::from)?;
        let rows: Vec<GroupRoleRow> = result.take(0).map_err(DbError::from)?;
        let roles = rows
            .into_iter()
            .map(GroupRoleRow::try_into_role)
            .collect::<Result<Vec<_>, DbError>>()?;
        Ok(roles)
    }

    async fn set_permissions(&self, id: &str, permissions: BTreeSet<String>) -> GroupResult<GroupRole> {
        self.update(
            id,
            UpdateGroupRole {
                permissions: Some(permissions),
                ..UpdateGroupRole::default()
            },
        )
        .await
    }
}

impl<C: Connection> GroupRoleRepository for SurrealGroupRoleRepository<C> {
    async fn create(&self, input: CreateGroupRole) -> GroupResult<GroupRole> {
        if input.id.trim().is_empty() {
            return Err(GroupError::validation("group role ID must not be empty"));
        }
        match (input.scope.is_synchronized(), &input.global_role) {
            (true, None) => {
                return Err(GroupError::validation(
                    "outsider and insider roles need a global role",
                ));
            }
            (false, Some(_)) => {
                return Err(GroupError::validation(
                    "individual roles cannot synchronize with a global role",
                ));
            }
            _ => {}
        }
        if self.select_one(&input.id).await?.is_some() {
            return Err(GroupError::AlreadyExists {
                entity: format!("group_role {}", input.id),
            });
        }

        let permissions: Vec<String> = input.permissions.into_iter().collect();
        let result = self
            .db
            .query(
                "CREATE type::record('group_role', $id) SET \
                 group_type_id = $group_type_id, label = $label, \
                 scope = $scope, global_role = $global_role, \
                 admin = $admin, internal = $internal, locked = $locked, \
                 weight = $weight, permissions = $permissions",
            )
            .bind(("id", input.id.clone()))
            .bind(("group_type_id", input.group_type_id))
            .bind(("label", input.label))
            .bind(("scope", input.scope.as_str().to_string()))
            .bind(("global_role", input.global_role))
            .bind(("admin", input.admin))
            .bind(("internal", input.internal))
            .bind(("locked", input.locked))
            .bind(("weight", i64::from(input.weight)))
            .bind(("permissions", permissions))
            .await
            .map_err(DbError::from)?;
        result
            .check()
            .map_err(|e| DbError::Statement(e.to_string()))?;

        self.invalidate(&input.id);
        tracing::debug!(role_id = %input.id, "created group role");
        self.get_by_id(&input.id).await
    }

    async fn get_by_id(&self, id: &str) -> GroupResult<GroupRole> {
        self.select_one(id)
            .await?
            .ok_or_else(|| not_found("group_role", id).into())
    }

    async fn get_many(&self, ids: &[String]) -> GroupResult<Vec<GroupRole>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        self.select_many(
            "meta::id(id) INSIDE $ids",
            ("ids", serde_json::Value::from(ids.to_vec())),
        )
        .await
    }

    async fn list_by_group_type(&self, group_type_id: &str) -> GroupResult<Vec<GroupRole>> {
        self.select_many(
            "group_type_id = $group_type_id",
            ("group_type_id", serde_json::Value::from(group_type_id)),
        )
        .await
    }

    async fn list_synchronized(&self) -> GroupResult<Vec<GroupRole>> {
        self.select_many(
            "scope != $individual",
            ("individual", serde_json::Value::from(RoleScope::Individual.as_str())),
        )
        .await
    }

    async fn update(&self, id: &str, input: UpdateGroupRole) -> GroupResult<GroupRole> {
        self.get_by_id(id).await?;

        let mut sets = Vec::new();
        if input.label.is_some() {
            sets.push("label = $label");
        }
        if input.admin.is_some() {
            sets.push("admin = $admin");
        }
        if input.weight.is_some() {
            sets.push("weight = $weight");
        }
        if input.locked.is_some() {
            sets.push("locked = $locked");
        }
        if input.permissions.is_some() {
            sets.push("permissions = $permissions");
        }
        sets.push("updated_at = time::now()");

        let query = format!(
            "UPDATE type::record('group_role', $id) SET {}",
            sets.join(", ")
        );
        let mut builder = self.db.query(&query).bind(("id", id.to_string()));
        if let Some(label) = input.label {
            builder = builder.bind(("label", label));
        }
        if let Some(admin) = input.admin {
            builder = builder.bind(("admin", admin));
        }
        if let Some(weight) = input.weight {
            builder = builder.bind(("weight", i64::from(weight)));
        }
        if let Some(locked) = input.locked {
            builder = builder.bind(("locked", locked));
        }
        if let Some(permissions) = input.permissions {
            builder = builder.bind(("permissions", permissions.into_iter().collect::<Vec<_>>()));
        }

        let result = builder.await.map_err(DbError::from)?;
        result
            .check()
            .map_err(|e| DbError::Statement(e.to_string()))?;

        self.invalidate(id);
        self.get_by_id(id).await
    }

    async fn grant_permissions(&self, id: &str, permissions: &[String]) -> GroupResult<GroupRole> {
        let mut current = self.get_by_id(id).await?.permissions;
        current.extend(permissions.iter().cloned());
        self.set_permissions(id, current).await
    }

    async fn revoke_permissions(&self, id: &str, permissions: &[String]) -> GroupResult<GroupRole> {
        let mut current = self.get_by_id(id).await?.permissions;
        for permission in permissions {
            current.remove(permission);
        }
        self.set_permissions(id, current).await
    }

    async fn delete(&self, id: &str) -> GroupResult<()> {
        let role = self.get_by_id(id).await?;
        if !role.is_deletable() {
            return Err(GroupError::validation(format!(
                "group role {id} is internal or locked and cannot be deleted"
            )));
        }

        self.db
            .query(
                "UPDATE group_relationship \
                 SET group_roles = array::complement(group_roles, [$id]) \
                 WHERE $id INSIDE group_roles; \
                 DELETE type::record('group_role', $id);",
            )
            .bind(("id", id.to_string()))
            .await
            .map_err(DbError::from)?
            .check()
            .map_err(|e| DbError::Statement(e.to_string()))?;

        self.invalidate(id);
        tracing::info!(role_id = id, "deleted group role");
        Ok(())
    }
}
