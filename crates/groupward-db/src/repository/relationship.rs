//! SurrealDB implementation of [`RelationshipRepository`].

use std::sync::Arc;

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use groupward_core::cache::{CacheTagInvalidator, NullInvalidator};
use groupward_core::error::GroupResult;
use groupward_core::models::relationship::{
    CreateRelationship, GroupRelationship, MEMBERSHIP_PLUGIN_ID, UpdateRelationship,
    relationship_type_id,
};
use groupward_core::repository::RelationshipRepository;
use surrealdb::{Connection, Surreal};
use surrealdb_types::SurrealValue;
use uuid::Uuid;

use super::{CountRow, not_found, parse_optional_uuid, parse_uuid};
use crate::error::DbError;

const SELECT_RELATIONSHIP: &str = "SELECT meta::id(id) AS record_id, * FROM group_relationship";

#[derive(Debug, SurrealValue)]
struct RelationshipRow {
    record_id: String,
    group_id: String,
    group_type_id: String,
    relationship_type_id: String,
    plugin_id: String,
    entity_type_id: String,
    entity_id: String,
    status: bool,
    owner_id: Option<String>,
    group_roles: Vec<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl RelationshipRow {
    fn try_into_relationship(self) -> Result<GroupRelationship, DbError> {
        Ok(GroupRelationship {
            id: parse_uuid(&self.record_id, "relationship")?,
            group_id: parse_uuid(&self.group_id, "group")?,
            group_type_id: self.group_type_id,
            relationship_type_id: self.relationship_type_id,
            plugin_id: self.plugin_id,
            entity_type_id: self.entity_type_id,
            entity_id: self.entity_id,
            status: self.status,
            owner_id: parse_optional_uuid(self.owner_id, "owner")?,
            group_roles: self.group_roles,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

/// SurrealDB implementation of the relationship repository.
///
/// Relationships loaded by group are kept in memory until a write through
/// this repository (or a clone of it) touches that group.
#[derive(Clone)]
pub struct SurrealRelationshipRepository<C: Connection> {
    db: Surreal<C>,
    invalidator: Arc<dyn CacheTagInvalidator>,
    by_group: Arc<DashMap<Uuid, Vec<GroupRelationship>>>,
}

impl<C: Connection> SurrealRelationshipRepository<C> {
    pub fn new(db: Surreal<C>) -> Self {
        Self {
            db,
            invalidator: Arc::new(NullInvalidator),
            by_group: Arc::new(DashMap::new()),
        }
    }

    pub fn with_invalidator(mut self, invalidator: Arc<dyn CacheTagInvalidator>) -> Self {
        self.invalidator = invalidator;
        self
    }

    fn written(&self, relationship: &GroupRelationship) {
        self.by_group.remove(&relationship.group_id);
        self.invalidator
            .invalidate_tags(&relationship.list_cache_tags());
    }

    async fn select(
        &self,
        filter: &str,
        binds: Vec<(&'static str, serde_json::Value)>,
    ) -> GroupResult<Vec<GroupRelationship>> {
        let mut builder = self.db.query(format!(
            "{SELECT_RELATIONSHIP} WHERE {filter} ORDER BY created_at ASC, record_id ASC"
        ));
        for bind in binds {
            builder = builder.bind(bind);
        }
        let mut result = builder.await.map_err(DbError::from)?;
        let rows: Vec<RelationshipRow> = result.take(0).map_err(DbError::from)?;
        let relationships = rows
            .into_iter()
            .map(RelationshipRow::try_into_relationship)
            .collect::<Result<Vec<_>, DbError>>()?;
        Ok(relationships)
    }

    /// Delete every relationship of a group, returning what was removed.
    pub async fn delete_by_group(&self, group_id: Uuid) -> GroupResult<Vec<GroupRelationship>> {
        let removed = self.load_by_group(group_id, None).await?;
        self.db
            .query("DELETE group_relationship WHERE group_id = $group_id")
            .bind(("group_id", group_id.to_string()))
            .await
            .map_err(DbError::from)?
            .check()
            .map_err(|e| DbError::Statement(e.to_string()))?;
        for relationship in &removed {
            self.written(relationship);
        }
        self.by_group.remove(&group_id);
        Ok(removed)
    }

    /// Delete the relationships a plugin created in groups of one type.
    pub async fn delete_by_plugin(&self, group_type_id: &str, plugin_id: &str) -> GroupResult<u64> {
        let removed = self
            .select(
                "group_type_id = $group_type_id AND plugin_id = $plugin_id",
                vec![
                    ("group_type_id", serde_json::Value::from(group_type_id)),
                    ("plugin_id", serde_json::Value::from(plugin_id)),
                ],
            )
            .await?;
        self.db
            .query(
                "DELETE group_relationship \
                 WHERE group_type_id = $group_type_id AND plugin_id = $plugin_id",
            )
            .bind(("group_type_id", group_type_id.to_string()))
            .bind(("plugin_id", plugin_id.to_string()))
            .await
            .map_err(DbError::from)?
            .check()
            .map_err(|e| DbError::Statement(e.to_string()))?;
        for relationship in &removed {
            self.written(relationship);
        }
        Ok(removed.len() as u64)
    }
}

impl<C: Connection> RelationshipRepository for SurrealRelationshipRepository<C> {
    async fn create(&self, input: CreateRelationship) -> GroupResult<GroupRelationship> {
        let id = Uuid::new_v4();
        let result = self
            .db
            .query(
                "CREATE type::record('group_relationship', $id) SET \
                 group_id = $group_id, group_type_id = $group_type_id, \
                 relationship_type_id = $relationship_type_id, \
                 plugin_id = $plugin_id, entity_type_id = $entity_type_id, \
                 entity_id = $entity_id, status = $status, \
                 owner_id = $owner_id, group_roles = $group_roles",
            )
            .bind(("id", id.to_string()))
            .bind(("group_id", input.group_id.to_string()))
            .bind((
                "relationship_type_id",
                relationship_type_id(&input.group_type_id, &input.plugin_id),
            ))
            .bind(("group_type_id", input.group_type_id))
            .bind(("plugin_id", input.plugin_id))
            .bind(("entity_type_id", input.entity_type_id))
            .bind(("entity_id", input.entity_id))
            .bind(("status", input.status))
            .bind(("owner_id", input.owner_id.map(|id| id.to_string())))
            .bind(("group_roles", input.group_roles))
            .await
            .map_err(DbError::from)?;
        result
            .check()
            .map_err(|e| DbError::Statement(e.to_string()))?;

        let relationship = self.get_by_id(id).await?;
        self.written(&relationship);
        Ok(relationship)
    }

    async fn get_by_id(&self, id: Uuid) -> GroupResult<GroupRelationship> {
        self.select(
            "id = type::record('group_relationship', $id)",
            vec![("id", serde_json::Value::from(id.to_string()))],
        )
        .await?
        .into_iter()
        .next()
        .ok_or_else(|| not_found("group_relationship", id).into())
    }

    async fn update(&self, id: Uuid, input: UpdateRelationship) -> GroupResult<GroupRelationship> {
        let before = self.get_by_id(id).await?;

        let mut sets = Vec::new();
        if input.status.is_some() {
            sets.push("status = $status");
        }
        if input.owner_id.is_some() {
            sets.push("owner_id = $owner_id");
        }
        if input.group_roles.is_some() {
            sets.push("group_roles = $group_roles");
        }
        sets.push("updated_at = time::now()");

        let query = format!(
            "UPDATE type::record('group_relationship', $id) SET {}",
            sets.join(", ")
        );
        let mut builder = self.db.query(&query).bind(("id", id.to_string()));
        if let Some(status) = input.status {
            builder = builder.bind(("status", status));
        }
        if let Some(owner_id) = input.owner_id {
            builder = builder.bind(("owner_id", owner_id.map(|id| id.to_string())));
        }
        if let Some(group_roles) = input.group_roles {
            builder = builder.bind(("group_roles", group_roles));
        }
        builder
            .await
            .map_err(DbError::from)?
            .check()
            .map_err(|e| DbError::Statement(e.to_string()))?;

        let after = self.get_by_id(id).await?;
        self.written(&before);
        self.written(&after);
        Ok(after)
    }

    async fn delete(&self, id: Uuid) -> GroupResult<()> {
        let relationship = self.get_by_id(id).await?;
        self.db
            .query("DELETE type::record('group_relationship', $id)")
            .bind(("id", id.to_string()))
            .await
            .map_err(DbError::from)?
            .check()
            .map_err(|e| DbError::Statement(e.to_string()))?;
        self.written(&relationship);
        Ok(())
    }

    async fn load_by_group(
        &self,
        group_id: Uuid,
        plugin_id: Option<&str>,
    ) -> GroupResult<Vec<GroupRelationship>> {
        let cached = self.by_group.get(&group_id).map(|entry| entry.clone());
        let all = match cached {
            Some(cached) => cached,
            None => {
                let loaded = self
                    .select(
                        "group_id = $group_id",
                        vec![("group_id", serde_json::Value::from(group_id.to_string()))],
                    )
                    .await?;
                self.by_group.insert(group_id, loaded.clone());
                loaded
            }
        };
        Ok(match plugin_id {
            Some(plugin_id) => all
                .into_iter()
                .filter(|relationship| relationship.plugin_id == plugin_id)
                .collect(),
            None => all,
        })
    }

    async fn load_by_entity(
        &self,
        entity_id: &str,
        plugin_ids: &[String],
    ) -> GroupResult<Vec<GroupRelationship>> {
        if plugin_ids.is_empty() {
            return Ok(Vec::new());
        }
        self.select(
            "entity_id = $entity_id AND plugin_id INSIDE $plugin_ids",
            vec![
                ("entity_id", serde_json::Value::from(entity_id)),
                ("plugin_ids", serde_json::Value::from(plugin_ids.to_vec())),
            ],
        )
        .await
    }

    async fn load_memberships(&self, account_id: &str) -> GroupResult<Vec<GroupRelationship>> {
        self.load_by_entity(account_id, &[MEMBERSHIP_PLUGIN_ID.to_string()])
            .await
    }

    async fn get_membership(
        &self,
        group_id: Uuid,
        account_id: &str,
    ) -> GroupResult<Option<GroupRelationship>> {
        Ok(self
            .load_by_group(group_id, Some(MEMBERSHIP_PLUGIN_ID))
            .await?
            .into_iter()
            .find(|membership| membership.entity_id == account_id))
    }

    async fn count_by_plugins(&self, plugin_ids: &[String]) -> GroupResult<u64> {
        if plugin_ids.is_empty() {
            return Ok(0);
        }
        let mut result = self
            .db
            .query(
                "SELECT count() AS total FROM group_relationship \
                 WHERE plugin_id INSIDE $plugin_ids GROUP ALL",
            )
            .bind(("plugin_ids", plugin_ids.to_vec()))
            .await
            .map_err(DbError::from)?;
        let rows: Vec<CountRow> = result.take(0).map_err(DbError::from)?;
        Ok(rows.first().map(|r| r.total).unwrap_or(0))
    }
}
