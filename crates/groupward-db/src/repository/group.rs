//! SurrealDB implementation of [`GroupRepository`].

use std::sync::Arc;

use chrono::{DateTime, Utc};
use groupward_core::cache::{CacheTagInvalidator, NullInvalidator};
use groupward_core::error::{GroupError, GroupResult};
use groupward_core::models::group::{
    CreateGroup, GROUP_LIST_CACHE_TAG, Group, UpdateGroup, group_cache_tag,
};
use groupward_core::repository::{GroupRepository, PaginatedResult, Pagination};
use surrealdb::{Connection, Surreal};
use surrealdb_types::SurrealValue;
use uuid::Uuid;

use super::{CountRow, SurrealRelationshipRepository, not_found, parse_optional_uuid, parse_uuid};
use crate::error::DbError;

#[derive(Debug, SurrealValue)]
struct GroupRow {
    record_id: String,
    group_type_id: String,
    label: String,
    status: bool,
    owner_id: Option<String>,
    metadata: serde_json::Value,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl GroupRow {
    fn try_into_group(self) -> Result<Group, DbError> {
        Ok(Group {
            id: parse_uuid(&self.record_id, "group")?,
            group_type_id: self.group_type_id,
            label: self.label,
            status: self.status,
            owner_id: parse_optional_uuid(self.owner_id, "owner")?,
            metadata: self.metadata,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

/// SurrealDB implementation of the group repository.
///
/// Deleting a group deletes its relationships through the relationship
/// repository given to [`with_relationships`](Self::with_relationships),
/// so that repository's caches see the cascade.
#[derive(Clone)]
pub struct SurrealGroupRepository<C: Connection> {
    db: Surreal<C>,
    invalidator: Arc<dyn CacheTagInvalidator>,
    relationships: SurrealRelationshipRepository<C>,
}

impl<C: Connection> SurrealGroupRepository<C> {
    pub fn new(db: Surreal<C>) -> Self {
        Self {
            relationships: SurrealRelationshipRepository::new(db.clone()),
            db,
            invalidator: Arc::new(NullInvalidator),
        }
    }

    pub fn with_invalidator(mut self, invalidator: Arc<dyn CacheTagInvalidator>) -> Self {
        self.invalidator = invalidator;
        self
    }

    pub fn with_relationships(mut self, relationships: SurrealRelationshipRepository<C>) -> Self {
        self.relationships = relationships;
        self
    }

    fn invalidate(&self, id: Uuid) {
        self.invalidator
            .invalidate_tags(&[group_cache_tag(id), GROUP_LIST_CACHE_TAG.to_string()]);
    }
}

impl<C: Connection> GroupRepository for SurrealGroupRepository<C> {
    async fn create(&self, input: CreateGroup) -> GroupResult<Group> {
        if input.label.trim().is_empty() {
            return Err(GroupError::validation("group label must not be empty"));
        }

        let mut exists = self
            .db
            .query("SELECT VALUE meta::id(id) FROM type::record('group_type', $id)")
            .bind(("id", input.group_type_id.clone()))
            .await
            .map_err(DbError::from)?;
        let found: Vec<String> = exists.take(0).map_err(DbError::from)?;
        if found.is_empty() {
            return Err(not_found("group_type", &input.group_type_id).into());
        }

        let id = Uuid::new_v4();
        let metadata = input
            .metadata
            .unwrap_or(serde_json::Value::Object(Default::default()));
        self.db
            .query(
                "CREATE type::record('groups', $id) SET \
                 group_type_id = $group_type_id, label = $label, \
                 status = $status, owner_id = $owner_id, metadata = $metadata",
            )
            .bind(("id", id.to_string()))
            .bind(("group_type_id", input.group_type_id))
            .bind(("label", input.label))
            .bind(("status", input.status))
            .bind(("owner_id", input.owner_id.map(|id| id.to_string())))
            .bind(("metadata", metadata))
            .await
            .map_err(DbError::from)?
            .check()
            .map_err(|e| DbError::Statement(e.to_string()))?;

        self.invalidate(id);
        tracing::info!(group_id = %id, "created group");
        self.get_by_id(id).await
    }

    async fn get_by_id(&self, id: Uuid) -> GroupResult<Group> {
        let mut result = self
            .db
            .query(
                "SELECT meta::id(id) AS record_id, * FROM groups \
                 WHERE id = type::record('groups', $id)",
            )
            .bind(("id", id.to_string()))
            .await
            .map_err(DbError::from)?;
        let rows: Vec<GroupRow> = result.take(0).map_err(DbError::from)?;
        let row = rows
            .into_iter()
            .next()
            .ok_or_else(|| not_found("group", id))?;
        Ok(row.try_into_group()?)
    }

    async fn list(&self, pagination: Pagination) -> GroupResult<PaginatedResult<Group>> {
        let mut count_result = self
            .db
            .query("SELECT count() AS total FROM groups GROUP ALL")
            .await
            .map_err(DbError::from)?;
        let count_rows: Vec<CountRow> = count_result.take(0).map_err(DbError::from)?;
        let total = count_rows.first().map(|r| r.total).unwrap_or(0);

        let mut result = self
            .db
            .query(
                "SELECT meta::id(id) AS record_id, * FROM groups \
                 ORDER BY created_at ASC \
                 LIMIT $limit START $offset",
            )
            .bind(("limit", pagination.limit))
            .bind(("offset", pagination.offset))
            .await
            .map_err(DbError::from)?;
        let rows: Vec<GroupRow> = result.take(0).map_err(DbError::from)?;
        let items = rows
            .into_iter()
            .map(GroupRow::try_into_group)
            .collect::<Result<Vec<_>, DbError>>()?;

        Ok(PaginatedResult {
            items,
            total,
            offset: pagination.offset,
            limit: pagination.limit,
        })
    }

    async fn update(&self, id: Uuid, input: UpdateGroup) -> GroupResult<Group> {
        self.get_by_id(id).await?;

        let mut sets = Vec::new();
        if input.label.is_some() {
            sets.push("label = $label");
        }
        if input.status.is_some() {
            sets.push("status = $status");
        }
        if input.owner_id.is_some() {
            sets.push("owner_id = $owner_id");
        }
        if input.metadata.is_some() {
            sets.push("metadata = $metadata");
        }
        sets.push("updated_at = time::now()");

        let query = format!(
            "UPDATE type::record('groups', $id) SET {}",
            sets.join(", ")
        );
        let mut builder = self.db.query(&query).bind(("id", id.to_string()));
        if let Some(label) = input.label {
            builder = builder.bind(("label", label));
        }
        if let Some(status) = input.status {
            builder = builder.bind(("status", status));
        }
        if let Some(owner_id) = input.owner_id {
            builder = builder.bind(("owner_id", owner_id.map(|id| id.to_string())));
        }
        if let Some(metadata) = input.metadata {
            builder = builder.bind(("metadata", metadata));
        }
        builder
            .await
            .map_err(DbError::from)?
            .check()
            .map_err(|e| DbError::Statement(e.to_string()))?;

        self.invalidate(id);
        self.get_by_id(id).await
    }

    async fn delete(&self, id: Uuid) -> GroupResult<()> {
        self.get_by_id(id).await?;
        let removed = self.relationships.delete_by_group(id).await?;
        self.db
            .query("DELETE type::record('groups', $id)")
            .bind(("id", id.to_string()))
            .await
            .map_err(DbError::from)?
            .check()
            .map_err(|e| DbError::Statement(e.to_string()))?;

        self.invalidate(id);
        tracing::info!(group_id = %id, relationships = removed.len(), "deleted group");
        Ok(())
    }
}
