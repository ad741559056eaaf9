//! SurrealDB repository implementations.
//!
//! Every write reports the cache tags of what it changed to the
//! repository's [`CacheTagInvalidator`] once the statement has succeeded.
//!
//! [`CacheTagInvalidator`]: groupward_core::cache::CacheTagInvalidator

mod group;
mod group_role;
mod group_type;
mod relationship;

pub use group::SurrealGroupRepository;
pub use group_role::SurrealGroupRoleRepository;
pub use group_type::SurrealGroupTypeRepository;
pub use relationship::SurrealRelationshipRepository;

use surrealdb_types::SurrealValue;
use uuid::Uuid;

use crate::error::DbError;

#[derive(Debug, SurrealValue)]
pub(crate) struct CountRow {
    pub(crate) total: u64,
}

fn parse_uuid(value: &str, what: &str) -> Result<Uuid, DbError> {
    Uuid::parse_str(value).map_err(|e| DbError::Corrupt(format!("invalid {what} UUID: {e}")))
}

fn parse_optional_uuid(value: Option<String>, what: &str) -> Result<Option<Uuid>, DbError> {
    value.map(|v| parse_uuid(&v, what)).transpose()
}

fn not_found(entity: &str, id: impl ToString) -> DbError {
    DbError::NotFound {
        entity: entity.into(),
        id: id.to_string(),
    }
}
