//! Database-specific error types and conversions.

use groupward_core::error::GroupError;
use groupward_core::query::QueryError;

/// Database-layer error type.
#[derive(Debug, thiserror::Error)]
pub enum DbError {
    #[error("SurrealDB error: {0}")]
    Surreal(#[from] surrealdb::Error),

    #[error("Migration failed: {0}")]
    Migration(String),

    #[error("Record not found: {entity} with id {id}")]
    NotFound { entity: String, id: String },

    #[error("Statement failed: {0}")]
    Statement(String),

    #[error("Corrupt record: {0}")]
    Corrupt(String),

    #[error(transparent)]
    Query(#[from] QueryError),
}

impl From<DbError> for GroupError {
    fn from(err: DbError) -> Self {
        match err {
            DbError::NotFound { entity, id } => GroupError::NotFound { entity, id },
            DbError::Query(err) => err.into(),
            other => GroupError::Database(other.to_string()),
        }
    }
}
