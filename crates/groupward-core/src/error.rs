//! Error types for the groupward system.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum GroupError {
    #[error("Entity not found: {entity} with id {id}")]
    NotFound { entity: String, id: String },

    #[error("Entity already exists: {entity}")]
    AlreadyExists { entity: String },

    #[error("Access denied: {reason}")]
    AccessDenied { reason: String },

    #[error("Validation error: {message}")]
    Validation { message: String },

    /// A relation plugin ID that was never registered.
    #[error("Unknown relation plugin: {0}")]
    UnknownPlugin(String),

    /// Programmer or configuration error while writing group data, e.g.
    /// adding an unsaved entity to a group.
    #[error("Storage error: {0}")]
    Storage(String),

    #[error(
        "Cardinality exceeded for plugin {plugin_id}: entity {entity_id} \
         may be added {limit} time(s)"
    )]
    Cardinality {
        plugin_id: String,
        entity_id: String,
        limit: u32,
    },

    #[error("Query error: {0}")]
    Query(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

pub type GroupResult<T> = Result<T, GroupError>;

impl GroupError {
    pub fn not_found(entity: impl Into<String>, id: impl ToString) -> Self {
        Self::NotFound {
            entity: entity.into(),
            id: id.to_string(),
        }
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
        }
    }
}
