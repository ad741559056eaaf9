//! Host entity descriptors: how the relation layer sees entities it
//! does not own.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Static description of a host entity type's listing table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntityTypeDefinition {
    pub id: String,
    pub table: String,
    pub id_key: String,
    pub bundle_key: Option<String>,
    pub owner_key: Option<String>,
    pub status_key: Option<String>,
}

impl EntityTypeDefinition {
    pub fn new(id: impl Into<String>, table: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            table: table.into(),
            id_key: "id".into(),
            bundle_key: None,
            owner_key: None,
            status_key: None,
        }
    }

    pub fn with_bundle_key(mut self, key: impl Into<String>) -> Self {
        self.bundle_key = Some(key.into());
        self
    }

    pub fn with_owner_key(mut self, key: impl Into<String>) -> Self {
        self.owner_key = Some(key.into());
        self
    }

    pub fn with_status_key(mut self, key: impl Into<String>) -> Self {
        self.status_key = Some(key.into());
        self
    }

    pub fn is_ownable(&self) -> bool {
        self.owner_key.is_some()
    }

    pub fn is_publishable(&self) -> bool {
        self.status_key.is_some()
    }
}

/// A single host entity offered to the relation layer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntityRef {
    pub entity_type_id: String,
    pub bundle: Option<String>,
    /// `None` until the host has saved the entity.
    pub id: Option<String>,
    pub owner_id: Option<Uuid>,
    pub published: bool,
}

impl EntityRef {
    pub fn new(entity_type_id: impl Into<String>, id: impl Into<String>) -> Self {
        Self {
            entity_type_id: entity_type_id.into(),
            bundle: None,
            id: Some(id.into()),
            owner_id: None,
            published: true,
        }
    }

    /// An entity the host has not saved yet.
    pub fn unsaved(entity_type_id: impl Into<String>) -> Self {
        Self {
            id: None,
            ..Self::new(entity_type_id, String::new())
        }
    }

    /// The entity reference for a user account.
    pub fn user(id: Uuid) -> Self {
        Self::new("user", id.to_string()).owned_by(id)
    }

    pub fn with_bundle(mut self, bundle: impl Into<String>) -> Self {
        self.bundle = Some(bundle.into());
        self
    }

    pub fn owned_by(mut self, owner_id: Uuid) -> Self {
        self.owner_id = Some(owner_id);
        self
    }

    pub fn unpublished(mut self) -> Self {
        self.published = false;
        self
    }

    pub fn is_new(&self) -> bool {
        self.id.is_none()
    }
}
