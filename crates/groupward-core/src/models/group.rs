//! Group domain model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// An instance of a group type. Owns its relationships.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Group {
    pub id: Uuid,
    pub group_type_id: String,
    pub label: String,
    /// Published state.
    pub status: bool,
    pub owner_id: Option<Uuid>,
    pub metadata: serde_json::Value,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Group {
    pub fn cache_tag(&self) -> String {
        group_cache_tag(self.id)
    }

    pub fn is_owned_by(&self, account_id: Option<Uuid>) -> bool {
        account_id.is_some() && self.owner_id == account_id
    }
}

pub fn group_cache_tag(id: Uuid) -> String {
    format!("group:{id}")
}

/// Cache tag invalidated whenever any group is written.
pub const GROUP_LIST_CACHE_TAG: &str = "group_list";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateGroup {
    pub group_type_id: String,
    pub label: String,
    pub status: bool,
    pub owner_id: Option<Uuid>,
    pub metadata: Option<serde_json::Value>,
}

impl CreateGroup {
    pub fn new(group_type_id: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            group_type_id: group_type_id.into(),
            label: label.into(),
            status: true,
            owner_id: None,
            metadata: None,
        }
    }

    pub fn owned_by(mut self, owner_id: Uuid) -> Self {
        self.owner_id = Some(owner_id);
        self
    }

    pub fn unpublished(mut self) -> Self {
        self.status = false;
        self
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct UpdateGroup {
    pub label: Option<String>,
    pub status: Option<bool>,
    pub owner_id: Option<Option<Uuid>>,
    pub metadata: Option<serde_json::Value>,
}
