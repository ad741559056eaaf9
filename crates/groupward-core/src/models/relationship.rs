//! Group relationship domain model: the join record linking a group to a
//! grouped entity through a relation plugin.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Plugin ID of the built-in membership relation.
pub const MEMBERSHIP_PLUGIN_ID: &str = "group_membership";

/// Cache tag invalidated whenever any relationship is written.
pub const RELATIONSHIP_LIST_CACHE_TAG: &str = "group_relationship_list";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GroupRelationship {
    pub id: Uuid,
    pub group_id: Uuid,
    /// Denormalized from the group for query alteration.
    pub group_type_id: String,
    /// The relationship bundle, see [`relationship_type_id`].
    pub relationship_type_id: String,
    pub plugin_id: String,
    pub entity_type_id: String,
    pub entity_id: String,
    /// Published state of the grouped content within the group.
    pub status: bool,
    pub owner_id: Option<Uuid>,
    /// Individual group roles; only meaningful for memberships.
    pub group_roles: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl GroupRelationship {
    pub fn is_membership(&self) -> bool {
        self.plugin_id == MEMBERSHIP_PLUGIN_ID
    }

    pub fn is_owned_by(&self, account_id: Option<Uuid>) -> bool {
        account_id.is_some() && self.owner_id == account_id
    }

    /// Tags invalidated when this relationship is written.
    pub fn list_cache_tags(&self) -> Vec<String> {
        relationship_list_cache_tags(&self.plugin_id, &self.entity_id)
    }
}

/// The bundle ID of relationships of `plugin_id` in groups of
/// `group_type_id`.
pub fn relationship_type_id(group_type_id: &str, plugin_id: &str) -> String {
    format!("{group_type_id}-{}", plugin_id.replace(':', "-"))
}

pub fn plugin_list_cache_tag(plugin_id: &str) -> String {
    format!("{RELATIONSHIP_LIST_CACHE_TAG}:plugin:{plugin_id}")
}

pub fn entity_list_cache_tag(plugin_id: &str, entity_id: &str) -> String {
    format!("{RELATIONSHIP_LIST_CACHE_TAG}:plugin:{plugin_id}:entity:{entity_id}")
}

pub fn relationship_list_cache_tags(plugin_id: &str, entity_id: &str) -> Vec<String> {
    vec![
        RELATIONSHIP_LIST_CACHE_TAG.to_string(),
        plugin_list_cache_tag(plugin_id),
        entity_list_cache_tag(plugin_id, entity_id),
    ]
}

/// Input for persisting a relationship. Validation against the relation
/// plugin happens before this reaches a repository.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateRelationship {
    pub group_id: Uuid,
    pub group_type_id: String,
    pub plugin_id: String,
    pub entity_type_id: String,
    pub entity_id: String,
    pub status: bool,
    pub owner_id: Option<Uuid>,
    pub group_roles: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct UpdateRelationship {
    pub status: Option<bool>,
    pub owner_id: Option<Option<Uuid>>,
    pub group_roles: Option<Vec<String>>,
}

/// Extra values supplied when adding an entity to a group.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct RelationshipValues {
    /// Publication state of the relationship; follows the entity when unset.
    pub status: Option<bool>,
    pub owner_id: Option<Uuid>,
    pub group_roles: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn derivative_plugin_ids_make_valid_bundle_ids() {
        assert_eq!(
            relationship_type_id("default", "group_node:article"),
            "default-group_node-article"
        );
        assert_eq!(
            relationship_type_id("club", MEMBERSHIP_PLUGIN_ID),
            "club-group_membership"
        );
    }

    #[test]
    fn list_tags_cover_plugin_and_entity() {
        let tags = relationship_list_cache_tags(MEMBERSHIP_PLUGIN_ID, "42");
        assert_eq!(
            tags,
            vec![
                "group_relationship_list".to_string(),
                "group_relationship_list:plugin:group_membership".to_string(),
                "group_relationship_list:plugin:group_membership:entity:42".to_string(),
            ]
        );
    }
}
