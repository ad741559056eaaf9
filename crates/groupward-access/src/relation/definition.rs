use serde::{Deserialize, Serialize};

use groupward_core::models::relationship::MEMBERSHIP_PLUGIN_ID;

/// Static metadata of a relation plugin.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelationTypeDefinition {
    /// Plugin ID, e.g. `group_membership` or `group_node:article`.
    pub id: String,
    pub label: String,
    pub description: String,
    /// Entity type of the grouped entities.
    pub entity_type_id: String,
    /// Restricts the plugin to one bundle of the entity type.
    pub entity_bundle: Option<String>,
    /// Whether group permissions govern access to the grouped entity
    /// itself, not just to the relationship.
    pub entity_access: bool,
    /// How many groups one entity may be added to. 0 is unlimited.
    pub group_cardinality: u32,
    /// How many times one entity may be added to the same group. 0 is
    /// unlimited.
    pub entity_cardinality: u32,
    /// Whether the plugin defines an `administer {plugin}` permission.
    pub admin_permission: bool,
    /// Path segment used for pretty relationship URLs.
    pub pretty_path_key: String,
    pub reference_label: String,
    /// Installed on every group type and cannot be uninstalled.
    pub enforced: bool,
}

impl RelationTypeDefinition {
    pub fn new(id: impl Into<String>, entity_type_id: impl Into<String>) -> Self {
        let id = id.into();
        Self {
            label: id.clone(),
            pretty_path_key: id.replace([':', '_'], "-"),
            id,
            description: String::new(),
            entity_type_id: entity_type_id.into(),
            entity_bundle: None,
            entity_access: false,
            group_cardinality: 0,
            entity_cardinality: 0,
            admin_permission: false,
            reference_label: "Entity".into(),
            enforced: false,
        }
    }

    /// The built-in plugin adding users to groups as members.
    pub fn membership() -> Self {
        Self {
            label: "Group membership".into(),
            description: "Adds users to groups as members.".into(),
            entity_cardinality: 1,
            admin_permission: true,
            pretty_path_key: "member".into(),
            reference_label: "User".into(),
            enforced: true,
            ..Self::new(MEMBERSHIP_PLUGIN_ID, "user")
        }
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = label.into();
        self
    }

    pub fn with_bundle(mut self, bundle: impl Into<String>) -> Self {
        self.entity_bundle = Some(bundle.into());
        self
    }

    pub fn with_entity_access(mut self) -> Self {
        self.entity_access = true;
        self
    }

    pub fn with_admin_permission(mut self) -> Self {
        self.admin_permission = true;
        self
    }

    pub fn with_group_cardinality(mut self, cardinality: u32) -> Self {
        self.group_cardinality = cardinality;
        self
    }

    pub fn with_entity_cardinality(mut self, cardinality: u32) -> Self {
        self.entity_cardinality = cardinality;
        self
    }

    pub fn is_membership(&self) -> bool {
        self.id == MEMBERSHIP_PLUGIN_ID
    }

    /// Whether an entity of `entity_type_id` and `bundle` may be added
    /// through this plugin.
    pub fn accepts(&self, entity_type_id: &str, bundle: Option<&str>) -> bool {
        if self.entity_type_id != entity_type_id {
            return false;
        }
        match &self.entity_bundle {
            Some(expected) => bundle == Some(expected.as_str()),
            None => true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bundle_restriction_is_enforced() {
        let definition = RelationTypeDefinition::new("group_node:article", "node").with_bundle("article");
        assert!(definition.accepts("node", Some("article")));
        assert!(!definition.accepts("node", Some("page")));
        assert!(!definition.accepts("node", None));
        assert!(!definition.accepts("user", Some("article")));
    }

    #[test]
    fn membership_is_limited_to_once_per_group() {
        let membership = RelationTypeDefinition::membership();
        assert!(membership.is_membership());
        assert_eq!(membership.entity_cardinality, 1);
        assert!(membership.enforced);
        assert_eq!(membership.pretty_path_key, "member");
    }
}
