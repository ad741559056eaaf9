//! Listing table and column names shared by query alteration and storage.

/// Entity type ID of groups.
pub const GROUP_ENTITY_TYPE: &str = "group";
/// Entity type ID of relationships.
pub const RELATIONSHIP_ENTITY_TYPE: &str = "group_relationship";

pub mod groups {
    pub const TABLE: &str = "groups";
    pub const ID: &str = "id";
    pub const TYPE: &str = "group_type_id";
    pub const STATUS: &str = "status";
    pub const OWNER: &str = "owner_id";
}

pub mod relationships {
    pub const TABLE: &str = "group_relationship";
    pub const ID: &str = "id";
    pub const GROUP: &str = "group_id";
    pub const GROUP_TYPE: &str = "group_type_id";
    pub const RELATIONSHIP_TYPE: &str = "relationship_type_id";
    pub const PLUGIN: &str = "plugin_id";
    pub const ENTITY_TYPE: &str = "entity_type_id";
    pub const ENTITY: &str = "entity_id";
    pub const STATUS: &str = "status";
    pub const OWNER: &str = "owner_id";
}
