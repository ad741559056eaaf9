//! Entity-level access control for groups, relationships and grouped
//! host entities.

pub mod entity;
pub mod group;
pub mod relationship;

pub use entity::GroupedEntityAccess;
pub use group::GroupAccessControl;
pub use relationship::RelationshipAccessControl;
