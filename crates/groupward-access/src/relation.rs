//! Relation plugins: how an entity type participates in groups.
//!
//! Plugins are registered explicitly on a [`RelationTypeRegistry`] at
//! startup. Each plugin pairs a static [`RelationTypeDefinition`] with a
//! [`PermissionProvider`] naming its permissions and a
//! [`RelationAccessControl`] deciding access from those names.

mod access_control;
mod definition;
mod permission_provider;
mod registry;

use serde::{Deserialize, Serialize};

pub use access_control::RelationAccessControl;
pub use definition::RelationTypeDefinition;
pub use permission_provider::{
    ADMINISTER_MEMBERS, DefaultPermissionProvider, JOIN_GROUP, LEAVE_GROUP,
    MembershipPermissionProvider, PermissionDefinition, PermissionProvider,
};
pub use registry::{RelationHandler, RelationTypeRegistry};

/// Operation a permission is asked for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Operation {
    View,
    ViewUnpublished,
    Update,
    Delete,
    Create,
}

impl Operation {
    pub fn as_str(&self) -> &'static str {
        match self {
            Operation::View => "view",
            Operation::ViewUnpublished => "view unpublished",
            Operation::Update => "update",
            Operation::Delete => "delete",
            Operation::Create => "create",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "view" => Some(Operation::View),
            "view unpublished" => Some(Operation::ViewUnpublished),
            "update" => Some(Operation::Update),
            "delete" => Some(Operation::Delete),
            "create" => Some(Operation::Create),
            _ => None,
        }
    }
}

/// What a permission applies to: the relationship record itself or the
/// entity it groups.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PermissionTarget {
    Relationship,
    Entity,
}

impl PermissionTarget {
    pub fn as_str(&self) -> &'static str {
        match self {
            PermissionTarget::Relationship => "relationship",
            PermissionTarget::Entity => "entity",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "relationship" => Some(PermissionTarget::Relationship),
            "entity" => Some(PermissionTarget::Entity),
            _ => None,
        }
    }
}

/// Whether a grant covers any record or only the account's own.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Ownership {
    Any,
    Own,
}

impl Ownership {
    pub fn as_str(&self) -> &'static str {
        match self {
            Ownership::Any => "any",
            Ownership::Own => "own",
        }
    }
}
