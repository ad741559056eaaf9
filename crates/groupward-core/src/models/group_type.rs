//! Group type domain model.

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::relationship::MEMBERSHIP_PLUGIN_ID;

/// A bundle of groups sharing the same installable relation plugins,
/// roles and creation policy.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GroupType {
    /// Machine name, e.g. `default`.
    pub id: String,
    pub label: String,
    pub description: String,
    /// Whether the creator of a group automatically becomes a member.
    pub creator_membership: bool,
    /// Whether group creation continues into a membership form wizard.
    pub creator_wizard: bool,
    /// Individual roles granted to the creator's membership.
    pub creator_roles: Vec<String>,
    /// Relation plugin IDs installed on this type.
    pub installed_plugins: BTreeSet<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl GroupType {
    /// Outsider role synchronized with the anonymous site role.
    pub fn anonymous_role_id(&self) -> String {
        anonymous_role_id(&self.id)
    }

    /// Outsider role synchronized with the authenticated site role.
    pub fn outsider_role_id(&self) -> String {
        outsider_role_id(&self.id)
    }

    /// Insider role every member of a group of this type holds.
    pub fn member_role_id(&self) -> String {
        member_role_id(&self.id)
    }

    pub fn has_plugin(&self, plugin_id: &str) -> bool {
        self.installed_plugins.contains(plugin_id)
    }

    pub fn cache_tag(&self) -> String {
        group_type_cache_tag(&self.id)
    }
}

pub fn group_type_cache_tag(group_type_id: &str) -> String {
    format!("config:group.type.{group_type_id}")
}

pub fn anonymous_role_id(group_type_id: &str) -> String {
    format!("{group_type_id}-anonymous")
}

pub fn outsider_role_id(group_type_id: &str) -> String {
    format!("{group_type_id}-outsider")
}

pub fn member_role_id(group_type_id: &str) -> String {
    format!("{group_type_id}-member")
}

/// Cache tag invalidated whenever any group type is written.
pub const GROUP_TYPE_LIST_CACHE_TAG: &str = "config:group_type_list";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateGroupType {
    pub id: String,
    pub label: String,
    pub description: String,
    pub creator_membership: bool,
    pub creator_wizard: bool,
    pub creator_roles: Vec<String>,
}

impl CreateGroupType {
    pub fn new(id: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            label: label.into(),
            description: String::new(),
            creator_membership: true,
            creator_wizard: false,
            creator_roles: Vec::new(),
        }
    }

    /// Plugins installed on every new group type.
    pub fn enforced_plugins() -> BTreeSet<String> {
        BTreeSet::from([MEMBERSHIP_PLUGIN_ID.to_string()])
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct UpdateGroupType {
    pub label: Option<String>,
    pub description: Option<String>,
    pub creator_membership: Option<bool>,
    pub creator_wizard: Option<bool>,
    pub creator_roles: Option<Vec<String>>,
}
