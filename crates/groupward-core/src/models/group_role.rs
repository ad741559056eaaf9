//! Group role domain model.

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Who a group role applies to.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum RoleScope {
    /// Assigned explicitly on a membership.
    Individual,
    /// Applies to every account holding `global_role` that is not a
    /// member of the group.
    Outsider,
    /// Applies to every member holding `global_role`.
    Insider,
}

impl RoleScope {
    pub fn as_str(&self) -> &'static str {
        match self {
            RoleScope::Individual => "individual",
            RoleScope::Outsider => "outsider",
            RoleScope::Insider => "insider",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "individual" => Some(RoleScope::Individual),
            "outsider" => Some(RoleScope::Outsider),
            "insider" => Some(RoleScope::Insider),
            _ => None,
        }
    }

    pub fn is_synchronized(&self) -> bool {
        !matches!(self, RoleScope::Individual)
    }
}

/// A role scoped to exactly one group type.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GroupRole {
    /// Machine name, unique across all group types.
    pub id: String,
    pub group_type_id: String,
    pub label: String,
    pub scope: RoleScope,
    /// Site role a synchronized role follows. Always `None` for
    /// individual roles.
    pub global_role: Option<String>,
    /// Admin roles implicitly hold every permission.
    pub admin: bool,
    /// Created and managed by the system.
    pub internal: bool,
    /// Protected against deletion through the UI.
    pub locked: bool,
    pub weight: i32,
    pub permissions: BTreeSet<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl GroupRole {
    pub fn has_permission(&self, permission: &str) -> bool {
        self.admin || self.permissions.contains(permission)
    }

    /// Whether this synchronized role applies to an account holding
    /// `site_roles`.
    pub fn applies_to_site_roles<'a>(&self, mut site_roles: impl Iterator<Item = &'a String>) -> bool {
        match &self.global_role {
            Some(global_role) if self.scope.is_synchronized() => {
                site_roles.any(|role| role == global_role)
            }
            _ => false,
        }
    }

    pub fn is_deletable(&self) -> bool {
        !self.internal && !self.locked
    }

    pub fn cache_tag(&self) -> String {
        role_cache_tag(&self.id)
    }
}

pub fn role_cache_tag(role_id: &str) -> String {
    format!("config:group.role.{role_id}")
}

/// Invalidated whenever a role is created or deleted.
pub const GROUP_ROLE_LIST_CACHE_TAG: &str = "config:group_role_list";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateGroupRole {
    pub id: String,
    pub group_type_id: String,
    pub label: String,
    pub scope: RoleScope,
    pub global_role: Option<String>,
    pub admin: bool,
    pub internal: bool,
    pub locked: bool,
    pub weight: i32,
    pub permissions: BTreeSet<String>,
}

impl CreateGroupRole {
    /// An individual role with no permissions.
    pub fn individual(
        id: impl Into<String>,
        group_type_id: impl Into<String>,
        label: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            group_type_id: group_type_id.into(),
            label: label.into(),
            scope: RoleScope::Individual,
            global_role: None,
            admin: false,
            internal: false,
            locked: false,
            weight: 0,
            permissions: BTreeSet::new(),
        }
    }

    /// A synchronized role following `global_role`.
    pub fn synchronized(
        id: impl Into<String>,
        group_type_id: impl Into<String>,
        label: impl Into<String>,
        scope: RoleScope,
        global_role: impl Into<String>,
    ) -> Self {
        Self {
            scope,
            global_role: Some(global_role.into()),
            ..Self::individual(id, group_type_id, label)
        }
    }

    pub fn with_permissions<I, S>(mut self, permissions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.permissions
            .extend(permissions.into_iter().map(Into::into));
        self
    }

    pub fn admin(mut self) -> Self {
        self.admin = true;
        self
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct UpdateGroupRole {
    pub label: Option<String>,
    pub admin: Option<bool>,
    pub weight: Option<i32>,
    pub locked: Option<bool>,
    pub permissions: Option<BTreeSet<String>>,
}
