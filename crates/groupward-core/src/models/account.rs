//! The account on whose behalf access is evaluated.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Site role every anonymous account holds.
pub const ANONYMOUS_ROLE: &str = "anonymous";

/// Site role every authenticated account holds.
pub const AUTHENTICATED_ROLE: &str = "authenticated";

/// A user account as seen by the access layer.
///
/// `roles` are site-wide roles (not group roles); synchronized group
/// roles are matched against them. `permissions` are site-wide
/// permissions such as `bypass group access`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
    /// `None` for the anonymous account.
    pub id: Option<Uuid>,
    pub roles: BTreeSet<String>,
    pub permissions: BTreeSet<String>,
}

impl Account {
    pub fn anonymous() -> Self {
        Self {
            id: None,
            roles: BTreeSet::from([ANONYMOUS_ROLE.to_string()]),
            permissions: BTreeSet::new(),
        }
    }

    pub fn authenticated(id: Uuid) -> Self {
        Self {
            id: Some(id),
            roles: BTreeSet::from([AUTHENTICATED_ROLE.to_string()]),
            permissions: BTreeSet::new(),
        }
    }

    pub fn with_role(mut self, role: impl Into<String>) -> Self {
        self.roles.insert(role.into());
        self
    }

    pub fn with_permission(mut self, permission: impl Into<String>) -> Self {
        self.permissions.insert(permission.into());
        self
    }

    pub fn is_authenticated(&self) -> bool {
        self.id.is_some()
    }

    pub fn is_anonymous(&self) -> bool {
        self.id.is_none()
    }

    pub fn has_role(&self, role: &str) -> bool {
        self.roles.contains(role)
    }

    /// Site-wide permission check.
    pub fn has_permission(&self, permission: &str) -> bool {
        self.permissions.contains(permission)
    }

    /// The ID used as `entity_id` for membership relationships.
    pub fn entity_id(&self) -> Option<String> {
        self.id.map(|id| id.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn anonymous_has_anonymous_role_only() {
        let account = Account::anonymous();
        assert!(account.is_anonymous());
        assert!(account.has_role(ANONYMOUS_ROLE));
        assert!(!account.has_role(AUTHENTICATED_ROLE));
        assert_eq!(account.entity_id(), None);
    }

    #[test]
    fn authenticated_builders_accumulate() {
        let id = Uuid::new_v4();
        let account = Account::authenticated(id)
            .with_role("editor")
            .with_permission("bypass group access");
        assert!(account.is_authenticated());
        assert!(account.has_role("editor"));
        assert!(account.has_role(AUTHENTICATED_ROLE));
        assert!(account.has_permission("bypass group access"));
        assert_eq!(account.entity_id(), Some(id.to_string()));
    }
}
