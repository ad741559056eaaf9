//! Permission calculators and the chain that merges their output.
//!
//! Calculators are synchronous and only see a [`PermissionSnapshot`]:
//! everything storage knows about one account's memberships and the
//! roles that could apply to it. Loading that snapshot is the job of a
//! [`PermissionSource`], which keeps I/O out of the calculators and lets
//! the chain cache on the account alone.

mod bypass;
mod chain;
mod individual;
mod source;
mod synchronized;

use std::collections::HashMap;

use groupward_core::error::GroupResult;
use groupward_core::models::account::Account;
use groupward_core::models::group_role::GroupRole;
use groupward_core::models::group_type::GroupType;
use groupward_core::models::relationship::GroupRelationship;

use crate::permission::RefinableCalculatedPermissions;

pub use bypass::BypassPermissionCalculator;
pub use chain::{ChainPermissionCalculator, RequestPermissions, cache_key};
pub use individual::IndividualPermissionCalculator;
pub use source::RepositoryPermissionSource;
pub use synchronized::SynchronizedPermissionCalculator;

/// Everything the calculators need to know about one account.
#[derive(Debug, Clone)]
pub struct PermissionSnapshot {
    pub account: Account,
    /// The account's membership relationships.
    pub memberships: Vec<GroupRelationship>,
    /// Roles referenced by `memberships` plus every synchronized role,
    /// keyed by role ID. Stale references are simply absent.
    pub roles: HashMap<String, GroupRole>,
    pub group_types: Vec<GroupType>,
}

impl PermissionSnapshot {
    pub fn new(account: Account) -> Self {
        Self {
            account,
            memberships: Vec::new(),
            roles: HashMap::new(),
            group_types: Vec::new(),
        }
    }

    pub fn role(&self, id: &str) -> Option<&GroupRole> {
        self.roles.get(id)
    }

    /// Synchronized roles of one group type.
    pub fn synchronized_roles<'a>(
        &'a self,
        group_type_id: &'a str,
    ) -> impl Iterator<Item = &'a GroupRole> + 'a {
        self.roles
            .values()
            .filter(move |role| role.group_type_id == group_type_id && role.scope.is_synchronized())
    }
}

/// One link of the permission calculator chain.
///
/// Implementations must only add items: the chain merges every
/// calculator's output, so the order calculators run in never matters.
pub trait PermissionCalculator: Send + Sync {
    fn name(&self) -> &'static str;

    fn calculate(&self, snapshot: &PermissionSnapshot) -> RefinableCalculatedPermissions;
}

/// Loads the [`PermissionSnapshot`] of an account.
pub trait PermissionSource: Send + Sync {
    fn load_snapshot(
        &self,
        account: &Account,
    ) -> impl Future<Output = GroupResult<PermissionSnapshot>> + Send;
}
