//! Bucket building shared by every listing alteration.
//!
//! Grants are sorted into an "any" and an "own" bucket, each holding the
//! group IDs (individual scope) and group type IDs (outsider and insider
//! scopes) the grant was found in. Each bucket then becomes one OR group
//! over those scopes:
//!
//! - individual: `group_id IN (...)`
//! - outsider: `group_type IN (...)`, no membership of the account, and
//!   `group_id NOT IN` every group the account has an individual item
//!   for, since an individual item outranks type-wide outsider grants
//! - insider: `group_type IN (...)` and a membership of the account
//!
//! Membership is an existence check against the relationship table,
//! registered once per query under [`MEMBERSHIP_ALIAS`].

use std::collections::BTreeSet;

use groupward_core::cache::{CONTEXT_USER, CONTEXT_USER_GROUP_PERMISSIONS};
use groupward_core::models::account::Account;
use groupward_core::models::relationship::{MEMBERSHIP_PLUGIN_ID, plugin_list_cache_tag};
use groupward_core::query::{Column, Condition, ConditionGroup, Join, SelectQuery};
use groupward_core::schema::relationships;

use crate::permission::{CalculatedPermissions, PermissionScope};

/// Alias of the account's membership in the group being filtered.
pub const MEMBERSHIP_ALIAS: &str = "group_membership";

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub(crate) struct ScopeIds {
    pub individual: BTreeSet<String>,
    pub outsider: BTreeSet<String>,
    pub insider: BTreeSet<String>,
}

impl ScopeIds {
    fn insert(&mut self, scope: PermissionScope, identifier: &str) {
        let ids = match scope {
            PermissionScope::Individual => &mut self.individual,
            PermissionScope::Outsider => &mut self.outsider,
            PermissionScope::Insider => &mut self.insider,
            PermissionScope::Global => return,
        };
        ids.insert(identifier.to_string());
    }

    pub fn is_empty(&self) -> bool {
        self.individual.is_empty() && self.outsider.is_empty() && self.insider.is_empty()
    }
}

/// Permission names placing a scope into the "any" or "own" bucket.
#[derive(Debug, Clone, Default)]
pub(crate) struct BucketPermissions {
    /// Any of these grants unrestricted access; admin permissions go here.
    pub any: Vec<String>,
    pub own: Option<String>,
}

impl BucketPermissions {
    pub fn new<I>(any: I, own: Option<String>) -> Self
    where
        I: IntoIterator<Item = Option<String>>,
    {
        Self {
            any: any.into_iter().flatten().collect(),
            own,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.any.is_empty() && self.own.is_none()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub(crate) struct Buckets {
    pub any: ScopeIds,
    pub own: ScopeIds,
}

impl Buckets {
    pub fn collect(permissions: &CalculatedPermissions, wanted: &BucketPermissions) -> Self {
        let mut buckets = Buckets::default();
        for item in permissions.items() {
            if item.scope() == PermissionScope::Global {
                continue;
            }
            if item.is_admin() || wanted.any.iter().any(|name| item.has_permission(name)) {
                buckets.any.insert(item.scope(), item.identifier());
            } else if wanted
                .own
                .as_deref()
                .is_some_and(|name| item.has_permission(name))
            {
                buckets.own.insert(item.scope(), item.identifier());
            }
        }
        buckets
    }

    pub fn is_empty(&self) -> bool {
        self.any.is_empty() && self.own.is_empty()
    }
}

/// Where the group ID, group type, owner and status of a listed row live.
#[derive(Debug, Clone)]
pub(crate) struct ScopeColumns {
    pub group_id: Column,
    pub group_type: Column,
    pub owner: Column,
    pub status: Option<Column>,
}

/// Turns buckets into condition groups against one query.
pub(crate) struct ScopedConditions<'q> {
    query: &'q mut SelectQuery,
    account: &'q Account,
    columns: ScopeColumns,
    individual_ids: Vec<String>,
    uses_owner: bool,
    uses_membership: bool,
}

impl<'q> ScopedConditions<'q> {
    pub fn new(
        query: &'q mut SelectQuery,
        account: &'q Account,
        permissions: &CalculatedPermissions,
        columns: ScopeColumns,
    ) -> Self {
        let individual_ids = permissions
            .identifiers(PermissionScope::Individual)
            .into_iter()
            .map(str::to_string)
            .collect();
        Self {
            query,
            account,
            columns,
            individual_ids,
            uses_owner: false,
            uses_membership: false,
        }
    }

    fn ensure_membership_join(&mut self) -> String {
        let group_id = self.columns.group_id.clone();
        let account_id = self.account.entity_id();
        self.uses_membership = true;
        self.query.ensure_join(MEMBERSHIP_ALIAS, || {
            let column = |name: &str| Column::new(MEMBERSHIP_ALIAS, name);
            Join::new(
                MEMBERSHIP_ALIAS,
                relationships::TABLE,
                ConditionGroup::and()
                    .with(Condition::columns_eq(column(relationships::GROUP), group_id))
                    .with(Condition::eq(column(relationships::PLUGIN), MEMBERSHIP_PLUGIN_ID))
                    .with(Condition::eq(column(relationships::ENTITY), account_id)),
            )
        })
    }

    fn scope_condition(&mut self, ids: &ScopeIds) -> Option<ConditionGroup> {
        let mut any_scope = ConditionGroup::or();
        let authenticated = self.account.is_authenticated();

        if !ids.individual.is_empty() {
            any_scope.add(Condition::in_list(
                self.columns.group_id.clone(),
                ids.individual.iter(),
            ));
        }

        if !ids.outsider.is_empty() {
            let mut outsider = ConditionGroup::and().with(Condition::in_list(
                self.columns.group_type.clone(),
                ids.outsider.iter(),
            ));
            // Anonymous accounts are never members.
            if authenticated {
                let alias = self.ensure_membership_join();
                outsider.add(Condition::not_exists(alias, ConditionGroup::and()));
            }
            if !self.individual_ids.is_empty() {
                outsider.add(Condition::not_in_list(
                    self.columns.group_id.clone(),
                    self.individual_ids.iter(),
                ));
            }
            any_scope.add_group(outsider);
        }

        if !ids.insider.is_empty() && authenticated {
            let alias = self.ensure_membership_join();
            any_scope.add_group(
                ConditionGroup::and()
                    .with(Condition::in_list(
                        self.columns.group_type.clone(),
                        ids.insider.iter(),
                    ))
                    .with(Condition::exists(alias, ConditionGroup::and())),
            );
        }

        (!any_scope.is_empty()).then_some(any_scope)
    }

    /// OR of the "any" bucket and the owner-restricted "own" bucket.
    pub fn bucket_condition(&mut self, buckets: &Buckets) -> Option<ConditionGroup> {
        let mut condition = ConditionGroup::or();
        if let Some(any) = self.scope_condition(&buckets.any) {
            condition.add_group(any);
        }
        if let Some(account_id) = self.account.entity_id() {
            if let Some(own) = self.scope_condition(&buckets.own) {
                self.uses_owner = true;
                condition.add_group(
                    ConditionGroup::and()
                        .with(Condition::eq(self.columns.owner.clone(), account_id))
                        .with(Condition::Group(own)),
                );
            }
        }
        (!condition.is_empty()).then_some(condition)
    }

    /// One AND group per publication status that has grants, ORed.
    /// Statuses without grants are left out entirely. Rows of a table
    /// without a status column count as published.
    pub fn status_condition(&mut self, by_status: &[(bool, Buckets)]) -> Option<ConditionGroup> {
        let Some(status_column) = self.columns.status.clone() else {
            return by_status
                .iter()
                .find(|(status, _)| *status)
                .and_then(|(_, buckets)| self.bucket_condition(buckets));
        };

        let mut condition = ConditionGroup::or();
        for (status, buckets) in by_status {
            if buckets.is_empty() {
                continue;
            }
            if let Some(granted) = self.bucket_condition(buckets) {
                condition.add_group(
                    ConditionGroup::and()
                        .with(Condition::eq(status_column.clone(), *status))
                        .with(Condition::Group(granted)),
                );
            }
        }
        (!condition.is_empty()).then_some(condition)
    }

    /// Record what the conditions built so far depend on.
    pub fn finish(self) {
        let metadata = self.query.metadata_mut();
        metadata.add_cache_context(CONTEXT_USER_GROUP_PERMISSIONS);
        if self.uses_owner {
            metadata.add_cache_context(CONTEXT_USER);
        }
        if self.uses_membership {
            metadata.add_cache_tag(plugin_list_cache_tag(MEMBERSHIP_PLUGIN_ID));
        }
    }
}
