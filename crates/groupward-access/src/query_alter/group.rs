use groupward_core::models::account::Account;
use groupward_core::models::group::GROUP_LIST_CACHE_TAG;
use groupward_core::query::{Condition, SelectQuery};
use groupward_core::schema::groups;

use super::scoped::{BucketPermissions, Buckets, ScopeColumns, ScopedConditions};
use crate::access::group::{
    ADMINISTER_GROUP, DELETE_GROUP, EDIT_GROUP, VIEW_ANY_UNPUBLISHED_GROUP, VIEW_GROUP,
    VIEW_OWN_UNPUBLISHED_GROUP,
};
use crate::permission::CalculatedPermissions;
use crate::relation::Operation;

/// Restricts a listing of groups to those the account may operate on.
pub struct GroupQueryAlter<'a> {
    permissions: &'a CalculatedPermissions,
    account: &'a Account,
}

impl<'a> GroupQueryAlter<'a> {
    pub fn new(permissions: &'a CalculatedPermissions, account: &'a Account) -> Self {
        Self {
            permissions,
            account,
        }
    }

    fn wanted(any: &str, own: Option<&str>) -> BucketPermissions {
        BucketPermissions::new(
            [Some(any.to_string()), Some(ADMINISTER_GROUP.to_string())],
            own.map(str::to_string),
        )
    }

    pub fn alter(&self, query: &mut SelectQuery, operation: Operation) {
        query
            .metadata_mut()
            .add_cache_tag(GROUP_LIST_CACHE_TAG)
            .merge(self.permissions.metadata());
        if self.permissions.is_global_admin() {
            return;
        }

        let columns = ScopeColumns {
            group_id: query.column(groups::ID),
            group_type: query.column(groups::TYPE),
            owner: query.column(groups::OWNER),
            status: Some(query.column(groups::STATUS)),
        };
        let buckets = |any: &str, own: Option<&str>| {
            Buckets::collect(self.permissions, &Self::wanted(any, own))
        };

        let mut scoped = ScopedConditions::new(query, self.account, self.permissions, columns);
        let condition = match operation {
            Operation::View => scoped.status_condition(&[
                (true, buckets(VIEW_GROUP, None)),
                (
                    false,
                    buckets(VIEW_ANY_UNPUBLISHED_GROUP, Some(VIEW_OWN_UNPUBLISHED_GROUP)),
                ),
            ]),
            Operation::Update => scoped.bucket_condition(&buckets(EDIT_GROUP, None)),
            Operation::Delete => scoped.bucket_condition(&buckets(DELETE_GROUP, None)),
            Operation::ViewUnpublished | Operation::Create => None,
        };
        scoped.finish();

        match condition {
            Some(condition) => {
                query.condition(Condition::Group(condition));
            }
            None => {
                tracing::debug!(
                    operation = operation.as_str(),
                    account = ?self.account.id,
                    "no group grants, listing forced empty"
                );
                query.always_false();
            }
        }
    }
}
