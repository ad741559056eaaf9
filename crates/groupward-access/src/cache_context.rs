//! Cache context values derived from group permissions.

use groupward_core::error::GroupResult;
use groupward_core::models::account::Account;
use groupward_core::models::group::Group;
use groupward_core::models::group_type::{anonymous_role_id, member_role_id, outsider_role_id};
use groupward_core::repository::RelationshipRepository;

use crate::calculator::{ChainPermissionCalculator, PermissionSource};
use crate::checker::GroupPermissionChecker;
use crate::permission::permissions_hash;

/// Value of the `user.group_permissions` context: accounts with the same
/// effective group permissions share it.
pub async fn group_permissions_context<S: PermissionSource>(
    calculator: &ChainPermissionCalculator<S>,
    account: &Account,
) -> GroupResult<String> {
    let permissions = calculator.calculate_permissions(account).await?;
    Ok(permissions_hash(&permissions))
}

/// The synchronized role an account falls under for a group type:
/// `{T}-anonymous`, `{T}-outsider` or `{T}-member`.
pub fn synchronized_role_context(account: &Account, group_type_id: &str, is_member: bool) -> String {
    if account.is_anonymous() {
        anonymous_role_id(group_type_id)
    } else if is_member {
        member_role_id(group_type_id)
    } else {
        outsider_role_id(group_type_id)
    }
}

/// [`synchronized_role_context`] for a concrete group, looking up
/// membership.
pub async fn group_membership_context<S, M>(
    checker: &GroupPermissionChecker<S, M>,
    account: &Account,
    group: &Group,
) -> GroupResult<String>
where
    S: PermissionSource,
    M: RelationshipRepository,
{
    let is_member = checker.is_member(account, group.id).await?;
    Ok(synchronized_role_context(account, &group.group_type_id, is_member))
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    #[test]
    fn anonymous_accounts_are_anonymous_outsiders() {
        assert_eq!(
            synchronized_role_context(&Account::anonymous(), "default", false),
            "default-anonymous"
        );
    }

    #[test]
    fn authenticated_non_members_are_outsiders() {
        let account = Account::authenticated(Uuid::new_v4());
        assert_eq!(synchronized_role_context(&account, "default", false), "default-outsider");
        assert_eq!(synchronized_role_context(&account, "default", true), "default-member");
    }
}
