//! Fixtures shared by unit tests.

use std::collections::BTreeSet;

use chrono::Utc;
use groupward_core::models::account::Account;
use groupward_core::models::group::Group;
use groupward_core::models::group_role::{GroupRole, RoleScope};
use groupward_core::models::group_type::{CreateGroupType, GroupType};
use groupward_core::models::relationship::{
    GroupRelationship, MEMBERSHIP_PLUGIN_ID, relationship_type_id,
};
use uuid::Uuid;

use crate::calculator::PermissionSnapshot;

pub(crate) fn snapshot_for() -> (Account, PermissionSnapshot) {
    let account = Account::authenticated(Uuid::new_v4());
    (account.clone(), PermissionSnapshot::new(account))
}

pub(crate) fn role(id: &str, group_type_id: &str, scope: RoleScope, permissions: &[&str]) -> GroupRole {
    GroupRole {
        id: id.into(),
        group_type_id: group_type_id.into(),
        label: id.into(),
        scope,
        global_role: None,
        admin: false,
        internal: false,
        locked: false,
        weight: 0,
        permissions: permissions.iter().map(|p| p.to_string()).collect(),
        created_at: Utc::now(),
        updated_at: Utc::now(),
    }
}

pub(crate) fn group_type(id: &str) -> GroupType {
    GroupType {
        id: id.into(),
        label: id.into(),
        description: String::new(),
        creator_membership: true,
        creator_wizard: false,
        creator_roles: Vec::new(),
        installed_plugins: CreateGroupType::enforced_plugins(),
        created_at: Utc::now(),
        updated_at: Utc::now(),
    }
}

pub(crate) fn group(group_type_id: &str) -> Group {
    Group {
        id: Uuid::new_v4(),
        group_type_id: group_type_id.into(),
        label: "A group".into(),
        status: true,
        owner_id: None,
        metadata: serde_json::Value::Null,
        created_at: Utc::now(),
        updated_at: Utc::now(),
    }
}

pub(crate) fn membership(account: &Account, group_type_id: &str, roles: &[&str]) -> GroupRelationship {
    membership_in(Uuid::new_v4(), account, group_type_id, roles)
}

pub(crate) fn membership_in(
    group_id: Uuid,
    account: &Account,
    group_type_id: &str,
    roles: &[&str],
) -> GroupRelationship {
    GroupRelationship {
        id: Uuid::new_v4(),
        group_id,
        group_type_id: group_type_id.into(),
        relationship_type_id: relationship_type_id(group_type_id, MEMBERSHIP_PLUGIN_ID),
        plugin_id: MEMBERSHIP_PLUGIN_ID.into(),
        entity_type_id: "user".into(),
        entity_id: account.entity_id().unwrap_or_default(),
        status: true,
        owner_id: account.id,
        group_roles: roles.iter().map(|r| r.to_string()).collect(),
        created_at: Utc::now(),
        updated_at: Utc::now(),
    }
}

pub(crate) fn permission_set(permissions: &[&str]) -> BTreeSet<String> {
    permissions.iter().map(|p| p.to_string()).collect()
}
