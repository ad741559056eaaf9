use std::collections::{BTreeSet, HashMap};

use groupward_core::error::GroupResult;
use groupward_core::models::account::Account;
use groupward_core::repository::{GroupRoleRepository, GroupTypeRepository, RelationshipRepository};

use super::{PermissionSnapshot, PermissionSource};

/// Loads snapshots from the group type, role and relationship
/// repositories.
#[derive(Clone)]
pub struct RepositoryPermissionSource<T, R, M> {
    group_types: T,
    roles: R,
    relationships: M,
}

impl<T, R, M> RepositoryPermissionSource<T, R, M>
where
    T: GroupTypeRepository,
    R: GroupRoleRepository,
    M: RelationshipRepository,
{
    pub fn new(group_types: T, roles: R, relationships: M) -> Self {
        Self {
            group_types,
            roles,
            relationships,
        }
    }

    pub fn relationships(&self) -> &M {
        &self.relationships
    }
}

impl<T, R, M> PermissionSource for RepositoryPermissionSource<T, R, M>
where
    T: GroupTypeRepository,
    R: GroupRoleRepository,
    M: RelationshipRepository,
{
    async fn load_snapshot(&self, account: &Account) -> GroupResult<PermissionSnapshot> {
        let group_types = self.group_types.list().await?;

        let memberships = match account.entity_id() {
            Some(account_id) => self.relationships.load_memberships(&account_id).await?,
            None => Vec::new(),
        };

        let referenced: Vec<String> = memberships
            .iter()
            .flat_map(|membership| membership.group_roles.iter().cloned())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();

        let mut roles = HashMap::new();
        for role in self.roles.list_synchronized().await? {
            roles.insert(role.id.clone(), role);
        }
        if !referenced.is_empty() {
            for role in self.roles.get_many(&referenced).await? {
                roles.insert(role.id.clone(), role);
            }
        }

        Ok(PermissionSnapshot {
            account: account.clone(),
            memberships,
            roles,
            group_types,
        })
    }
}
