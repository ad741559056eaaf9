use groupward_core::error::GroupResult;
use groupward_core::models::account::Account;
use groupward_core::models::relationship::{RELATIONSHIP_LIST_CACHE_TAG, plugin_list_cache_tag};
use groupward_core::query::{Condition, ConditionGroup, SelectQuery};
use groupward_core::schema::relationships;

use super::scoped::{BucketPermissions, Buckets, ScopeColumns, ScopedConditions};
use crate::permission::CalculatedPermissions;
use crate::relation::{Operation, Ownership, PermissionTarget, RelationTypeRegistry};

/// Restricts a listing of relationships, plugin by plugin.
pub struct RelationshipQueryAlter<'a> {
    permissions: &'a CalculatedPermissions,
    account: &'a Account,
    registry: &'a RelationTypeRegistry,
}

impl<'a> RelationshipQueryAlter<'a> {
    pub fn new(
        permissions: &'a CalculatedPermissions,
        account: &'a Account,
        registry: &'a RelationTypeRegistry,
    ) -> Self {
        Self {
            permissions,
            account,
            registry,
        }
    }

    pub fn alter(&self, query: &mut SelectQuery, operation: Operation) -> GroupResult<()> {
        let plugin_ids = self.registry.plugin_ids();
        query
            .metadata_mut()
            .add_cache_tag(RELATIONSHIP_LIST_CACHE_TAG)
            .add_cache_tags(plugin_ids.iter().map(|id| plugin_list_cache_tag(id)))
            .merge(self.permissions.metadata());
        if self.permissions.is_global_admin() {
            return Ok(());
        }

        let listable = matches!(
            operation,
            Operation::View | Operation::Update | Operation::Delete
        );
        let columns = ScopeColumns {
            group_id: query.column(relationships::GROUP),
            group_type: query.column(relationships::GROUP_TYPE),
            owner: query.column(relationships::OWNER),
            status: None,
        };
        let plugin_column = query.column(relationships::PLUGIN);

        let mut per_plugin = ConditionGroup::or();
        let mut scoped = ScopedConditions::new(query, self.account, self.permissions, columns);
        for plugin_id in plugin_ids.iter().filter(|_| listable) {
            let provider = self.registry.permission_provider(plugin_id)?;
            let wanted = BucketPermissions::new(
                [
                    provider.permission(operation, PermissionTarget::Relationship, Ownership::Any),
                    provider.admin_permission(),
                ],
                provider.permission(operation, PermissionTarget::Relationship, Ownership::Own),
            );
            if wanted.is_empty() {
                continue;
            }
            let buckets = Buckets::collect(self.permissions, &wanted);
            if buckets.is_empty() {
                continue;
            }
            if let Some(granted) = scoped.bucket_condition(&buckets) {
                per_plugin.add_group(
                    ConditionGroup::and()
                        .with(Condition::eq(plugin_column.clone(), plugin_id.as_str()))
                        .with(Condition::Group(granted)),
                );
            }
        }
        scoped.finish();

        if per_plugin.is_empty() {
            tracing::debug!(
                operation = operation.as_str(),
                account = ?self.account.id,
                "no relationship grants, listing forced empty"
            );
            query.always_false();
        } else {
            query.condition(Condition::Group(per_plugin));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use groupward_core::models::entity::EntityTypeDefinition;
    use groupward_core::query::Value;
    use groupward_core::query::eval::{Dataset, evaluate};
    use uuid::Uuid;

    use super::*;
    use crate::permission::{CalculatedPermissionsItem, PermissionScope, RefinableCalculatedPermissions};
    use crate::relation::RelationTypeDefinition;

    fn registry() -> Arc<RelationTypeRegistry> {
        let mut registry = RelationTypeRegistry::with_builtins().unwrap();
        registry.register_entity_type(EntityTypeDefinition::new("node", "node").with_owner_key("uid"));
        registry
            .register(RelationTypeDefinition::new("group_node:article", "node").with_entity_access())
            .unwrap();
        Arc::new(registry)
    }

    fn permissions(items: Vec<CalculatedPermissionsItem>) -> CalculatedPermissions {
        let mut refinable = RefinableCalculatedPermissions::new();
        for item in items {
            refinable.add_item(item);
        }
        refinable.freeze()
    }

    fn insert(data: &mut Dataset, id: &str, group: &str, plugin: &str, owner: Option<&str>) {
        data.insert(
            relationships::TABLE,
            [
                (relationships::ID, Value::from(id)),
                (relationships::GROUP, Value::from(group)),
                (relationships::GROUP_TYPE, Value::from("default")),
                (relationships::PLUGIN, Value::from(plugin)),
                (relationships::ENTITY, Value::from(format!("entity-{id}"))),
                (relationships::OWNER, Value::from(owner)),
            ],
        );
    }

    fn listed(query: &SelectQuery, data: &Dataset) -> Vec<String> {
        evaluate(query, data)
            .unwrap()
            .into_iter()
            .filter_map(|row| match row.get(relationships::ID) {
                Some(Value::Str(id)) => Some(id.clone()),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn grants_are_applied_per_plugin() {
        let account = Account::authenticated(Uuid::new_v4());
        let set = permissions(vec![CalculatedPermissionsItem::new(
            PermissionScope::Individual,
            "g1",
            ["view group_node:article relationship"],
            false,
        )]);
        let mut data = Dataset::new();
        insert(&mut data, "r1", "g1", "group_node:article", None);
        insert(&mut data, "r2", "g1", "group_membership", None);
        insert(&mut data, "r3", "g2", "group_node:article", None);

        let registry = registry();
        let mut query = SelectQuery::new(relationships::TABLE, "gr");
        RelationshipQueryAlter::new(&set, &account, &registry)
            .alter(&mut query, Operation::View)
            .unwrap();
        assert_eq!(listed(&query, &data), vec!["r1"]);
        assert!(query.metadata().has_tag("group_relationship_list:plugin:group_node:article"));
    }

    #[test]
    fn own_grant_is_limited_to_owned_relationships() {
        let account = Account::authenticated(Uuid::new_v4());
        let owner = account.entity_id();
        let set = permissions(vec![CalculatedPermissionsItem::new(
            PermissionScope::Individual,
            "g1",
            ["update own group_membership relationship"],
            false,
        )]);
        let mut data = Dataset::new();
        insert(&mut data, "mine", "g1", "group_membership", owner.as_deref());
        insert(&mut data, "theirs", "g1", "group_membership", Some("other"));

        let registry = registry();
        let mut query = SelectQuery::new(relationships::TABLE, "gr");
        RelationshipQueryAlter::new(&set, &account, &registry)
            .alter(&mut query, Operation::Update)
            .unwrap();
        assert_eq!(listed(&query, &data), vec!["mine"]);
    }

    #[test]
    fn plugin_admin_permission_grants_any() {
        let account = Account::authenticated(Uuid::new_v4());
        let set = permissions(vec![CalculatedPermissionsItem::new(
            PermissionScope::Individual,
            "g1",
            ["administer members"],
            false,
        )]);
        let mut data = Dataset::new();
        insert(&mut data, "m1", "g1", "group_membership", Some("other"));

        let registry = registry();
        let mut query = SelectQuery::new(relationships::TABLE, "gr");
        RelationshipQueryAlter::new(&set, &account, &registry)
            .alter(&mut query, Operation::Delete)
            .unwrap();
        assert_eq!(listed(&query, &data), vec!["m1"]);
    }

    #[test]
    fn no_grants_forces_empty_result() {
        let account = Account::anonymous();
        let registry = registry();
        let mut query = SelectQuery::new(relationships::TABLE, "gr");
        RelationshipQueryAlter::new(&CalculatedPermissions::default(), &account, &registry)
            .alter(&mut query, Operation::View)
            .unwrap();
        assert!(query.is_always_false());
    }
}
