use groupward_core::error::GroupResult;
use groupward_core::models::account::Account;
use groupward_core::models::entity::EntityTypeDefinition;
use groupward_core::models::relationship::plugin_list_cache_tag;
use groupward_core::query::{Column, Condition, ConditionGroup, Join, SelectQuery};
use groupward_core::schema::relationships;

use super::scoped::{BucketPermissions, Buckets, ScopeColumns, ScopedConditions};
use crate::permission::CalculatedPermissions;
use crate::relation::{Operation, Ownership, PermissionProvider, PermissionTarget, RelationTypeRegistry};

/// Alias of the relationships grouping a listed host entity.
pub const GROUPED_ALIAS: &str = "grouped";

/// Restricts a listing of host entities that relation plugins can group.
///
/// Entities in no group always pass. Grouped entities pass when at least
/// one relationship grouping them sits in a group granting the operation,
/// with publication state and ownership read from that relationship.
/// An unpublished relationship needs the "view unpublished" grant even
/// when the entity type has no status of its own, so such rows only pass
/// for plugin admins.
pub struct EntityQueryAlter<'a> {
    permissions: &'a CalculatedPermissions,
    account: &'a Account,
    registry: &'a RelationTypeRegistry,
    entity_type: &'a EntityTypeDefinition,
}

impl<'a> EntityQueryAlter<'a> {
    pub fn new(
        permissions: &'a CalculatedPermissions,
        account: &'a Account,
        registry: &'a RelationTypeRegistry,
        entity_type: &'a EntityTypeDefinition,
    ) -> Self {
        Self {
            permissions,
            account,
            registry,
            entity_type,
        }
    }

    fn wanted(
        provider: &dyn PermissionProvider,
        operation: Operation,
    ) -> BucketPermissions {
        BucketPermissions::new(
            [
                provider.permission(operation, PermissionTarget::Entity, Ownership::Any),
                provider.admin_permission(),
            ],
            provider.permission(operation, PermissionTarget::Entity, Ownership::Own),
        )
    }

    pub fn alter(&self, query: &mut SelectQuery, operation: Operation) -> GroupResult<()> {
        let plugin_ids = self
            .registry
            .plugin_ids_by_entity_type_access(&self.entity_type.id);
        if plugin_ids.is_empty() {
            return Ok(());
        }
        query
            .metadata_mut()
            .add_cache_tags(plugin_ids.iter().map(|id| plugin_list_cache_tag(id)))
            .merge(self.permissions.metadata());
        if self.permissions.is_global_admin() {
            return Ok(());
        }

        let entity_id = query.column(&self.entity_type.id_key);
        let grouped = query.ensure_join(GROUPED_ALIAS, || {
            Join::new(
                GROUPED_ALIAS,
                relationships::TABLE,
                ConditionGroup::and()
                    .with(Condition::columns_eq(
                        Column::new(GROUPED_ALIAS, relationships::ENTITY),
                        entity_id,
                    ))
                    .with(Condition::in_list(
                        Column::new(GROUPED_ALIAS, relationships::PLUGIN),
                        plugin_ids.iter(),
                    )),
            )
        });

        let column = |name: &str| Column::new(grouped.clone(), name);
        let columns = ScopeColumns {
            group_id: column(relationships::GROUP),
            group_type: column(relationships::GROUP_TYPE),
            owner: column(relationships::OWNER),
            status: Some(column(relationships::STATUS)),
        };
        let plugin_column = column(relationships::PLUGIN);

        let mut per_plugin = ConditionGroup::or();
        let mut scoped = ScopedConditions::new(query, self.account, self.permissions, columns);
        for plugin_id in &plugin_ids {
            let provider = self.registry.permission_provider(plugin_id)?;
            let granted = match operation {
                Operation::View => {
                    let published = Buckets::collect(
                        self.permissions,
                        &Self::wanted(provider, Operation::View),
                    );
                    let unpublished = Buckets::collect(
                        self.permissions,
                        &Self::wanted(provider, Operation::ViewUnpublished),
                    );
                    scoped.status_condition(&[(true, published), (false, unpublished)])
                }
                Operation::Update | Operation::Delete => {
                    let buckets =
                        Buckets::collect(self.permissions, &Self::wanted(provider, operation));
                    scoped.bucket_condition(&buckets)
                }
                Operation::ViewUnpublished | Operation::Create => None,
            };
            if let Some(granted) = granted {
                per_plugin.add_group(
                    ConditionGroup::and()
                        .with(Condition::eq(plugin_column.clone(), plugin_id.as_str()))
                        .with(Condition::Group(granted)),
                );
            }
        }
        scoped.finish();

        let mut visible = ConditionGroup::or().with(Condition::not_exists(
            grouped.clone(),
            ConditionGroup::and(),
        ));
        if per_plugin.is_empty() {
            tracing::debug!(
                entity_type = %self.entity_type.id,
                operation = operation.as_str(),
                "no grants for grouped entities, only ungrouped ones remain"
            );
        } else {
            visible.add(Condition::exists(grouped, per_plugin));
        }
        query.condition(Condition::Group(visible));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use groupward_core::query::Value;
    use groupward_core::query::eval::{Dataset, evaluate};
    use uuid::Uuid;

    use super::*;
    use crate::permission::{CalculatedPermissionsItem, PermissionScope, RefinableCalculatedPermissions};
    use crate::relation::RelationTypeDefinition;

    fn node_type() -> EntityTypeDefinition {
        EntityTypeDefinition::new("node", "node")
            .with_bundle_key("type")
            .with_owner_key("uid")
            .with_status_key("status")
    }

    fn registry() -> RelationTypeRegistry {
        let mut registry = RelationTypeRegistry::with_builtins().unwrap();
        registry.register_entity_type(node_type());
        registry
            .register(
                RelationTypeDefinition::new("group_node:article", "node")
                    .with_bundle("article")
                    .with_entity_access(),
            )
            .unwrap();
        registry
    }

    fn member_of(group: &str, perms: &[&str]) -> CalculatedPermissions {
        let mut refinable = RefinableCalculatedPermissions::new();
        refinable.add_item(CalculatedPermissionsItem::new(
            PermissionScope::Individual,
            group,
            perms.iter().copied(),
            false,
        ));
        refinable.freeze()
    }

    fn dataset(relationship_status: bool) -> Dataset {
        let mut data = Dataset::new();
        for id in ["n1", "n2"] {
            data.insert("node", [("id", Value::from(id)), ("type", Value::from("article"))]);
        }
        data.insert(
            relationships::TABLE,
            [
                (relationships::GROUP, Value::from("g1")),
                (relationships::GROUP_TYPE, Value::from("default")),
                (relationships::PLUGIN, Value::from("group_node:article")),
                (relationships::ENTITY, Value::from("n1")),
                (relationships::STATUS, Value::Bool(relationship_status)),
                (relationships::OWNER, Value::Null),
            ],
        );
        data
    }

    fn listed(query: &SelectQuery, data: &Dataset) -> Vec<String> {
        evaluate(query, data)
            .unwrap()
            .into_iter()
            .filter_map(|row| match row.get("id") {
                Some(Value::Str(id)) => Some(id.clone()),
                _ => None,
            })
            .collect()
    }

    fn alter(permissions: &CalculatedPermissions, operation: Operation) -> SelectQuery {
        let account = Account::authenticated(Uuid::new_v4());
        let registry = registry();
        let entity_type = node_type();
        let mut query = SelectQuery::new("node", "n");
        EntityQueryAlter::new(permissions, &account, &registry, &entity_type)
            .alter(&mut query, operation)
            .unwrap();
        query
    }

    #[test]
    fn grouped_entity_follows_relationship_status() {
        let permissions = member_of("g1", &["view group_node:article entity"]);
        let query = alter(&permissions, Operation::View);
        assert_eq!(listed(&query, &dataset(true)), vec!["n1", "n2"]);
        assert_eq!(listed(&query, &dataset(false)), vec!["n2"]);
    }

    #[test]
    fn unpublished_relationships_hide_entities_without_a_status_key() {
        let mut registry = RelationTypeRegistry::with_builtins().unwrap();
        let doc_type = EntityTypeDefinition::new("doc", "node");
        registry.register_entity_type(doc_type.clone());
        registry
            .register(
                RelationTypeDefinition::new("group_doc", "doc")
                    .with_entity_access()
                    .with_admin_permission(),
            )
            .unwrap();

        let mut data = Dataset::new();
        data.insert("node", [("id", Value::from("n1"))]);
        data.insert(
            relationships::TABLE,
            [
                (relationships::GROUP, Value::from("g1")),
                (relationships::GROUP_TYPE, Value::from("default")),
                (relationships::PLUGIN, Value::from("group_doc")),
                (relationships::ENTITY, Value::from("n1")),
                (relationships::STATUS, Value::Bool(false)),
                (relationships::OWNER, Value::Null),
            ],
        );

        let account = Account::authenticated(Uuid::new_v4());
        let permissions = member_of("g1", &["view group_doc entity"]);
        let mut query = SelectQuery::new("node", "n");
        EntityQueryAlter::new(&permissions, &account, &registry, &doc_type)
            .alter(&mut query, Operation::View)
            .unwrap();
        assert!(listed(&query, &data).is_empty());

        let admin = member_of("g1", &["administer group_doc"]);
        let mut query = SelectQuery::new("node", "n");
        EntityQueryAlter::new(&admin, &account, &registry, &doc_type)
            .alter(&mut query, Operation::View)
            .unwrap();
        assert_eq!(listed(&query, &data), vec!["n1"]);
    }

    #[test]
    fn ungrouped_entities_survive_without_permissions() {
        let query = alter(&CalculatedPermissions::default(), Operation::View);
        assert!(!query.is_always_false());
        assert_eq!(listed(&query, &dataset(true)), vec!["n2"]);
    }

    #[test]
    fn grants_in_other_groups_do_not_apply() {
        let permissions = member_of("g2", &["update any group_node:article entity"]);
        let query = alter(&permissions, Operation::Update);
        assert_eq!(listed(&query, &dataset(true)), vec!["n2"]);
    }

    #[test]
    fn entity_types_without_plugins_are_left_alone() {
        let account = Account::anonymous();
        let registry = registry();
        let entity_type = EntityTypeDefinition::new("comment", "comment");
        let mut query = SelectQuery::new("comment", "c");
        EntityQueryAlter::new(&CalculatedPermissions::default(), &account, &registry, &entity_type)
            .alter(&mut query, Operation::View)
            .unwrap();
        assert!(query.conditions().is_empty());
        assert!(query.joins().is_empty());
    }
}
