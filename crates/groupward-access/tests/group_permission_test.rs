//! Integration tests for group permission calculation, checks and
//! listing alteration against in-memory SurrealDB.

use std::sync::Arc;

use groupward_access::access::GroupedEntityAccess;
use groupward_access::cache_context::{group_membership_context, group_permissions_context};
use groupward_access::calculator::RepositoryPermissionSource;
use groupward_access::permission::permissions_hash;
use groupward_access::relation::RelationTypeDefinition;
use groupward_access::{
    AccessConfig, ChainPermissionCalculator, GroupPermissionChecker, Operation, PermissionCache,
    QueryAccess, RelationTypeRegistry, RelationshipManager,
};
use groupward_core::cache::CacheTagInvalidator;
use groupward_core::error::GroupError;
use groupward_core::models::account::Account;
use groupward_core::models::entity::{EntityRef, EntityTypeDefinition};
use groupward_core::models::group::{CreateGroup, Group};
use groupward_core::models::group_role::CreateGroupRole;
use groupward_core::models::group_type::CreateGroupType;
use groupward_core::models::relationship::{RelationshipValues, UpdateRelationship};
use groupward_core::query::SelectQuery;
use groupward_core::repository::{
    GroupRepository, GroupRoleRepository, GroupTypeRepository, Pagination, RelationshipRepository,
};
use groupward_db::list_ids;
use groupward_db::repository::{
    SurrealGroupRepository, SurrealGroupRoleRepository, SurrealGroupTypeRepository,
    SurrealRelationshipRepository,
};
use surrealdb::Surreal;
use surrealdb::engine::local::{Db, Mem};
use uuid::Uuid;

type Relationships = SurrealRelationshipRepository<Db>;
type Source = RepositoryPermissionSource<
    SurrealGroupTypeRepository<Db>,
    SurrealGroupRoleRepository<Db>,
    Relationships,
>;

const ARTICLE_PLUGIN: &str = "group_node:article";
const DOC_PLUGIN: &str = "group_doc";

struct Stack {
    db: Surreal<Db>,
    roles: SurrealGroupRoleRepository<Db>,
    relationships: Relationships,
    manager: RelationshipManager<SurrealGroupRepository<Db>, SurrealGroupTypeRepository<Db>, Relationships>,
    chain: Arc<ChainPermissionCalculator<Source>>,
    checker: Arc<GroupPermissionChecker<Source, Relationships>>,
    registry: Arc<RelationTypeRegistry>,
}

fn registry() -> RelationTypeRegistry {
    let mut registry = RelationTypeRegistry::with_builtins().unwrap();
    registry.register_entity_type(
        EntityTypeDefinition::new("node", "node")
            .with_bundle_key("type")
            .with_owner_key("uid")
            .with_status_key("status"),
    );
    registry.register_entity_type(EntityTypeDefinition::new("doc", "doc"));
    registry
        .register(
            RelationTypeDefinition::new(ARTICLE_PLUGIN, "node")
                .with_bundle("article")
                .with_entity_access(),
        )
        .unwrap();
    registry
        .register(RelationTypeDefinition::new(DOC_PLUGIN, "doc").with_entity_access())
        .unwrap();
    registry
}

/// Helper: in-memory DB with the `club` group type, an `club-editor`
/// individual role and the article and doc plugins installed.
async fn setup() -> Stack {
    let db = Surreal::new::<Mem>(()).await.unwrap();
    db.use_ns("test").use_db("test").await.unwrap();
    groupward_db::run_migrations(&db).await.unwrap();

    let cache = Arc::new(PermissionCache::default());
    let invalidator: Arc<dyn CacheTagInvalidator> = cache.clone();
    let relationships =
        SurrealRelationshipRepository::new(db.clone()).with_invalidator(invalidator.clone());
    let roles = SurrealGroupRoleRepository::new(db.clone()).with_invalidator(invalidator.clone());
    let types = SurrealGroupTypeRepository::new(db.clone())
        .with_invalidator(invalidator.clone())
        .with_relationships(relationships.clone());
    let groups = SurrealGroupRepository::new(db.clone())
        .with_invalidator(invalidator)
        .with_relationships(relationships.clone());

    types.create(CreateGroupType::new("club", "Club")).await.unwrap();
    types.install_plugin("club", ARTICLE_PLUGIN).await.unwrap();
    types.install_plugin("club", DOC_PLUGIN).await.unwrap();
    roles
        .create(CreateGroupRole::individual("club-editor", "club", "Editor"))
        .await
        .unwrap();

    let registry = Arc::new(registry());
    let source = RepositoryPermissionSource::new(types.clone(), roles.clone(), relationships.clone());
    let chain = Arc::new(ChainPermissionCalculator::new(
        source,
        cache,
        AccessConfig::default(),
    ));
    let checker = Arc::new(GroupPermissionChecker::new(chain.clone(), relationships.clone()));
    let manager = RelationshipManager::new(groups, types, relationships.clone(), registry.clone());

    Stack {
        db,
        roles,
        relationships,
        manager,
        chain,
        checker,
        registry,
    }
}

async fn group(stack: &Stack, label: &str) -> Group {
    stack
        .manager
        .create_group(CreateGroup::new("club", label), &Account::anonymous())
        .await
        .unwrap()
}

async fn grant(stack: &Stack, role_id: &str, permissions: &[&str]) {
    let permissions: Vec<String> = permissions.iter().map(|p| p.to_string()).collect();
    stack.roles.grant_permissions(role_id, &permissions).await.unwrap();
}

async fn listed(
    access: &QueryAccess<Source>,
    db: &Surreal<Db>,
    entity_type: &str,
    account: &Account,
) -> Vec<String> {
    let mut query = SelectQuery::new(entity_type, "e");
    access
        .alter_query(&mut query, entity_type, Operation::View, account)
        .await
        .unwrap();
    let mut ids = list_ids(db, &query).await.unwrap();
    ids.sort();
    ids
}

#[tokio::test]
async fn member_role_grant_and_revoke_change_the_answer() {
    let stack = setup().await;
    let group = group(&stack, "Chess").await;
    let account = Account::authenticated(Uuid::new_v4());
    stack
        .manager
        .add_member(&group, account.id.unwrap(), vec!["club-editor".into()])
        .await
        .unwrap();

    assert!(
        !stack
            .checker
            .has_permission_in_group("edit group", &account, &group)
            .await
            .unwrap()
    );

    grant(&stack, "club-editor", &["edit group"]).await;
    assert!(
        stack
            .checker
            .has_permission_in_group("edit group", &account, &group)
            .await
            .unwrap()
    );

    stack
        .roles
        .revoke_permissions("club-editor", &["edit group".into()])
        .await
        .unwrap();
    assert!(
        !stack
            .checker
            .has_permission_in_group("edit group", &account, &group)
            .await
            .unwrap()
    );
}

#[tokio::test]
async fn anonymous_role_grants_apply_to_anonymous_accounts() {
    let stack = setup().await;
    let group = group(&stack, "Chess").await;
    grant(&stack, "club-anonymous", &["view group"]).await;

    let anonymous = Account::anonymous();
    let authenticated = Account::authenticated(Uuid::new_v4());
    assert!(
        stack
            .checker
            .has_permission_in_group("view group", &anonymous, &group)
            .await
            .unwrap()
    );
    assert!(
        !stack
            .checker
            .has_permission_in_group("view group", &authenticated, &group)
            .await
            .unwrap()
    );
}

#[tokio::test]
async fn outsider_grants_stop_at_membership() {
    let stack = setup().await;
    let group = group(&stack, "Chess").await;
    grant(&stack, "club-outsider", &["join group"]).await;
    let account = Account::authenticated(Uuid::new_v4());

    assert!(
        stack
            .checker
            .has_permission_in_group("join group", &account, &group)
            .await
            .unwrap()
    );

    stack
        .manager
        .add_member(&group, account.id.unwrap(), Vec::new())
        .await
        .unwrap();
    assert!(
        !stack
            .checker
            .has_permission_in_group("join group", &account, &group)
            .await
            .unwrap()
    );
}

#[tokio::test]
async fn insider_grants_apply_only_to_members() {
    let stack = setup().await;
    let joined = group(&stack, "Chess").await;
    let other = group(&stack, "Go").await;
    grant(&stack, "club-member", &["leave group"]).await;
    let account = Account::authenticated(Uuid::new_v4());
    stack
        .manager
        .add_member(&joined, account.id.unwrap(), Vec::new())
        .await
        .unwrap();

    assert!(
        stack
            .checker
            .has_permission_in_group("leave group", &account, &joined)
            .await
            .unwrap()
    );
    assert!(
        !stack
            .checker
            .has_permission_in_group("leave group", &account, &other)
            .await
            .unwrap()
    );
}

#[tokio::test]
async fn repeated_calculation_is_stable() {
    let stack = setup().await;
    let group = group(&stack, "Chess").await;
    grant(&stack, "club-outsider", &["view group"]).await;
    let account = Account::authenticated(Uuid::new_v4());

    let first = stack.chain.calculate_permissions(&account).await.unwrap();
    let second = stack.chain.calculate_permissions(&account).await.unwrap();
    assert_eq!(permissions_hash(&first), permissions_hash(&second));
    assert!(Arc::ptr_eq(&first, &second));
    assert!(
        stack
            .checker
            .has_permission_in_group("view group", &account, &group)
            .await
            .unwrap()
    );
}

#[tokio::test]
async fn account_without_grants_has_nothing() {
    let stack = setup().await;
    let group = group(&stack, "Chess").await;
    let account = Account::authenticated(Uuid::new_v4());

    let permissions = stack.chain.calculate_permissions(&account).await.unwrap();
    assert!(!permissions.is_global_admin());
    for permission in ["view group", "edit group", "delete group", "join group"] {
        assert!(
            !stack
                .checker
                .has_permission_in_group(permission, &account, &group)
                .await
                .unwrap()
        );
    }
}

#[tokio::test]
async fn deleted_role_on_a_membership_grants_nothing() {
    let stack = setup().await;
    let group = group(&stack, "Chess").await;
    stack
        .roles
        .create(
            CreateGroupRole::individual("club-moderator", "club", "Moderator")
                .with_permissions(["edit group"]),
        )
        .await
        .unwrap();
    let account = Account::authenticated(Uuid::new_v4());
    stack
        .manager
        .add_member(&group, account.id.unwrap(), vec!["club-moderator".into()])
        .await
        .unwrap();
    assert!(
        stack
            .checker
            .has_permission_in_group("edit group", &account, &group)
            .await
            .unwrap()
    );

    stack.roles.delete("club-moderator").await.unwrap();
    assert!(
        !stack
            .checker
            .has_permission_in_group("edit group", &account, &group)
            .await
            .unwrap()
    );
}

#[tokio::test]
async fn bypass_permission_short_circuits_listing() {
    let stack = setup().await;
    group(&stack, "Chess").await;
    let access = QueryAccess::new(stack.chain.clone(), stack.registry.clone());
    let account = Account::authenticated(Uuid::new_v4()).with_permission("bypass group access");

    let mut query = SelectQuery::new("groups", "g");
    access
        .alter_query(&mut query, "group", Operation::View, &account)
        .await
        .unwrap();
    assert!(query.conditions().is_empty());
    assert_eq!(list_ids(&stack.db, &query).await.unwrap().len(), 1);
}

#[tokio::test]
async fn group_listing_follows_outsider_and_member_grants() {
    let stack = setup().await;
    let joined = group(&stack, "Chess").await;
    let outside = group(&stack, "Go").await;
    grant(&stack, "club-member", &["view group"]).await;
    let account = Account::authenticated(Uuid::new_v4());
    stack
        .manager
        .add_member(&joined, account.id.unwrap(), Vec::new())
        .await
        .unwrap();
    let access = QueryAccess::new(stack.chain.clone(), stack.registry.clone());

    let mut query = SelectQuery::new("groups", "g");
    access
        .alter_query(&mut query, "group", Operation::View, &account)
        .await
        .unwrap();
    assert_eq!(
        list_ids(&stack.db, &query).await.unwrap(),
        vec![joined.id.to_string()]
    );

    grant(&stack, "club-outsider", &["view group"]).await;
    let mut query = SelectQuery::new("groups", "g");
    access
        .alter_query(&mut query, "group", Operation::View, &account)
        .await
        .unwrap();
    let mut ids = list_ids(&stack.db, &query).await.unwrap();
    ids.sort();
    let mut expected = vec![joined.id.to_string(), outside.id.to_string()];
    expected.sort();
    assert_eq!(ids, expected);
}

#[tokio::test]
async fn grouped_node_visibility_follows_relationship_status() {
    let stack = setup().await;
    let group = group(&stack, "Chess").await;
    grant(&stack, "club-member", &["view group_node:article entity"]).await;
    let member = Account::authenticated(Uuid::new_v4());
    stack
        .manager
        .add_member(&group, member.id.unwrap(), Vec::new())
        .await
        .unwrap();
    let stranger = Account::authenticated(Uuid::new_v4());

    stack
        .db
        .query(
            "CREATE node:published SET type = 'article'; \
             CREATE node:draft SET type = 'article'; \
             CREATE node:loose SET type = 'article';",
        )
        .await
        .unwrap()
        .check()
        .unwrap();
    let published_relationship = stack
        .manager
        .add_relationship(
            &group,
            ARTICLE_PLUGIN,
            &EntityRef::new("node", "published").with_bundle("article"),
            RelationshipValues::default(),
        )
        .await
        .unwrap();
    stack
        .manager
        .add_relationship(
            &group,
            ARTICLE_PLUGIN,
            &EntityRef::new("node", "draft").with_bundle("article"),
            RelationshipValues {
                status: Some(false),
                ..RelationshipValues::default()
            },
        )
        .await
        .unwrap();

    let access = QueryAccess::new(stack.chain.clone(), stack.registry.clone());
    assert_eq!(listed(&access, &stack.db, "node", &member).await, vec!["loose", "published"]);
    assert_eq!(listed(&access, &stack.db, "node", &stranger).await, vec!["loose"]);

    let entity_access = GroupedEntityAccess::new(stack.checker.clone(), stack.registry.clone());
    let published = EntityRef::new("node", "published").with_bundle("article");
    assert!(
        entity_access
            .entity_access(&published, Operation::View, &member)
            .await
            .unwrap()
            .is_allowed()
    );
    assert!(
        entity_access
            .entity_access(&published, Operation::View, &stranger)
            .await
            .unwrap()
            .is_forbidden()
    );
    let loose = EntityRef::new("node", "loose");
    assert!(
        entity_access
            .entity_access(&loose, Operation::View, &stranger)
            .await
            .unwrap()
            .is_neutral()
    );

    stack
        .relationships
        .update(
            published_relationship.id,
            UpdateRelationship {
                status: Some(false),
                ..UpdateRelationship::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(listed(&access, &stack.db, "node", &member).await, vec!["loose"]);
    assert!(
        entity_access
            .entity_access(&published, Operation::View, &member)
            .await
            .unwrap()
            .is_forbidden()
    );
}

#[tokio::test]
async fn listing_agrees_with_entity_access_for_types_without_status() {
    let stack = setup().await;
    let group = group(&stack, "Chess").await;
    grant(&stack, "club-member", &["view group_doc entity"]).await;
    let member = Account::authenticated(Uuid::new_v4());
    stack
        .manager
        .add_member(&group, member.id.unwrap(), Vec::new())
        .await
        .unwrap();

    stack
        .db
        .query("CREATE doc:minutes SET title = 'Minutes'")
        .await
        .unwrap()
        .check()
        .unwrap();
    let minutes = EntityRef::new("doc", "minutes").unpublished();
    let relationship = stack
        .manager
        .add_relationship(&group, DOC_PLUGIN, &minutes, RelationshipValues::default())
        .await
        .unwrap();
    assert!(!relationship.status);

    let access = QueryAccess::new(stack.chain.clone(), stack.registry.clone());
    let entity_access = GroupedEntityAccess::new(stack.checker.clone(), stack.registry.clone());
    assert!(listed(&access, &stack.db, "doc", &member).await.is_empty());
    assert!(
        !entity_access
            .entity_access(&minutes, Operation::View, &member)
            .await
            .unwrap()
            .is_allowed()
    );

    stack
        .relationships
        .update(
            relationship.id,
            UpdateRelationship {
                status: Some(true),
                ..UpdateRelationship::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(listed(&access, &stack.db, "doc", &member).await, vec!["minutes"]);
    assert!(
        entity_access
            .entity_access(&minutes, Operation::View, &member)
            .await
            .unwrap()
            .is_allowed()
    );
}

#[tokio::test]
async fn adding_a_member_twice_violates_cardinality() {
    let stack = setup().await;
    let group = group(&stack, "Chess").await;
    let account_id = Uuid::new_v4();
    stack
        .manager
        .add_member(&group, account_id, Vec::new())
        .await
        .unwrap();

    let err = stack
        .manager
        .add_member(&group, account_id, Vec::new())
        .await
        .unwrap_err();
    assert!(matches!(err, GroupError::Cardinality { limit: 1, .. }));
}

#[tokio::test]
async fn creator_becomes_member_with_creator_roles() {
    let stack = setup().await;
    let creator = Account::authenticated(Uuid::new_v4());

    let group = stack
        .manager
        .create_group(CreateGroup::new("club", "Chess"), &creator)
        .await
        .unwrap();
    assert_eq!(group.owner_id, creator.id);
    let membership = stack
        .manager
        .get_member(&group, creator.id.unwrap())
        .await
        .unwrap();
    assert!(membership.is_some());

    assert!(stack.manager.remove_member(&group, creator.id.unwrap()).await.unwrap());
    assert!(!stack.manager.remove_member(&group, creator.id.unwrap()).await.unwrap());
}

#[tokio::test]
async fn roles_on_content_relationships_are_rejected() {
    let stack = setup().await;
    let group = group(&stack, "Chess").await;

    let err = stack
        .manager
        .add_relationship(
            &group,
            ARTICLE_PLUGIN,
            &EntityRef::new("node", "n1").with_bundle("article"),
            RelationshipValues {
                group_roles: vec!["club-editor".into()],
                ..RelationshipValues::default()
            },
        )
        .await
        .unwrap_err();
    assert!(matches!(err, GroupError::Validation { .. }));

    let err = stack
        .manager
        .add_relationship(
            &group,
            ARTICLE_PLUGIN,
            &EntityRef::unsaved("node").with_bundle("article"),
            RelationshipValues::default(),
        )
        .await
        .unwrap_err();
    assert!(matches!(err, GroupError::Storage(_)));
}

#[tokio::test]
async fn cache_contexts_follow_effective_grants() {
    let stack = setup().await;
    let group = group(&stack, "Chess").await;
    grant(&stack, "club-outsider", &["view group"]).await;
    let alice = Account::authenticated(Uuid::new_v4());
    let bob = Account::authenticated(Uuid::new_v4());

    assert_eq!(
        group_permissions_context(&stack.chain, &alice).await.unwrap(),
        group_permissions_context(&stack.chain, &bob).await.unwrap()
    );
    assert_eq!(
        group_membership_context(&stack.checker, &alice, &group).await.unwrap(),
        "club-outsider"
    );

    stack
        .manager
        .add_member(&group, alice.id.unwrap(), Vec::new())
        .await
        .unwrap();
    assert_ne!(
        group_permissions_context(&stack.chain, &alice).await.unwrap(),
        group_permissions_context(&stack.chain, &bob).await.unwrap()
    );
    assert_eq!(
        group_membership_context(&stack.checker, &alice, &group).await.unwrap(),
        "club-member"
    );
}

#[tokio::test]
async fn failed_creator_membership_removes_the_group() {
    let db = Surreal::new::<Mem>(()).await.unwrap();
    db.use_ns("test").use_db("test").await.unwrap();
    groupward_db::run_migrations(&db).await.unwrap();

    let relationships = SurrealRelationshipRepository::new(db.clone());
    let types = SurrealGroupTypeRepository::new(db.clone()).with_relationships(relationships.clone());
    let groups = SurrealGroupRepository::new(db.clone()).with_relationships(relationships.clone());
    types.create(CreateGroupType::new("club", "Club")).await.unwrap();

    // No membership plugin registered, so the creator cannot be added.
    let manager = RelationshipManager::new(
        groups.clone(),
        types,
        relationships,
        Arc::new(RelationTypeRegistry::new()),
    );
    let creator = Account::authenticated(Uuid::new_v4());
    let err = manager
        .create_group(CreateGroup::new("club", "Chess"), &creator)
        .await
        .unwrap_err();
    assert!(matches!(err, GroupError::UnknownPlugin(_)));

    let listed = groups.list(Pagination::default()).await.unwrap();
    assert_eq!(listed.total, 0);
    assert!(listed.items.is_empty());
}
