//! Integration tests for group route access against in-memory SurrealDB.

use std::sync::Arc;

use groupward_access::calculator::RepositoryPermissionSource;
use groupward_access::relation::RelationTypeDefinition;
use groupward_access::route::{RouteAccessChecker, RouteDecision, RouteParams, RouteTable};
use groupward_access::{
    AccessConfig, ChainPermissionCalculator, GroupPermissionChecker, PermissionCache,
    RelationTypeRegistry, RelationshipManager,
};
use groupward_core::cache::CacheTagInvalidator;
use groupward_core::error::GroupError;
use groupward_core::models::account::Account;
use groupward_core::models::entity::EntityTypeDefinition;
use groupward_core::models::group::{CreateGroup, Group};
use groupward_core::models::group_type::CreateGroupType;
use groupward_core::repository::{GroupRoleRepository, GroupTypeRepository};
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
type Routes = RouteAccessChecker<
    Source,
    SurrealGroupRepository<Db>,
    SurrealGroupTypeRepository<Db>,
    Relationships,
>;

struct Stack {
    roles: SurrealGroupRoleRepository<Db>,
    routes: Routes,
    group: Group,
}

/// Spin up in-memory DB with the `club` type, the article plugin
/// registered and installed, and one group created anonymously.
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
    let groups = SurrealGroupRepository::new(db)
        .with_invalidator(invalidator)
        .with_relationships(relationships.clone());

    let mut registry = RelationTypeRegistry::with_builtins().unwrap();
    registry.register_entity_type(EntityTypeDefinition::new("node", "node").with_bundle_key("type"));
    registry
        .register(
            RelationTypeDefinition::new("group_node:article", "node")
                .with_bundle("article")
                .with_entity_access(),
        )
        .unwrap();
    let registry = Arc::new(registry);

    types.create(CreateGroupType::new("club", "Club")).await.unwrap();
    types.install_plugin("club", "group_node:article").await.unwrap();

    let chain = Arc::new(ChainPermissionCalculator::new(
        RepositoryPermissionSource::new(types.clone(), roles.clone(), relationships.clone()),
        cache,
        AccessConfig::default(),
    ));
    let checker = Arc::new(GroupPermissionChecker::new(chain, relationships.clone()));

    let manager = RelationshipManager::new(
        groups.clone(),
        types.clone(),
        relationships,
        registry.clone(),
    );
    let group = manager
        .create_group(CreateGroup::new("club", "Chess"), &Account::anonymous())
        .await
        .unwrap();

    Stack {
        roles,
        routes: RouteAccessChecker::new(RouteTable::group_routes(), groups, types, checker, registry),
        group,
    }
}

fn params(group: &Group) -> RouteParams {
    RouteParams::group(group.id.to_string())
}

#[tokio::test]
async fn join_route_needs_permission_and_no_membership() {
    let stack = setup().await;
    let account = Account::authenticated(Uuid::new_v4());

    let decision = stack
        .routes
        .check("entity.group.join", &params(&stack.group), &account)
        .await
        .unwrap();
    assert_eq!(decision.status(), 403);

    stack
        .roles
        .grant_permissions("club-outsider", &["join group".into()])
        .await
        .unwrap();
    let decision = stack
        .routes
        .check("entity.group.join", &params(&stack.group), &account)
        .await
        .unwrap();
    assert!(matches!(decision, RouteDecision::Allowed(ref group) if group.id == stack.group.id));
}

#[tokio::test]
async fn missing_or_malformed_group_is_not_found() {
    let stack = setup().await;
    let account = Account::authenticated(Uuid::new_v4());

    for raw in [Uuid::new_v4().to_string(), "not-a-uuid".to_string()] {
        let decision = stack
            .routes
            .check("entity.group.join", &RouteParams::group(raw), &account)
            .await
            .unwrap();
        assert_eq!(decision.status(), 404);
    }
}

#[tokio::test]
async fn unknown_route_is_an_error() {
    let stack = setup().await;
    let err = stack
        .routes
        .check("entity.group.nope", &params(&stack.group), &Account::anonymous())
        .await
        .unwrap_err();
    assert!(matches!(err, GroupError::NotFound { .. }));
}

#[tokio::test]
async fn members_route_accepts_either_permission() {
    let stack = setup().await;
    let account = Account::authenticated(Uuid::new_v4());
    let params = params(&stack.group);
    let check = || stack.routes.check("view.group_members", &params, &account);
    assert_eq!(check().await.unwrap().status(), 403);

    stack
        .roles
        .grant_permissions(
            "club-outsider",
            &["view group_membership relationship".into()],
        )
        .await
        .unwrap();
    assert_eq!(check().await.unwrap().status(), 200);
}

#[tokio::test]
async fn add_form_for_uninstalled_plugin_is_not_found() {
    let stack = setup().await;
    stack
        .roles
        .grant_permissions("club-outsider", &["administer group_node:article".into()])
        .await
        .unwrap();
    let account = Account::authenticated(Uuid::new_v4());

    let decision = stack
        .routes
        .check(
            "entity.group_relationship.add_form",
            &params(&stack.group).with_plugin("group_node:page"),
            &account,
        )
        .await
        .unwrap();
    assert_eq!(decision.status(), 404);
}

#[tokio::test]
async fn create_page_allows_when_any_plugin_allows() {
    let stack = setup().await;
    let account = Account::authenticated(Uuid::new_v4());
    let params = params(&stack.group);
    let check = |route: &'static str| stack.routes.check(route, &params, &account);
    assert_eq!(
        check("entity.group_relationship.create_page").await.unwrap().status(),
        403
    );

    stack
        .roles
        .grant_permissions("club-outsider", &["create group_node:article entity".into()])
        .await
        .unwrap();
    assert_eq!(
        check("entity.group_relationship.create_page").await.unwrap().status(),
        200
    );
    assert_eq!(
        check("entity.group_relationship.add_page").await.unwrap().status(),
        403
    );
}
