//! Integration tests for listing query execution using in-memory
//! SurrealDB.

use groupward_core::models::group::CreateGroup;
use groupward_core::models::group_type::CreateGroupType;
use groupward_core::models::relationship::{CreateRelationship, MEMBERSHIP_PLUGIN_ID};
use groupward_core::query::{Column, Condition, ConditionGroup, Join, SelectQuery};
use groupward_core::repository::{GroupRepository, GroupTypeRepository, RelationshipRepository};
use groupward_core::schema::{groups, relationships};
use groupward_db::list_ids;
use groupward_db::repository::{
    SurrealGroupRepository, SurrealGroupTypeRepository, SurrealRelationshipRepository,
};
use surrealdb::Surreal;
use surrealdb::engine::local::{Db, Mem};
use uuid::Uuid;

struct Fixture {
    db: Surreal<Db>,
    account: Uuid,
    member_of: Uuid,
    outside: Uuid,
    other_type: Uuid,
}

/// Two `club` groups (the account is a member of one) and one `team`
/// group.
async fn setup() -> Fixture {
    let db = Surreal::new::<Mem>(()).await.unwrap();
    db.use_ns("test").use_db("test").await.unwrap();
    groupward_db::run_migrations(&db).await.unwrap();

    let types = SurrealGroupTypeRepository::new(db.clone());
    types.create(CreateGroupType::new("club", "Club")).await.unwrap();
    types.create(CreateGroupType::new("team", "Team")).await.unwrap();

    let groups = SurrealGroupRepository::new(db.clone());
    let member_of = groups.create(CreateGroup::new("club", "Chess")).await.unwrap();
    let outside = groups.create(CreateGroup::new("club", "Go")).await.unwrap();
    let other_type = groups.create(CreateGroup::new("team", "Rowing")).await.unwrap();

    let account = Uuid::new_v4();
    SurrealRelationshipRepository::new(db.clone())
        .create(CreateRelationship {
            group_id: member_of.id,
            group_type_id: "club".into(),
            plugin_id: MEMBERSHIP_PLUGIN_ID.into(),
            entity_type_id: "user".into(),
            entity_id: account.to_string(),
            status: true,
            owner_id: Some(account),
            group_roles: Vec::new(),
        })
        .await
        .unwrap();

    Fixture {
        db,
        account,
        member_of: member_of.id,
        outside: outside.id,
        other_type: other_type.id,
    }
}

fn with_membership(query: &mut SelectQuery, account: Uuid) -> String {
    let group_id = query.column(groups::ID);
    query.ensure_join("m", || {
        Join::new(
            "m",
            relationships::TABLE,
            ConditionGroup::and()
                .with(Condition::columns_eq(
                    Column::new("m", relationships::GROUP),
                    group_id,
                ))
                .with(Condition::eq(
                    Column::new("m", relationships::PLUGIN),
                    MEMBERSHIP_PLUGIN_ID,
                ))
                .with(Condition::eq(
                    Column::new("m", relationships::ENTITY),
                    account.to_string(),
                )),
        )
    })
}

fn sorted(mut ids: Vec<String>) -> Vec<String> {
    ids.sort();
    ids
}

#[tokio::test]
async fn unfiltered_listing_returns_every_group() {
    let fixture = setup().await;
    let query = SelectQuery::new(groups::TABLE, "g");
    let ids = list_ids(&fixture.db, &query).await.unwrap();
    assert_eq!(ids.len(), 3);
}

#[tokio::test]
async fn exists_selects_groups_the_account_belongs_to() {
    let fixture = setup().await;
    let mut query = SelectQuery::new(groups::TABLE, "g");
    let alias = with_membership(&mut query, fixture.account);
    query.condition(Condition::exists(alias, ConditionGroup::and()));

    let ids = list_ids(&fixture.db, &query).await.unwrap();
    assert_eq!(ids, vec![fixture.member_of.to_string()]);
}

#[tokio::test]
async fn outsider_condition_excludes_member_groups() {
    let fixture = setup().await;
    let mut query = SelectQuery::new(groups::TABLE, "g");
    let alias = with_membership(&mut query, fixture.account);
    let group_type = query.column(groups::TYPE);
    query
        .condition(Condition::in_list(group_type, ["club"]))
        .condition(Condition::not_exists(alias, ConditionGroup::and()));

    let ids = list_ids(&fixture.db, &query).await.unwrap();
    assert_eq!(ids, vec![fixture.outside.to_string()]);
}

#[tokio::test]
async fn or_group_combines_scopes() {
    let fixture = setup().await;
    let mut query = SelectQuery::new(groups::TABLE, "g");
    let group_id = query.column(groups::ID);
    let group_type = query.column(groups::TYPE);
    query.condition(Condition::Group(
        ConditionGroup::or()
            .with(Condition::in_list(group_id, [fixture.member_of.to_string()]))
            .with(Condition::eq(group_type, "team")),
    ));

    let ids = list_ids(&fixture.db, &query).await.unwrap();
    assert_eq!(
        sorted(ids),
        sorted(vec![
            fixture.member_of.to_string(),
            fixture.other_type.to_string()
        ])
    );
}

#[tokio::test]
async fn always_false_lists_nothing() {
    let fixture = setup().await;
    let mut query = SelectQuery::new(groups::TABLE, "g");
    query.always_false();
    assert!(list_ids(&fixture.db, &query).await.unwrap().is_empty());
}
