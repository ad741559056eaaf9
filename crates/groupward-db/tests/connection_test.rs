//! Integration tests for opening an in-process group store.

use groupward_core::models::group::CreateGroup;
use groupward_core::models::group_type::CreateGroupType;
use groupward_core::repository::{GroupRepository, GroupTypeRepository};
use groupward_db::repository::{SurrealGroupRepository, SurrealGroupTypeRepository};
use groupward_db::{DbConfig, GroupStore, StoreSummary};

#[tokio::test]
async fn opening_a_store_applies_migrations() {
    let store = GroupStore::open(&DbConfig::in_memory()).await.unwrap();

    let mut result = store
        .client()
        .query("SELECT VALUE name FROM _migration")
        .await
        .unwrap();
    let applied: Vec<String> = result.take(0).unwrap();
    assert_eq!(applied, vec!["group_schema".to_string()]);
    assert_eq!(store.summary().await.unwrap(), StoreSummary::default());
}

#[tokio::test]
async fn summary_counts_stored_groups() {
    let store = GroupStore::open(&DbConfig::in_memory()).await.unwrap();
    let types = SurrealGroupTypeRepository::new(store.client().clone());
    let groups = SurrealGroupRepository::new(store.client().clone());

    types.create(CreateGroupType::new("club", "Club")).await.unwrap();
    groups.create(CreateGroup::new("club", "Chess")).await.unwrap();
    groups.create(CreateGroup::new("club", "Go")).await.unwrap();

    let summary = store.summary().await.unwrap();
    assert_eq!(summary.group_types, 1);
    assert_eq!(summary.groups, 2);
    assert_eq!(summary.relationships, 0);
}

#[test]
fn in_memory_config_skips_sign_in() {
    let config = DbConfig::in_memory();
    assert!(config.is_in_memory());
    assert!(config.credentials.is_none());
    assert!(!DbConfig::default().is_in_memory());
}
