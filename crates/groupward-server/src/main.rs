//! Groupward server: application entry point.
//!
//! Opens the group store, which applies migrations, and assembles the
//! group access services, then waits for shutdown.

mod config;

use std::sync::Arc;

use groupward_access::calculator::RepositoryPermissionSource;
use groupward_access::route::{RouteAccessChecker, RouteTable};
use groupward_access::{
    ChainPermissionCalculator, GroupPermissionChecker, PermissionCache, RelationTypeRegistry,
};
use groupward_core::cache::CacheTagInvalidator;
use groupward_core::error::GroupError;
use groupward_db::repository::{
    SurrealGroupRepository, SurrealGroupRoleRepository, SurrealGroupTypeRepository,
    SurrealRelationshipRepository,
};
use groupward_db::{DbError, GroupStore};
use tracing_subscriber::EnvFilter;

use crate::config::{ConfigError, ServerConfig};

#[derive(Debug, thiserror::Error)]
enum ServerError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Db(#[from] DbError),

    #[error(transparent)]
    Group(#[from] GroupError),

    #[error("failed to listen for shutdown: {0}")]
    Signal(#[from] std::io::Error),
}

#[tokio::main]
async fn main() {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("groupward=info"));
    tracing_subscriber::fmt().with_env_filter(filter).json().init();

    tracing::info!("Starting groupward server...");
    if let Err(err) = run().await {
        tracing::error!(error = %err, "groupward server failed");
        std::process::exit(1);
    }
    tracing::info!("groupward server stopped.");
}

async fn run() -> Result<(), ServerError> {
    let config = ServerConfig::from_env()?;

    let store = GroupStore::open(&config.db).await?;
    let summary = store.summary().await?;
    tracing::info!(
        group_types = summary.group_types,
        groups = summary.groups,
        relationships = summary.relationships,
        "group store ready"
    );
    let db = store.client().clone();

    let registry = Arc::new(RelationTypeRegistry::with_builtins()?);
    tracing::info!(
        plugins = ?registry.plugin_ids(),
        permissions = registry.build_permissions().len(),
        "relation plugins registered"
    );

    let cache = Arc::new(PermissionCache::new(config.access.permission_cache_capacity));
    let invalidator: Arc<dyn CacheTagInvalidator> = cache.clone();
    let relationships =
        SurrealRelationshipRepository::new(db.clone()).with_invalidator(invalidator.clone());
    let roles = SurrealGroupRoleRepository::new(db.clone()).with_invalidator(invalidator.clone());
    let group_types = SurrealGroupTypeRepository::new(db.clone())
        .with_invalidator(invalidator.clone())
        .with_relationships(relationships.clone());
    let groups = SurrealGroupRepository::new(db)
        .with_invalidator(invalidator)
        .with_relationships(relationships.clone());

    let chain = Arc::new(ChainPermissionCalculator::new(
        RepositoryPermissionSource::new(group_types.clone(), roles, relationships.clone()),
        cache.clone(),
        config.access.clone(),
    ));
    let checker = Arc::new(GroupPermissionChecker::new(chain, relationships));
    let routes = RouteAccessChecker::new(
        RouteTable::group_routes(),
        groups,
        group_types,
        checker,
        registry,
    );
    tracing::info!(
        routes = routes.routes().routes().count(),
        cache_capacity = config.access.permission_cache_capacity,
        "group access services ready"
    );

    tokio::signal::ctrl_c().await?;
    let stats = cache.stats();
    tracing::info!(
        hits = stats.hits,
        misses = stats.misses,
        "shutting down"
    );
    Ok(())
}
