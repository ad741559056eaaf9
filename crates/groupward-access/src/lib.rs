//! Groupward access: calculated group permissions, relation plugins and
//! the access checks built on them.
//!
//! Permissions are calculated per account by a chain of
//! [`calculator::PermissionCalculator`]s, cached in a shared
//! [`cache::PermissionCache`] and consulted in two ways: point checks
//! through [`checker::GroupPermissionChecker`] and listing filters
//! through [`query_alter::QueryAccess`].

pub mod access;
pub mod access_result;
pub mod cache;
pub mod cache_context;
pub mod calculator;
pub mod checker;
pub mod config;
pub mod manager;
pub mod permission;
pub mod query_alter;
pub mod relation;
pub mod route;

#[cfg(test)]
mod testing;

pub use access_result::AccessResult;
pub use cache::PermissionCache;
pub use calculator::ChainPermissionCalculator;
pub use checker::{GroupContext, GroupPermissionChecker};
pub use config::AccessConfig;
pub use manager::RelationshipManager;
pub use query_alter::QueryAccess;
pub use relation::{Operation, RelationTypeRegistry};
