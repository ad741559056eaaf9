//! Groupward database: SurrealDB connection management, schema
//! migrations, repository implementations and listing query execution.
//!
//! This crate provides:
//! - Opening a migrated store ([`GroupStore`], [`DbConfig`])
//! - Schema initialization and migrations ([`run_migrations`])
//! - Repositories for the `groupward-core` traits ([`repository`])
//! - Execution of altered listing queries ([`list_ids`])

pub mod listing;
pub mod repository;

mod connection;
mod error;
mod schema;

pub use connection::{DbConfig, DbCredentials, GroupStore, StoreSummary};
pub use error::DbError;
pub use listing::{SurqlStatement, list_ids, render_ids};
pub use schema::{run_migrations, schema_v1};
