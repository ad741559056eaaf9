//! Groupward core: domain models, repository traits, cacheability
//! metadata and the relational query model access checks rewrite.

pub mod cache;
pub mod error;
pub mod models;
pub mod query;
pub mod repository;
pub mod schema;
