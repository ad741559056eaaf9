//! Domain models for groupward.
//!
//! These are the core types shared across all crates.

pub mod account;
pub mod entity;
pub mod group;
pub mod group_role;
pub mod group_type;
pub mod relationship;
