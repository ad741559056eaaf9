//! Cacheability metadata attached to computed values and altered
//! queries, and the invalidation seam storage uses on writes.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

/// Varies on the current user.
pub const CONTEXT_USER: &str = "user";
/// Varies on the current user's site roles.
pub const CONTEXT_USER_ROLES: &str = "user.roles";
/// Varies on the current user's site-wide permissions.
pub const CONTEXT_USER_PERMISSIONS: &str = "user.permissions";
/// Varies on the hash of the current user's calculated group permissions.
pub const CONTEXT_USER_GROUP_PERMISSIONS: &str = "user.group_permissions";

/// Cache contexts (what a value varies by) and tags (what invalidates it).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheableMetadata {
    pub contexts: BTreeSet<String>,
    pub tags: BTreeSet<String>,
}

impl CacheableMetadata {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_cache_context(&mut self, context: impl Into<String>) -> &mut Self {
        self.contexts.insert(context.into());
        self
    }

    pub fn add_cache_contexts<I, S>(&mut self, contexts: I) -> &mut Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.contexts.extend(contexts.into_iter().map(Into::into));
        self
    }

    pub fn add_cache_tag(&mut self, tag: impl Into<String>) -> &mut Self {
        self.tags.insert(tag.into());
        self
    }

    pub fn add_cache_tags<I, S>(&mut self, tags: I) -> &mut Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tags.extend(tags.into_iter().map(Into::into));
        self
    }

    pub fn merge(&mut self, other: &CacheableMetadata) -> &mut Self {
        self.contexts.extend(other.contexts.iter().cloned());
        self.tags.extend(other.tags.iter().cloned());
        self
    }

    pub fn has_tag(&self, tag: &str) -> bool {
        self.tags.contains(tag)
    }

    /// Whether any of `tags` invalidates this value.
    pub fn is_invalidated_by<'a>(&self, mut tags: impl Iterator<Item = &'a str>) -> bool {
        tags.any(|tag| self.tags.contains(tag))
    }
}

/// Receives the tags of everything storage writes.
///
/// Invalidation is synchronous with the write that caused it.
pub trait CacheTagInvalidator: Send + Sync {
    fn invalidate_tags(&self, tags: &[String]);
}

/// Invalidator that discards every tag.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullInvalidator;

impl CacheTagInvalidator for NullInvalidator {
    fn invalidate_tags(&self, _tags: &[String]) {}
}
