//! Three-valued access decisions.

use groupward_core::cache::CacheableMetadata;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessKind {
    Allowed,
    /// No opinion; another checker may decide. Denies on its own.
    Neutral,
    /// Denies regardless of what other checkers say.
    Forbidden,
}

/// An access decision together with what it depends on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccessResult {
    kind: AccessKind,
    reason: Option<String>,
    metadata: CacheableMetadata,
}

impl AccessResult {
    fn of(kind: AccessKind) -> Self {
        Self {
            kind,
            reason: None,
            metadata: CacheableMetadata::new(),
        }
    }

    pub fn allowed() -> Self {
        Self::of(AccessKind::Allowed)
    }

    pub fn neutral() -> Self {
        Self::of(AccessKind::Neutral)
    }

    pub fn forbidden(reason: impl Into<String>) -> Self {
        Self {
            reason: Some(reason.into()),
            ..Self::of(AccessKind::Forbidden)
        }
    }

    pub fn allowed_if(condition: bool) -> Self {
        if condition { Self::allowed() } else { Self::neutral() }
    }

    pub fn forbidden_if(condition: bool, reason: impl Into<String>) -> Self {
        if condition {
            Self::forbidden(reason)
        } else {
            Self::neutral()
        }
    }

    pub fn kind(&self) -> AccessKind {
        self.kind
    }

    pub fn reason(&self) -> Option<&str> {
        self.reason.as_deref()
    }

    pub fn is_allowed(&self) -> bool {
        self.kind == AccessKind::Allowed
    }

    pub fn is_neutral(&self) -> bool {
        self.kind == AccessKind::Neutral
    }

    pub fn is_forbidden(&self) -> bool {
        self.kind == AccessKind::Forbidden
    }

    pub fn metadata(&self) -> &CacheableMetadata {
        &self.metadata
    }

    pub fn add_cache_context(mut self, context: impl Into<String>) -> Self {
        self.metadata.add_cache_context(context);
        self
    }

    pub fn add_cache_tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.metadata.add_cache_tags(tags);
        self
    }

    pub fn add_cacheable_dependency(mut self, metadata: &CacheableMetadata) -> Self {
        self.metadata.merge(metadata);
        self
    }

    /// Forbidden wins, then allowed, otherwise neutral.
    pub fn or_if(self, other: AccessResult) -> Self {
        let (mut winner, loser) = match (self.kind, other.kind) {
            (AccessKind::Forbidden, _) => (self, other),
            (_, AccessKind::Forbidden) => (other, self),
            (AccessKind::Allowed, _) => (self, other),
            (_, AccessKind::Allowed) => (other, self),
            _ => (self, other),
        };
        winner.metadata.merge(&loser.metadata);
        winner
    }

    /// Allowed only when both are allowed; forbidden when either is.
    pub fn and_if(self, other: AccessResult) -> Self {
        let (mut winner, loser) = match (self.kind, other.kind) {
            (AccessKind::Forbidden, _) => (self, other),
            (_, AccessKind::Forbidden) => (other, self),
            (AccessKind::Allowed, AccessKind::Allowed) => (self, other),
            (AccessKind::Neutral, _) => (self, other),
            _ => (other, self),
        };
        winner.metadata.merge(&loser.metadata);
        winner
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn or_if_prefers_forbidden_then_allowed() {
        assert!(AccessResult::neutral().or_if(AccessResult::allowed()).is_allowed());
        assert!(
            AccessResult::allowed()
                .or_if(AccessResult::forbidden("no"))
                .is_forbidden()
        );
        assert!(AccessResult::neutral().or_if(AccessResult::neutral()).is_neutral());
    }

    #[test]
    fn and_if_requires_both() {
        assert!(AccessResult::allowed().and_if(AccessResult::allowed()).is_allowed());
        assert!(AccessResult::allowed().and_if(AccessResult::neutral()).is_neutral());
        assert!(
            AccessResult::neutral()
                .and_if(AccessResult::forbidden("no"))
                .is_forbidden()
        );
    }

    #[test]
    fn combining_keeps_both_dependencies() {
        let left = AccessResult::allowed().add_cache_tags(["group:1"]);
        let right = AccessResult::neutral().add_cache_context("user");
        let combined = left.or_if(right);
        assert!(combined.metadata().has_tag("group:1"));
        assert!(combined.metadata().contexts.contains("user"));
    }
}
