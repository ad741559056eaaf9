//! Shared cache of calculated permission sets.
//!
//! Entries are dropped as soon as storage reports a write touching one
//! of their cache tags. There is no time-based expiry.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use dashmap::DashMap;
use groupward_core::cache::CacheTagInvalidator;

use crate::permission::CalculatedPermissions;

/// Calculated permissions keyed by account cache key.
pub struct PermissionCache {
    entries: DashMap<String, Arc<CalculatedPermissions>>,
    max_size: usize,
    hits: AtomicU64,
    misses: AtomicU64,
    generation: AtomicU64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheStats {
    pub size: usize,
    pub max_size: usize,
    pub hits: u64,
    pub misses: u64,
}

impl PermissionCache {
    pub fn new(max_size: usize) -> Self {
        Self {
            entries: DashMap::with_capacity(max_size.min(1024)),
            max_size: max_size.max(1),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            generation: AtomicU64::new(0),
        }
    }

    /// Bumped on every invalidation. Short-lived memos compare it to
    /// detect that they went stale.
    pub fn generation(&self) -> u64 {
        self.generation.load(Ordering::Acquire)
    }

    pub fn get(&self, key: &str) -> Option<Arc<CalculatedPermissions>> {
        match self.entries.get(key) {
            Some(entry) => {
                self.hits.fetch_add(1, Ordering::Relaxed);
                Some(Arc::clone(entry.value()))
            }
            None => {
                self.misses.fetch_add(1, Ordering::Relaxed);
                None
            }
        }
    }

    pub fn put(&self, key: impl Into<String>, permissions: Arc<CalculatedPermissions>) {
        let key = key.into();
        // Size limit: evict an arbitrary entry when full.
        if self.entries.len() >= self.max_size && !self.entries.contains_key(&key) {
            let victim = self.entries.iter().next().map(|entry| entry.key().clone());
            if let Some(victim) = victim {
                self.entries.remove(&victim);
            }
        }
        self.entries.insert(key, permissions);
    }

    pub fn remove(&self, key: &str) {
        self.entries.remove(key);
    }

    pub fn clear(&self) {
        self.entries.clear();
        self.generation.fetch_add(1, Ordering::AcqRel);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            size: self.entries.len(),
            max_size: self.max_size,
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
        }
    }
}

impl Default for PermissionCache {
    fn default() -> Self {
        Self::new(10_000)
    }
}

impl CacheTagInvalidator for PermissionCache {
    fn invalidate_tags(&self, tags: &[String]) {
        if tags.is_empty() {
            return;
        }
        self.generation.fetch_add(1, Ordering::AcqRel);
        let before = self.entries.len();
        self.entries.retain(|_, permissions| {
            !permissions
                .metadata()
                .is_invalidated_by(tags.iter().map(String::as_str))
        });
        tracing::debug!(
            tags = ?tags,
            evicted = before.saturating_sub(self.entries.len()),
            "invalidated calculated permissions"
        );
    }
}
