use std::sync::Arc;

use dashmap::DashMap;
use groupward_core::cache::{CONTEXT_USER, CONTEXT_USER_GROUP_PERMISSIONS, CacheTagInvalidator};
use groupward_core::error::GroupResult;
use groupward_core::models::account::Account;

use super::{
    BypassPermissionCalculator, IndividualPermissionCalculator, PermissionCalculator,
    PermissionSnapshot, PermissionSource, SynchronizedPermissionCalculator,
};
use crate::cache::PermissionCache;
use crate::config::AccessConfig;
use crate::permission::{CalculatedPermissions, RefinableCalculatedPermissions};

/// Cache key of an account's calculated permissions.
///
/// Site roles and permissions are part of the key because synchronized
/// roles and the bypass permission depend on them.
pub fn cache_key(account: &Account) -> String {
    let roles = account.roles.iter().cloned().collect::<Vec<_>>().join(",");
    let permissions = account
        .permissions
        .iter()
        .cloned()
        .collect::<Vec<_>>()
        .join(",");
    match account.id {
        Some(id) => format!("user:{id}|roles:{roles}|permissions:{permissions}"),
        None => format!("anonymous|roles:{roles}|permissions:{permissions}"),
    }
}

/// Runs every registered calculator for an account and merges the
/// results.
///
/// With the persistent cache enabled, results are stored in the shared
/// [`PermissionCache`]. Memoization within one request goes through
/// [`request`](Self::request).
pub struct ChainPermissionCalculator<S: PermissionSource> {
    source: S,
    calculators: Vec<Box<dyn PermissionCalculator>>,
    cache: Arc<PermissionCache>,
    config: AccessConfig,
}

impl<S: PermissionSource> ChainPermissionCalculator<S> {
    /// A chain with the individual, synchronized and bypass calculators.
    pub fn new(source: S, cache: Arc<PermissionCache>, config: AccessConfig) -> Self {
        let calculators: Vec<Box<dyn PermissionCalculator>> = vec![
            Box::new(IndividualPermissionCalculator),
            Box::new(SynchronizedPermissionCalculator),
            Box::new(BypassPermissionCalculator::new(config.bypass_permission.clone())),
        ];
        Self {
            source,
            calculators,
            cache,
            config,
        }
    }

    /// Append a calculator to the chain.
    pub fn with_calculator(mut self, calculator: Box<dyn PermissionCalculator>) -> Self {
        self.calculators.push(calculator);
        self
    }

    pub fn config(&self) -> &AccessConfig {
        &self.config
    }

    pub fn cache(&self) -> &Arc<PermissionCache> {
        &self.cache
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    /// Run every calculator against an already loaded snapshot.
    pub fn calculate_for_snapshot(&self, snapshot: &PermissionSnapshot) -> CalculatedPermissions {
        let mut merged = RefinableCalculatedPermissions::new();
        merged
            .metadata_mut()
            .add_cache_contexts([CONTEXT_USER, CONTEXT_USER_GROUP_PERMISSIONS]);
        for calculator in &self.calculators {
            let calculated = calculator.calculate(snapshot);
            tracing::debug!(calculator = calculator.name(), "merged calculator output");
            merged.merge(calculated);
        }
        merged.freeze()
    }

    /// A memo of calculated permissions for the duration of one request.
    pub fn request(&self) -> RequestPermissions<'_, S> {
        RequestPermissions {
            chain: self,
            memo: DashMap::new(),
        }
    }

    /// The calculated permissions of `account`.
    pub async fn calculate_permissions(
        &self,
        account: &Account,
    ) -> GroupResult<Arc<CalculatedPermissions>> {
        let key = cache_key(account);
        let generation = self.cache.generation();

        if self.config.persistent_cache {
            if let Some(permissions) = self.cache.get(&key) {
                return Ok(permissions);
            }
        }

        let snapshot = self.source.load_snapshot(account).await?;
        let permissions = Arc::new(self.calculate_for_snapshot(&snapshot));
        tracing::debug!(
            account = ?account.id,
            items = permissions.items().count(),
            "calculated group permissions"
        );

        // A write may have landed while the snapshot was loading.
        if self.config.persistent_cache && self.cache.generation() == generation {
            self.cache.put(key, Arc::clone(&permissions));
        }
        Ok(permissions)
    }
}

/// Calculated permissions memoized for one request.
///
/// Everything memoized is forgotten when the handle is dropped. An
/// invalidation of the shared cache also invalidates the memo.
pub struct RequestPermissions<'a, S: PermissionSource> {
    chain: &'a ChainPermissionCalculator<S>,
    memo: DashMap<String, (u64, Arc<CalculatedPermissions>)>,
}

impl<S: PermissionSource> RequestPermissions<'_, S> {
    pub async fn calculate_permissions(
        &self,
        account: &Account,
    ) -> GroupResult<Arc<CalculatedPermissions>> {
        let key = cache_key(account);
        let generation = self.chain.cache.generation();

        if let Some(entry) = self.memo.get(&key) {
            let (memo_generation, permissions) = entry.value();
            if *memo_generation == generation {
                return Ok(Arc::clone(permissions));
            }
        }

        let permissions = self.chain.calculate_permissions(account).await?;
        if self.chain.cache.generation() == generation {
            self.memo.insert(key, (generation, Arc::clone(&permissions)));
        }
        Ok(permissions)
    }

    /// Number of accounts memoized so far.
    pub fn len(&self) -> usize {
        self.memo.len()
    }

    pub fn is_empty(&self) -> bool {
        self.memo.is_empty()
    }
}

impl<S: PermissionSource> CacheTagInvalidator for ChainPermissionCalculator<S> {
    fn invalidate_tags(&self, tags: &[String]) {
        self.cache.invalidate_tags(tags);
    }
}
