//! Access layer configuration.

/// Site permission that lets an account skip every group access check.
pub const BYPASS_GROUP_ACCESS: &str = "bypass group access";

/// Configuration for permission calculation and access checks.
#[derive(Debug, Clone)]
pub struct AccessConfig {
    /// Site-wide permission short-circuiting all group access checks.
    pub bypass_permission: String,
    /// Maximum number of calculated permission sets kept in the shared
    /// cache (default: 10_000).
    pub permission_cache_capacity: usize,
    /// Keep calculated permissions in the shared cache across requests.
    /// When disabled every lookup recalculates, apart from the memo of a
    /// single request.
    pub persistent_cache: bool,
}

impl Default for AccessConfig {
    fn default() -> Self {
        Self {
            bypass_permission: BYPASS_GROUP_ACCESS.into(),
            permission_cache_capacity: 10_000,
            persistent_cache: true,
        }
    }
}
