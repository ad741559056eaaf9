//! Server configuration loaded from the environment.

use groupward_access::AccessConfig;
use groupward_db::{DbConfig, DbCredentials};

#[derive(Debug, thiserror::Error)]
#[error("invalid value {value:?} for {key}")]
pub struct ConfigError {
    key: &'static str,
    value: String,
}

/// Everything the server needs at startup.
#[derive(Debug, Clone, Default)]
pub struct ServerConfig {
    pub db: DbConfig,
    pub access: AccessConfig,
}

impl ServerConfig {
    /// Read `GROUPWARD_*` variables, falling back to defaults for any
    /// that are unset.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let mut config = Self::default();
        let db = &mut config.db;
        for (key, field) in [
            ("GROUPWARD_DB_URL", &mut db.address),
            ("GROUPWARD_DB_NAMESPACE", &mut db.namespace),
            ("GROUPWARD_DB_DATABASE", &mut db.database),
        ] {
            if let Some(value) = lookup(key) {
                *field = value;
            }
        }
        let username = lookup("GROUPWARD_DB_USER");
        let password = lookup("GROUPWARD_DB_PASSWORD");
        if username.is_some() || password.is_some() {
            let current = db.credentials.take().unwrap_or_default();
            db.credentials = Some(DbCredentials {
                username: username.unwrap_or(current.username),
                password: password.unwrap_or(current.password),
            });
        }

        const CAPACITY: &str = "GROUPWARD_PERMISSION_CACHE_CAPACITY";
        if let Some(value) = lookup(CAPACITY) {
            config.access.permission_cache_capacity =
                value.parse().map_err(|_| ConfigError {
                    key: CAPACITY,
                    value,
                })?;
        }
        Ok(config)
    }
}
