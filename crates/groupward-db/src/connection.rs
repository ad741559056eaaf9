//! Opening the group store.
//!
//! The address scheme picks the engine: `ws://` or `wss://` for a
//! SurrealDB server, `mem://` for an in-process store. Opening a store
//! always applies pending migrations, so repositories built on it never
//! see a missing table.

use surrealdb::Surreal;
use surrealdb::engine::any::{self, Any};
use surrealdb::opt::auth::Root;

use crate::error::DbError;
use crate::repository::CountRow;
use crate::schema::run_migrations;

const IN_MEMORY: &str = "mem://";

/// Root sign-in for a SurrealDB server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DbCredentials {
    pub username: String,
    pub password: String,
}

impl Default for DbCredentials {
    fn default() -> Self {
        Self {
            username: "root".into(),
            password: "root".into(),
        }
    }
}

/// Where the group store lives.
#[derive(Debug, Clone)]
pub struct DbConfig {
    /// Engine address, e.g. `ws://127.0.0.1:8000` or `mem://`.
    pub address: String,
    pub namespace: String,
    pub database: String,
    /// Ignored for in-process stores.
    pub credentials: Option<DbCredentials>,
}

impl Default for DbConfig {
    fn default() -> Self {
        Self {
            address: "ws://127.0.0.1:8000".into(),
            namespace: "groupward".into(),
            database: "groups".into(),
            credentials: Some(DbCredentials::default()),
        }
    }
}

impl DbConfig {
    /// A throwaway in-process store.
    pub fn in_memory() -> Self {
        Self {
            address: IN_MEMORY.into(),
            credentials: None,
            ..Self::default()
        }
    }

    pub fn is_in_memory(&self) -> bool {
        self.address.starts_with(IN_MEMORY)
    }
}

/// How much the store holds, logged at startup.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StoreSummary {
    pub group_types: u64,
    pub groups: u64,
    pub relationships: u64,
}

/// An open, migrated group store.
#[derive(Clone)]
pub struct GroupStore {
    db: Surreal<Any>,
}

impl GroupStore {
    pub async fn open(config: &DbConfig) -> Result<Self, DbError> {
        tracing::info!(
            address = %config.address,
            namespace = %config.namespace,
            database = %config.database,
            "opening group store"
        );

        let db = any::connect(config.address.as_str()).await?;
        if let Some(credentials) = config.credentials.as_ref().filter(|_| !config.is_in_memory()) {
            db.signin(Root {
                username: credentials.username.clone(),
                password: credentials.password.clone(),
            })
            .await?;
        }
        db.use_ns(&config.namespace)
            .use_db(&config.database)
            .await?;
        run_migrations(&db).await?;

        Ok(Self { db })
    }

    pub fn client(&self) -> &Surreal<Any> {
        &self.db
    }

    pub async fn summary(&self) -> Result<StoreSummary, DbError> {
        let mut result = self
            .db
            .query(
                "SELECT count() AS total FROM group_type GROUP ALL; \
                 SELECT count() AS total FROM groups GROUP ALL; \
                 SELECT count() AS total FROM group_relationship GROUP ALL;",
            )
            .await?;
        let mut total = |index: usize| -> Result<u64, DbError> {
            let rows: Vec<CountRow> = result.take(index)?;
            Ok(rows.first().map(|row| row.total).unwrap_or(0))
        };
        Ok(StoreSummary {
            group_types: total(0)?,
            groups: total(1)?,
            relationships: total(2)?,
        })
    }
}
