//! Schema definitions and migration runner for SurrealDB.
//!
//! Tables are SCHEMAFULL. Group and relationship UUIDs and references
//! between records are stored as strings; configuration records are keyed
//! by their machine names. Role scopes are strings with an ASSERT.

use surrealdb::{Connection, Surreal};
use surrealdb_types::SurrealValue;
use tracing::info;

use crate::error::DbError;

// -----------------------------------------------------------------------
// Migration tracking
// -----------------------------------------------------------------------

const MIGRATION_TABLE_DDL: &str = "\
DEFINE TABLE IF NOT EXISTS _migration SCHEMAFULL;
DEFINE FIELD IF NOT EXISTS version ON TABLE _migration TYPE int;
DEFINE FIELD IF NOT EXISTS name ON TABLE _migration TYPE string;
DEFINE FIELD IF NOT EXISTS applied_at ON TABLE _migration TYPE datetime \
    DEFAULT time::now();
DEFINE INDEX IF NOT EXISTS idx_migration_version ON TABLE _migration \
    COLUMNS version UNIQUE;
";

#[derive(Debug, SurrealValue)]
struct MigrationRecord {
    version: u32,
    #[allow(dead_code)]
    name: String,
}

struct Migration {
    version: u32,
    name: &'static str,
    sql: &'static str,
}

static MIGRATIONS: &[Migration] = &[Migration {
    version: 1,
    name: "group_schema",
    sql: SCHEMA_V1,
}];

// -----------------------------------------------------------------------
// Schema v1: group configuration and content
// -----------------------------------------------------------------------

const SCHEMA_V1: &str = "\
-- =======================================================================
-- Group types (configuration, keyed by machine name)
-- =======================================================================
DEFINE TABLE group_type SCHEMAFULL;
DEFINE FIELD label ON TABLE group_type TYPE string;
DEFINE FIELD description ON TABLE group_type TYPE string DEFAULT '';
DEFINE FIELD creator_membership ON TABLE group_type TYPE bool \
    DEFAULT true;
DEFINE FIELD creator_wizard ON TABLE group_type TYPE bool DEFAULT false;
DEFINE FIELD creator_roles ON TABLE group_type TYPE array<string> \
    DEFAULT [];
DEFINE FIELD installed_plugins ON TABLE group_type TYPE array<string> \
    DEFAULT [];
DEFINE FIELD created_at ON TABLE group_type TYPE datetime \
    DEFAULT time::now();
DEFINE FIELD updated_at ON TABLE group_type TYPE datetime \
    DEFAULT time::now();

-- =======================================================================
-- Group roles (configuration, keyed by machine name)
-- =======================================================================
DEFINE TABLE group_role SCHEMAFULL;
DEFINE FIELD group_type_id ON TABLE group_role TYPE string;
DEFINE FIELD label ON TABLE group_role TYPE string;
DEFINE FIELD scope ON TABLE group_role TYPE string \
    ASSERT $value IN ['individual', 'outsider', 'insider'];
DEFINE FIELD global_role ON TABLE group_role TYPE option<string>;
DEFINE FIELD admin ON TABLE group_role TYPE bool DEFAULT false;
DEFINE FIELD internal ON TABLE group_role TYPE bool DEFAULT false;
DEFINE FIELD locked ON TABLE group_role TYPE bool DEFAULT false;
DEFINE FIELD weight ON TABLE group_role TYPE int DEFAULT 0;
DEFINE FIELD permissions ON TABLE group_role TYPE array<string> \
    DEFAULT [];
DEFINE FIELD created_at ON TABLE group_role TYPE datetime \
    DEFAULT time::now();
DEFINE FIELD updated_at ON TABLE group_role TYPE datetime \
    DEFAULT time::now();
DEFINE INDEX idx_group_role_type ON TABLE group_role \
    COLUMNS group_type_id;
DEFINE INDEX idx_group_role_scope ON TABLE group_role COLUMNS scope;

-- =======================================================================
-- Groups
-- =======================================================================
DEFINE TABLE groups SCHEMAFULL;
DEFINE FIELD group_type_id ON TABLE groups TYPE string;
DEFINE FIELD label ON TABLE groups TYPE string;
DEFINE FIELD status ON TABLE groups TYPE bool DEFAULT true;
DEFINE FIELD owner_id ON TABLE groups TYPE option<string>;
DEFINE FIELD metadata ON TABLE groups TYPE object FLEXIBLE DEFAULT {};
DEFINE FIELD created_at ON TABLE groups TYPE datetime \
    DEFAULT time::now();
DEFINE FIELD updated_at ON TABLE groups TYPE datetime \
    DEFAULT time::now();
DEFINE INDEX idx_groups_type ON TABLE groups COLUMNS group_type_id;

-- =======================================================================
-- Relationships (an entity grouped through a relation plugin)
-- =======================================================================
DEFINE TABLE group_relationship SCHEMAFULL;
DEFINE FIELD group_id ON TABLE group_relationship TYPE string;
DEFINE FIELD group_type_id ON TABLE group_relationship TYPE string;
DEFINE FIELD relationship_type_id ON TABLE group_relationship \
    TYPE string;
DEFINE FIELD plugin_id ON TABLE group_relationship TYPE string;
DEFINE FIELD entity_type_id ON TABLE group_relationship TYPE string;
DEFINE FIELD entity_id ON TABLE group_relationship TYPE string;
DEFINE FIELD status ON TABLE group_relationship TYPE bool DEFAULT true;
DEFINE FIELD owner_id ON TABLE group_relationship TYPE option<string>;
DEFINE FIELD group_roles ON TABLE group_relationship \
    TYPE array<string> DEFAULT [];
DEFINE FIELD created_at ON TABLE group_relationship TYPE datetime \
    DEFAULT time::now();
DEFINE FIELD updated_at ON TABLE group_relationship TYPE datetime \
    DEFAULT time::now();
DEFINE INDEX idx_relationship_group ON TABLE group_relationship \
    COLUMNS group_id, plugin_id;
DEFINE INDEX idx_relationship_entity ON TABLE group_relationship \
    COLUMNS entity_id, plugin_id;
";

// -----------------------------------------------------------------------
// Public API
// -----------------------------------------------------------------------

/// Apply every migration newer than the highest version recorded in
/// `_migration`, recording each one as it lands.
pub async fn run_migrations<C: Connection>(db: &Surreal<C>) -> Result<(), DbError> {
    db.query(MIGRATION_TABLE_DDL)
        .await?
        .check()
        .map_err(|e| DbError::Migration(e.to_string()))?;

    let mut result = db
        .query("SELECT * FROM _migration ORDER BY version DESC LIMIT 1")
        .await?;
    let records: Vec<MigrationRecord> = result.take(0)?;
    let current_version = records.first().map(|m| m.version).unwrap_or(0);

    for migration in MIGRATIONS {
        if migration.version > current_version {
            info!(
                version = migration.version,
                name = migration.name,
                "Applying migration"
            );
            db.query(migration.sql).await?.check().map_err(|e| {
                DbError::Migration(format!(
                    "Migration v{} '{}' failed: {}",
                    migration.version, migration.name, e,
                ))
            })?;

            db.query(
                "CREATE _migration SET version = $version, \
                 name = $name",
            )
            .bind(("version", migration.version))
            .bind(("name", migration.name))
            .await?
            .check()
            .map_err(|e| {
                DbError::Migration(format!(
                    "Failed to record migration v{}: {}",
                    migration.version, e,
                ))
            })?;

            info!(
                version = migration.version,
                "Migration applied successfully"
            );
        }
    }

    Ok(())
}

/// The DDL of the first migration.
pub fn schema_v1() -> &'static str {
    SCHEMA_V1
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn schema_defines_listing_tables() {
        for table in [
            groupward_core::schema::groups::TABLE,
            groupward_core::schema::relationships::TABLE,
        ] {
            assert!(SCHEMA_V1.contains(&format!("DEFINE TABLE {table} SCHEMAFULL")));
        }
    }

    #[test]
    fn migrations_are_ordered() {
        for window in MIGRATIONS.windows(2) {
            assert!(
                window[0].version < window[1].version,
                "migrations out of order"
            );
        }
    }
}
