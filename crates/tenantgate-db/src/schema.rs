//! Schema definitions and migration runner for SurrealDB.
//!
//! Tables are SCHEMAFULL. UUIDs are stored as strings; optional
//! references use `option<string>`.

use surrealdb::{Connection, Surreal};
use surrealdb_types::SurrealValue;
use tracing::{debug, info};

use crate::error::DbError;

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
struct AppliedVersion {
    version: u32,
}

struct Migration {
    version: u32,
    name: &'static str,
    sql: &'static str,
}

static MIGRATIONS: &[Migration] = &[
    Migration {
        version: 1,
        name: "users_and_sessions",
        sql: SCHEMA_V1,
    },
    Migration {
        version: 2,
        name: "session_expiry_index",
        sql: SCHEMA_V2,
    },
];

const SCHEMA_V1: &str = "\
-- =======================================================================
-- Users
-- =======================================================================
DEFINE TABLE user SCHEMAFULL;
DEFINE FIELD project_id ON TABLE user TYPE option<string>;
DEFINE FIELD login ON TABLE user TYPE string;
DEFINE FIELD email ON TABLE user TYPE option<string>;
DEFINE FIELD phone ON TABLE user TYPE option<string>;
DEFINE FIELD password_hash ON TABLE user TYPE string;
DEFINE FIELD hash_type ON TABLE user TYPE int ASSERT $value IN [1, 2];
DEFINE FIELD active ON TABLE user TYPE int DEFAULT 0;
DEFINE FIELD client_type_id ON TABLE user TYPE option<string>;
DEFINE FIELD role_id ON TABLE user TYPE option<string>;
DEFINE FIELD created_at ON TABLE user TYPE datetime \
    DEFAULT time::now();
DEFINE FIELD updated_at ON TABLE user TYPE datetime \
    DEFAULT time::now();
DEFINE INDEX idx_user_login ON TABLE user COLUMNS login UNIQUE;

-- =======================================================================
-- Sessions
-- =======================================================================
DEFINE TABLE session SCHEMAFULL;
DEFINE FIELD project_id ON TABLE session TYPE option<string>;
DEFINE FIELD env_id ON TABLE session TYPE option<string>;
DEFINE FIELD client_platform_id ON TABLE session TYPE option<string>;
DEFINE FIELD client_type_id ON TABLE session TYPE option<string>;
DEFINE FIELD user_id ON TABLE session TYPE string;
DEFINE FIELD role_id ON TABLE session TYPE option<string>;
DEFINE FIELD ip ON TABLE session TYPE option<string>;
DEFINE FIELD data ON TABLE session TYPE object FLEXIBLE DEFAULT {};
DEFINE FIELD is_changed ON TABLE session TYPE bool DEFAULT false;
DEFINE FIELD expires_at ON TABLE session TYPE datetime;
DEFINE FIELD created_at ON TABLE session TYPE datetime \
    DEFAULT time::now();
DEFINE FIELD updated_at ON TABLE session TYPE datetime \
    DEFAULT time::now();
DEFINE INDEX idx_session_user ON TABLE session COLUMNS user_id;
DEFINE INDEX idx_session_role ON TABLE session COLUMNS role_id;
";

/// Expired-session purges filter on both columns.
const SCHEMA_V2: &str = "\
DEFINE INDEX idx_session_user_expiry ON TABLE session COLUMNS user_id, expires_at;
";

async fn applied_version<C: Connection>(db: &Surreal<C>) -> Result<u32, DbError> {
    let mut result = db
        .query("SELECT version FROM _migration ORDER BY version DESC LIMIT 1")
        .await?;
    let rows: Vec<AppliedVersion> = result.take(0)?;
    Ok(rows.first().map(|r| r.version).unwrap_or(0))
}

/// Bring the schema up to the latest version.
///
/// Each pending migration runs in its own transaction together with the
/// `_migration` row that records it.
pub async fn run_migrations<C: Connection>(db: &Surreal<C>) -> Result<(), DbError> {
    db.query(MIGRATION_TABLE_DDL)
        .await?
        .check()
        .map_err(|e| DbError::Migration(format!("tracking table: {e}")))?;

    let applied = applied_version(db).await?;
    let pending: Vec<&Migration> = MIGRATIONS.iter().filter(|m| m.version > applied).collect();
    if pending.is_empty() {
        debug!(version = applied, "Schema is current");
        return Ok(());
    }

    for migration in pending {
        info!(version = migration.version, name = migration.name, "Applying migration");

        let script = format!(
            "BEGIN TRANSACTION;\n{}\nCREATE _migration SET version = $version, name = $name;\nCOMMIT TRANSACTION;",
            migration.sql
        );
        db.query(script)
            .bind(("version", migration.version))
            .bind(("name", migration.name))
            .await?
            .check()
            .map_err(|e| {
                DbError::Migration(format!("v{} {}: {e}", migration.version, migration.name))
            })?;
    }

    info!(from = applied, to = latest_version(), "Schema migrated");
    Ok(())
}

/// Highest version this build knows about.
pub fn latest_version() -> u32 {
    MIGRATIONS.last().map(|m| m.version).unwrap_or(0)
}

/// Raw schema DDL for version 1.
pub fn schema_v1() -> &'static str {
    SCHEMA_V1
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn schema_v1_defines_both_tables() {
        assert!(SCHEMA_V1.contains("DEFINE TABLE user"));
        assert!(SCHEMA_V1.contains("DEFINE TABLE session"));
    }

    #[test]
    fn latest_version_matches_table() {
        assert_eq!(latest_version(), 2);
    }

    #[test]
    fn migrations_are_ordered() {
        for window in MIGRATIONS.windows(2) {
            assert!(
                window[0].version < window[1].version,
                "Migrations must be in ascending version order"
            );
        }
    }
}
