//! Database migrations
//!
//! Versioned schema creation plus the `drop_all` / `create_all` pair used to
//! start over from an empty store.

use crate::core::error::Result;
use rusqlite::Connection;
use tracing::{info, warn};

/// Migration version tracking table
const MIGRATION_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS schema_migrations (
    version INTEGER PRIMARY KEY,
    applied_at DATETIME DEFAULT CURRENT_TIMESTAMP
)
"#;

/// Initial schema migration (version 1)
///
/// Names are declared VARCHAR(32); SQLite ignores the length, so the CHECK
/// constraints make the engine reject over-length names instead.
const MIGRATION_V1: &str = r#"
CREATE TABLE IF NOT EXISTS ingredients (
    ingredient_id INTEGER PRIMARY KEY AUTOINCREMENT,
    ingredient_name VARCHAR(32) NOT NULL CHECK (length(ingredient_name) <= 32)
);

CREATE TABLE IF NOT EXISTS drinks (
    drink_id INTEGER PRIMARY KEY AUTOINCREMENT,
    drink_name VARCHAR(32) NOT NULL CHECK (length(drink_name) <= 32)
);

-- Association table. No unique (drink_id, ingredient_id) pair and no ON DELETE rules.
CREATE TABLE IF NOT EXISTS drink_ingredients (
    drinkingredient_id INTEGER PRIMARY KEY AUTOINCREMENT,
    drink_id INTEGER REFERENCES drinks(drink_id),
    ingredient_id INTEGER REFERENCES ingredients(ingredient_id)
);

CREATE INDEX IF NOT EXISTS idx_drink_ingredients_drink ON drink_ingredients(drink_id);
CREATE INDEX IF NOT EXISTS idx_drink_ingredients_ingredient ON drink_ingredients(ingredient_id);
"#;

/// Latest schema version known to this build
pub const SCHEMA_VERSION: i64 = 1;

/// Create every table that does not exist yet
pub fn create_all(conn: &mut Connection) -> Result<()> {
    conn.execute_batch(MIGRATION_TABLE)?;

    let current_version = schema_version(conn)?;

    if current_version < 1 {
        info!("Applying migration v1: drinks, ingredients and drink_ingredients");
        apply_migration(conn, 1, MIGRATION_V1)?;
    }

    Ok(())
}

/// Drop every table, including the migration record
///
/// `sqlite_sequence` rows go with the tables, so identifiers restart at 1
/// after the next `create_all`.
pub fn drop_all(conn: &mut Connection) -> Result<()> {
    warn!("Dropping all tables");

    let tx = conn.transaction()?;
    tx.execute_batch(
        "DROP TABLE IF EXISTS drink_ingredients;
         DROP TABLE IF EXISTS drinks;
         DROP TABLE IF EXISTS ingredients;
         DROP TABLE IF EXISTS schema_migrations;",
    )?;
    tx.commit()?;

    Ok(())
}

/// Highest applied migration, 0 for an empty database
pub fn schema_version(conn: &Connection) -> Result<i64> {
    let has_table: bool = conn.query_row(
        "SELECT COUNT(*) > 0 FROM sqlite_master WHERE type = 'table' AND name = 'schema_migrations'",
        [],
        |row| row.get(0),
    )?;

    if !has_table {
        return Ok(0);
    }

    let version = conn.query_row(
        "SELECT COALESCE(MAX(version), 0) FROM schema_migrations",
        [],
        |row| row.get(0),
    )?;
    Ok(version)
}

/// Apply a single migration
fn apply_migration(conn: &mut Connection, version: i64, sql: &str) -> Result<()> {
    let tx = conn.transaction()?;

    tx.execute_batch(sql).map_err(|e| {
        warn!("Migration v{} failed: {}", version, e);
        e
    })?;

    tx.execute("INSERT INTO schema_migrations (version) VALUES (?)", [version])?;

    tx.commit()?;

    info!("Migration v{} applied successfully", version);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::models::MAX_NAME_LEN;

    fn table_names(conn: &Connection) -> Vec<String> {
        let mut stmt = conn
            .prepare("SELECT name FROM sqlite_master WHERE type = 'table' AND name NOT LIKE 'sqlite_%' ORDER BY name")
            .unwrap();
        stmt.query_map([], |row| row.get(0))
            .unwrap()
            .collect::<std::result::Result<Vec<String>, _>>()
            .unwrap()
    }

    #[test]
    fn test_create_all_is_idempotent() {
        let mut conn = Connection::open_in_memory().unwrap();
        assert_eq!(schema_version(&conn).unwrap(), 0);

        create_all(&mut conn).unwrap();
        create_all(&mut conn).unwrap();

        assert_eq!(schema_version(&conn).unwrap(), SCHEMA_VERSION);
        assert_eq!(
            table_names(&conn),
            vec!["drink_ingredients", "drinks", "ingredients", "schema_migrations"]
        );
    }

    #[test]
    fn test_drop_all_restarts_identifiers() {
        let mut conn = Connection::open_in_memory().unwrap();
        create_all(&mut conn).unwrap();
        conn.execute("INSERT INTO drinks (drink_name) VALUES ('margarita')", [])
            .unwrap();
        conn.execute("INSERT INTO drinks (drink_name) VALUES ('mojito')", [])
            .unwrap();

        drop_all(&mut conn).unwrap();
        assert!(table_names(&conn).is_empty());
        assert_eq!(schema_version(&conn).unwrap(), 0);

        create_all(&mut conn).unwrap();
        conn.execute("INSERT INTO drinks (drink_name) VALUES ('margarita')", [])
            .unwrap();
        let id: i64 = conn.last_insert_rowid();
        assert_eq!(id, 1);
    }

    #[test]
    fn test_name_length_enforced_by_engine() {
        let mut conn = Connection::open_in_memory().unwrap();
        create_all(&mut conn).unwrap();

        let ok = "x".repeat(MAX_NAME_LEN);
        let too_long = "x".repeat(MAX_NAME_LEN + 1);
        assert!(conn
            .execute("INSERT INTO ingredients (ingredient_name) VALUES (?)", [&ok])
            .is_ok());
        assert!(conn
            .execute("INSERT INTO ingredients (ingredient_name) VALUES (?)", [&too_long])
            .is_err());
    }
}
