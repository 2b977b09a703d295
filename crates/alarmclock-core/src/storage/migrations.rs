//! Database schema migrations for alarmclock.
//!
//! Migrations are versioned and applied automatically when opening the database.
//! The `schema_version` table tracks the current migration version.

use rusqlite::{Connection, Result as SqliteResult};

/// Current schema version.
///
/// Increment this when adding new migrations.
pub const SCHEMA_VERSION: i32 = 2;

/// Apply all pending migrations to bring the database to the current schema version.
///
/// # Errors
/// Returns an error if migration fails.
pub fn migrate(conn: &Connection) -> SqliteResult<()> {
    create_schema_version_table(conn)?;

    let current_version = get_schema_version(conn)?;

    if current_version < 1 {
        migrate_v1(conn)?;
    }
    if current_version < 2 {
        migrate_v2(conn)?;
    }

    Ok(())
}

fn create_schema_version_table(conn: &Connection) -> SqliteResult<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS schema_version (
            version INTEGER PRIMARY KEY
        );",
    )
}

/// Get the current schema version from the database.
///
/// Returns 0 if no version is set (initial database).
pub fn get_schema_version(conn: &Connection) -> SqliteResult<i32> {
    match conn.query_row("SELECT version FROM schema_version", [], |row| {
        row.get::<_, i32>(0)
    }) {
        Ok(v) => Ok(v),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(0),
        Err(e) => Err(e),
    }
}

fn set_schema_version(conn: &Connection, version: i32) -> SqliteResult<()> {
    conn.execute("DELETE FROM schema_version", [])?;
    conn.execute(
        "INSERT INTO schema_version (version) VALUES (?1)",
        [version],
    )?;
    Ok(())
}

/// Migration v1: alarms table.
fn migrate_v1(conn: &Connection) -> SqliteResult<()> {
    let tx = conn.unchecked_transaction()?;
    tx.execute_batch(
        "CREATE TABLE IF NOT EXISTS alarms (
            id                     INTEGER PRIMARY KEY AUTOINCREMENT,
            hour                   INTEGER NOT NULL,
            minute                 INTEGER NOT NULL,
            next_fire_at           INTEGER NOT NULL,
            enabled                INTEGER NOT NULL DEFAULT 1,
            days                   INTEGER NOT NULL DEFAULT 0,
            label                  TEXT NOT NULL DEFAULT '',
            tone                   TEXT NOT NULL DEFAULT 'default',
            vibrate                INTEGER NOT NULL DEFAULT 1,
            snooze_minutes         INTEGER NOT NULL DEFAULT 10
        );

        CREATE INDEX IF NOT EXISTS idx_alarms_enabled ON alarms(enabled);",
    )?;
    set_schema_version(&tx, 1)?;
    tx.commit()
}

/// Migration v2: auto-snooze policy and the pre-alarm notification flag.
fn migrate_v2(conn: &Connection) -> SqliteResult<()> {
    let tx = conn.unchecked_transaction()?;
    tx.execute_batch(
        "ALTER TABLE alarms ADD COLUMN auto_snooze_enabled INTEGER NOT NULL DEFAULT 1;
         ALTER TABLE alarms ADD COLUMN auto_snooze_max_cycles INTEGER NOT NULL DEFAULT 3;
         ALTER TABLE alarms ADD COLUMN auto_snooze_count INTEGER NOT NULL DEFAULT 0;
         ALTER TABLE alarms ADD COLUMN upcoming_shown INTEGER NOT NULL DEFAULT 0;",
    )?;
    set_schema_version(&tx, 2)?;
    tx.commit()
}
