//! Version-tracked database migrations for the libSQL backend.
//!
//! Each migration has a version number and SQL. `run_migrations()` checks
//! the current version and applies only the new ones sequentially.

use libsql::Connection;

use crate::error::DatabaseError;

/// A single migration step.
struct Migration {
    version: i64,
    name: &'static str,
    sql: &'static str,
}

/// All migrations in order. Add new versions to the end.
static MIGRATIONS: &[Migration] = &[Migration {
    version: 1,
    name: "initial_schema",
    sql: r#"
        CREATE TABLE IF NOT EXISTS managers (
            id TEXT PRIMARY KEY,
            telegram_id INTEGER NOT NULL UNIQUE,
            name TEXT NOT NULL,
            is_active INTEGER NOT NULL DEFAULT 1,
            created_at TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS invite_links (
            id TEXT PRIMARY KEY,
            link TEXT NOT NULL UNIQUE,
            manager_id TEXT NOT NULL REFERENCES managers(id),
            member_name TEXT NOT NULL,
            is_used INTEGER NOT NULL DEFAULT 0,
            created_at TEXT NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_invite_links_link ON invite_links(link);

        CREATE TABLE IF NOT EXISTS members (
            id TEXT PRIMARY KEY,
            telegram_id INTEGER NOT NULL UNIQUE,
            first_name TEXT NOT NULL,
            last_name TEXT,
            username TEXT,
            invite_link_id TEXT NOT NULL REFERENCES invite_links(id),
            joined_at TEXT NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_members_telegram ON members(telegram_id);

        CREATE TABLE IF NOT EXISTS applications (
            id TEXT PRIMARY KEY,
            member_id TEXT REFERENCES members(id),
            manager_id TEXT NOT NULL REFERENCES managers(id),
            full_name TEXT,
            telegram_phone TEXT,
            phones TEXT NOT NULL DEFAULT '[]',
            city TEXT,
            age INTEGER,
            height INTEGER,
            weight INTEGER,
            children TEXT,
            cesarean TEXT,
            blood_type TEXT,
            status TEXT NOT NULL,
            created_at TEXT NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_applications_member ON applications(member_id);
        CREATE INDEX IF NOT EXISTS idx_applications_status ON applications(status);

        CREATE TABLE IF NOT EXISTS sessions (
            applicant_id INTEGER PRIMARY KEY,
            state TEXT NOT NULL,
            updated_at TEXT NOT NULL
        );
    "#,
}];

/// Apply all migrations newer than the recorded schema version.
pub async fn run_migrations(conn: &Connection) -> Result<(), DatabaseError> {
    conn.execute(
        "CREATE TABLE IF NOT EXISTS _migrations (
            version INTEGER PRIMARY KEY,
            name TEXT NOT NULL,
            applied_at TEXT NOT NULL DEFAULT (datetime('now'))
        )",
        (),
    )
    .await
    .map_err(|e| DatabaseError::Migration(format!("creating _migrations table: {e}")))?;

    let current = current_version(conn).await?;

    for migration in MIGRATIONS.iter().filter(|m| m.version > current) {
        conn.execute_batch(migration.sql)
            .await
            .map_err(|e| {
                DatabaseError::Migration(format!(
                    "migration {} ({}) failed: {e}",
                    migration.version, migration.name
                ))
            })?;
        conn.execute(
            "INSERT INTO _migrations (version, name) VALUES (?1, ?2)",
            libsql::params![migration.version, migration.name],
        )
        .await
        .map_err(|e| DatabaseError::Migration(format!("recording migration: {e}")))?;
        tracing::info!(
            version = migration.version,
            name = migration.name,
            "Applied migration"
        );
    }

    Ok(())
}

async fn current_version(conn: &Connection) -> Result<i64, DatabaseError> {
    let mut rows = conn
        .query("SELECT COALESCE(MAX(version), 0) FROM _migrations", ())
        .await
        .map_err(|e| DatabaseError::Migration(format!("reading schema version: {e}")))?;
    let row = rows
        .next()
        .await
        .map_err(|e| DatabaseError::Migration(e.to_string()))?;
    match row {
        Some(row) => row
            .get::<i64>(0)
            .map_err(|e| DatabaseError::Migration(e.to_string())),
        None => Ok(0),
    }
}
