use std::path::Path;

use rusqlite::Connection;

use super::DatabaseError;

/// Ordered schema migrations. Each script records its own version in
/// `schema_version`.
const MIGRATIONS: &[(i64, &str)] = &[(1, include_str!("../../resources/migrations/001_initial.sql"))];

/// Open (creating if needed) the database file and bring its schema current.
pub fn open_database(path: &Path) -> Result<Connection, DatabaseError> {
    if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
        std::fs::create_dir_all(dir).map_err(|e| DatabaseError::MigrationFailed {
            version: 0,
            reason: format!("cannot create {}: {e}", dir.display()),
        })?;
    }
    prepare(Connection::open(path)?)
}

/// In-memory database with the full schema, for tests.
pub fn open_memory_database() -> Result<Connection, DatabaseError> {
    prepare(Connection::open_in_memory()?)
}

fn prepare(conn: Connection) -> Result<Connection, DatabaseError> {
    conn.execute_batch(
        "PRAGMA journal_mode=WAL;
         PRAGMA foreign_keys=ON;
         PRAGMA busy_timeout=5000;",
    )?;
    let applied = run_migrations(&conn)?;
    if applied > 0 {
        tracing::info!(applied, version = schema_version(&conn), "Database schema migrated");
    }
    Ok(conn)
}

/// Apply every migration newer than the stored version, each in its own
/// transaction. Returns how many ran.
pub fn run_migrations(conn: &Connection) -> Result<usize, DatabaseError> {
    let current = schema_version(conn);
    let mut applied = 0;

    for &(version, sql) in MIGRATIONS.iter().filter(|(v, _)| *v > current) {
        tracing::debug!(version, "Applying migration");
        let failed = |e: rusqlite::Error| DatabaseError::MigrationFailed {
            version,
            reason: e.to_string(),
        };
        let tx = conn.unchecked_transaction().map_err(failed)?;
        tx.execute_batch(sql).map_err(failed)?;
        tx.commit().map_err(failed)?;
        applied += 1;
    }

    Ok(applied)
}

/// Stored schema version; 0 before the first migration.
pub fn schema_version(conn: &Connection) -> i64 {
    conn.query_row("SELECT MAX(version) FROM schema_version", [], |row| {
        row.get::<_, Option<i64>>(0)
    })
    .ok()
    .flatten()
    .unwrap_or(0)
}
