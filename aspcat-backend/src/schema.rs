//! SQLite schema for the relational backend.
//!
//! The hierarchy normalizes into `volumes`, `libraries`, and `objects`;
//! per-TYPE attributes live in six detail tables keyed 1:1 on `object_id`.
//! Deletes cascade downward, so removing an object drops its detail row
//! and removing a volume empties everything beneath it.

use std::path::Path;

use log::info;
use rusqlite::Connection;

use crate::contract::BackendError;

pub const SCHEMA_VERSION: i64 = 1;

const SCHEMA_SQL: &str = "
CREATE TABLE IF NOT EXISTS schema_version (
    version INTEGER NOT NULL
);

CREATE TABLE IF NOT EXISTS volumes (
    volume_id INTEGER PRIMARY KEY AUTOINCREMENT,
    volume_name TEXT NOT NULL UNIQUE,
    volume_path TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS libraries (
    library_id INTEGER PRIMARY KEY AUTOINCREMENT,
    volume_id INTEGER NOT NULL REFERENCES volumes(volume_id) ON DELETE CASCADE,
    library_name TEXT NOT NULL,
    library_path TEXT NOT NULL,
    UNIQUE (volume_id, library_name)
);

CREATE TABLE IF NOT EXISTS objects (
    object_id INTEGER PRIMARY KEY AUTOINCREMENT,
    volume_id INTEGER NOT NULL REFERENCES volumes(volume_id) ON DELETE CASCADE,
    library_id INTEGER NOT NULL REFERENCES libraries(library_id) ON DELETE CASCADE,
    object_name TEXT NOT NULL,
    object_type TEXT NOT NULL,
    file_size INTEGER,
    description TEXT,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL,
    UNIQUE (volume_id, library_id, object_name)
);

CREATE INDEX IF NOT EXISTS idx_objects_type ON objects(object_type);
CREATE INDEX IF NOT EXISTS idx_objects_updated ON objects(updated_at);

CREATE TABLE IF NOT EXISTS programs (
    object_id INTEGER PRIMARY KEY REFERENCES objects(object_id) ON DELETE CASCADE,
    pgm_type TEXT NOT NULL,
    encoding TEXT NOT NULL,
    compile_date TEXT
);

CREATE TABLE IF NOT EXISTS datasets (
    object_id INTEGER PRIMARY KEY REFERENCES objects(object_id) ON DELETE CASCADE,
    rec_type TEXT NOT NULL,
    rec_len INTEGER NOT NULL,
    encoding TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS maps (
    object_id INTEGER PRIMARY KEY REFERENCES objects(object_id) ON DELETE CASCADE,
    map_type TEXT NOT NULL,
    width INTEGER NOT NULL,
    height INTEGER NOT NULL
);

CREATE TABLE IF NOT EXISTS copybooks (
    object_id INTEGER PRIMARY KEY REFERENCES objects(object_id) ON DELETE CASCADE,
    copybook_type TEXT NOT NULL,
    encoding TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS jobs (
    object_id INTEGER PRIMARY KEY REFERENCES objects(object_id) ON DELETE CASCADE,
    job_type TEXT NOT NULL,
    schedule_info TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS layouts (
    object_id INTEGER PRIMARY KEY REFERENCES objects(object_id) ON DELETE CASCADE,
    layout_type TEXT NOT NULL,
    layout_data TEXT NOT NULL
);
";

/// Detail tables in a fixed order, for full clears.
pub const DETAIL_TABLES: [&str; 6] = [
    "programs",
    "datasets",
    "maps",
    "copybooks",
    "jobs",
    "layouts",
];

/// Open a database file, applying per-connection pragmas and creating the
/// schema when absent.
pub fn open_database(path: &Path) -> Result<Connection, BackendError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let conn = Connection::open(path)?;
    conn.pragma_update(None, "journal_mode", "WAL")?;
    configure(&conn)?;
    Ok(conn)
}

fn configure(conn: &Connection) -> Result<(), BackendError> {
    conn.pragma_update(None, "foreign_keys", "ON")?;
    match schema_version(conn)? {
        0 => {
            info!("creating catalog schema version {SCHEMA_VERSION}");
            create_schema(conn)?;
            Ok(())
        }
        v if v == SCHEMA_VERSION => Ok(()),
        v => Err(BackendError::Storage(format!(
            "database schema version {v} is newer than supported version {SCHEMA_VERSION}"
        ))),
    }
}

/// Create all tables and record the schema version. Idempotent.
pub fn create_schema(conn: &Connection) -> Result<(), BackendError> {
    conn.execute_batch(SCHEMA_SQL)?;
    if schema_version(conn)? == 0 {
        conn.execute(
            "INSERT INTO schema_version (version) VALUES (?1)",
            [SCHEMA_VERSION],
        )?;
    }
    Ok(())
}

/// The recorded schema version, or 0 for a fresh database.
pub fn schema_version(conn: &Connection) -> Result<i64, BackendError> {
    let table_exists: bool = conn.query_row(
        "SELECT EXISTS (SELECT 1 FROM sqlite_master WHERE type = 'table' AND name = 'schema_version')",
        [],
        |row| row.get(0),
    )?;
    if !table_exists {
        return Ok(0);
    }
    let version: Option<i64> =
        conn.query_row("SELECT MAX(version) FROM schema_version", [], |row| {
            row.get(0)
        })?;
    Ok(version.unwrap_or(0))
}
