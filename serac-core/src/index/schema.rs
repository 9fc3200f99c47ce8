use rusqlite::Connection;

use crate::error::{Result, SeracError};

pub fn init(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        r#"
        PRAGMA journal_mode = WAL;
        PRAGMA foreign_keys = ON;

        CREATE TABLE archive_runs (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            ts INTEGER NOT NULL,
            files_added INTEGER NOT NULL,
            files_removed INTEGER NOT NULL,
            bytes_uploaded INTEGER NOT NULL
        );

        CREATE TABLE file_versions (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            run_id INTEGER NOT NULL REFERENCES archive_runs(id),
            path TEXT NOT NULL,
            size INTEGER NOT NULL,
            mtime INTEGER NOT NULL,
            mode INTEGER NOT NULL,
            owner TEXT NOT NULL,
            grp TEXT NOT NULL,
            hash TEXT,
            is_symlink INTEGER NOT NULL DEFAULT 0
        );
        CREATE INDEX file_versions_path_run ON file_versions(path, run_id);

        CREATE TABLE meta (
            key TEXT PRIMARY KEY,
            value TEXT NOT NULL
        );
        "#,
    )?;
    Ok(())
}

/// Confirms a connection points at an already-initialized index, rather
/// than an arbitrary or empty SQLite file.
pub fn ensure_present(conn: &Connection) -> Result<()> {
    let count: i64 = conn.query_row(
        "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = 'archive_runs'",
        [],
        |row| row.get(0),
    )?;
    if count == 0 {
        return Err(SeracError::Config(
            "file exists but is not a serac index; run `init` first".into(),
        ));
    }
    Ok(())
}
