//! The durable, transactional record of archive runs and per-path file
//! versions. A single SQLite file provides ACID commits; the schema is the
//! one described in the data model (`archive_runs`, `file_versions`, plus
//! a small `meta` table for the crypto version and a passphrase canary).
//!
//! Grounded in the pack's own `rusqlite`-based repository layer
//! (connection-per-call, explicit `init_schema`, hand-written row mapping)
//! rather than an ORM, since the schema here is small and fixed.

mod schema;

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use rusqlite::{Connection, OptionalExtension, params};

use crate::crypto::envelope;
use crate::domain::{ArchiveRun, FileVersion};
use crate::error::{Result, SeracError};

const CANARY_PLAINTEXT: &[u8] = b"serac-passphrase-canary-v1";

pub struct IndexStore {
    path: PathBuf,
}

/// One not-yet-committed `FileVersion` row, buffered by the coordinator
/// while blobs upload. Carries no run id yet — that is assigned once, at
/// commit time, by `IndexStore::commit_archive`.
#[derive(Clone, Debug)]
pub struct PendingVersion {
    pub path: String,
    pub size: u64,
    pub mtime: i64,
    pub mode: u32,
    pub owner: String,
    pub group: String,
    pub hash: Option<String>,
    pub is_symlink: bool,
}

/// The coordinator's in-memory buffer for one archive run. Nothing here
/// touches the index until `IndexStore::commit_archive` runs — per the
/// commit discipline, every referenced blob must already be durable in
/// the object store before that call is made.
#[derive(Default)]
pub struct ArchiveBuffer {
    pending: Vec<PendingVersion>,
    files_added: u64,
    files_removed: u64,
    bytes_uploaded: u64,
}

impl ArchiveBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, version: PendingVersion) {
        self.pending.push(version);
    }

    pub fn record_added(&mut self, bytes_uploaded: u64) {
        self.files_added += 1;
        self.bytes_uploaded += bytes_uploaded;
    }

    pub fn record_removed(&mut self) {
        self.files_removed += 1;
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }
}

impl IndexStore {
    /// Creates a fresh index at `path`. Fails if a file already exists
    /// there, per the `init` subcommand's contract.
    pub fn create_new(path: &Path, passphrase: &str) -> Result<Self> {
        if path.exists() {
            return Err(SeracError::Config(format!(
                "index already exists at {}",
                path.display()
            )));
        }
        let conn = Connection::open(path)?;
        schema::init(&conn)?;

        let mut canary = Vec::new();
        envelope::encrypt(CANARY_PLAINTEXT, passphrase, &mut canary)?;
        conn.execute(
            "INSERT INTO meta(key, value) VALUES ('schema_version', '1'), ('crypto_version', ?1)",
            params![envelope::VERSION.to_string()],
        )?;
        conn.execute(
            "INSERT INTO meta(key, value) VALUES ('passphrase_canary', ?1)",
            params![hex::encode(&canary)],
        )?;

        Ok(Self {
            path: path.to_path_buf(),
        })
    }

    /// Opens an existing, already-initialized index.
    pub fn open(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(SeracError::Config(format!(
                "no index at {}; run `serac CONFIG init` first",
                path.display()
            )));
        }
        let conn = Connection::open(path)?;
        schema::ensure_present(&conn)?;
        Ok(Self {
            path: path.to_path_buf(),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn connect(&self) -> Result<Connection> {
        let conn = Connection::open(&self.path)?;
        conn.execute_batch("PRAGMA foreign_keys = ON; PRAGMA busy_timeout = 30000;")?;
        Ok(conn)
    }

    /// Verifies `passphrase` against the repository's canary envelope
    /// without touching any archived blob. Used by `test` and as a
    /// pre-flight check before `archive`/`restore`.
    pub fn verify_passphrase(&self, passphrase: &str) -> Result<()> {
        let conn = self.connect()?;
        let hex_canary: String = conn.query_row(
            "SELECT value FROM meta WHERE key = 'passphrase_canary'",
            [],
            |row| row.get(0),
        )?;
        let bytes = hex::decode(hex_canary)
            .map_err(|e| SeracError::Crypto(format!("corrupt canary: {e}")))?;
        let plain = envelope::decrypt(&mut &bytes[..], passphrase, "passphrase canary")?;
        if plain != CANARY_PLAINTEXT {
            return Err(SeracError::Integrity("passphrase canary".into()));
        }
        Ok(())
    }

    /// For each path, the single most recent `FileVersion` — including
    /// `DELETED` markers — ordered by run id. This is the "latest-known
    /// state" the differ compares a scan against.
    pub fn latest_versions(&self) -> Result<BTreeMap<String, FileVersion>> {
        let conn = self.connect()?;
        let mut stmt = conn.prepare(
            "SELECT fv.id, fv.run_id, fv.path, fv.size, fv.mtime, fv.mode, fv.owner, fv.grp, fv.hash, fv.is_symlink
             FROM file_versions fv
             INNER JOIN (
                 SELECT path, MAX(run_id) AS max_run FROM file_versions GROUP BY path
             ) latest ON latest.path = fv.path AND latest.max_run = fv.run_id",
        )?;
        let rows = stmt
            .query_map([], row_to_file_version)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(rows.into_iter().map(|fv| (fv.path.clone(), fv)).collect())
    }

    /// All archive runs, oldest first.
    pub fn runs(&self) -> Result<Vec<ArchiveRun>> {
        let conn = self.connect()?;
        let mut stmt = conn.prepare(
            "SELECT id, ts, files_added, files_removed, bytes_uploaded FROM archive_runs ORDER BY id ASC",
        )?;
        let rows = stmt
            .query_map([], |row| {
                Ok(ArchiveRun {
                    id: row.get(0)?,
                    ts: row.get(1)?,
                    files_added: row.get::<_, i64>(2)? as u64,
                    files_removed: row.get::<_, i64>(3)? as u64,
                    bytes_uploaded: row.get::<_, i64>(4)? as u64,
                })
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    /// The latest `FileVersion` per path among rows with `run_id <=
    /// as_of_run`, excluding `DELETED` markers. This is the core of
    /// point-in-time reconstruction (§4.5): visibility as of a run, not a
    /// raw timestamp — the caller resolves T to a run id first.
    pub fn versions_as_of(&self, as_of_run: i64) -> Result<Vec<FileVersion>> {
        let conn = self.connect()?;
        let mut stmt = conn.prepare(
            "SELECT fv.id, fv.run_id, fv.path, fv.size, fv.mtime, fv.mode, fv.owner, fv.grp, fv.hash, fv.is_symlink
             FROM file_versions fv
             INNER JOIN (
                 SELECT path, MAX(run_id) AS max_run FROM file_versions
                 WHERE run_id <= ?1 GROUP BY path
             ) latest ON latest.path = fv.path AND latest.max_run = fv.run_id
             WHERE fv.run_id <= ?1 AND fv.hash IS NOT NULL
             ORDER BY fv.path ASC",
        )?;
        let rows = stmt
            .query_map(params![as_of_run], row_to_file_version)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    /// The id of the newest run with `ts <= at`, or `None` if `at`
    /// precedes every run (§4.5 edge case: empty result).
    pub fn run_at_or_before(&self, at: i64) -> Result<Option<i64>> {
        let conn = self.connect()?;
        conn.query_row(
            "SELECT id FROM archive_runs WHERE ts <= ?1 ORDER BY ts DESC, id DESC LIMIT 1",
            params![at],
            |row| row.get(0),
        )
        .optional()
        .map_err(SeracError::from)
    }

    /// Commits one archive run: inserts the `ArchiveRun` row and every
    /// buffered `FileVersion` in a single transaction. The archiver only
    /// calls this after every new blob referenced by `buffer` has been
    /// confirmed durable in the object store (§4.4 commit discipline) —
    /// a crash before this call leaves the index untouched.
    pub fn commit_archive(&self, ts: i64, buffer: ArchiveBuffer) -> Result<ArchiveRun> {
        let mut conn = self.connect()?;
        let txn = conn.transaction()?;

        if let Some(last_ts) = txn
            .query_row("SELECT MAX(ts) FROM archive_runs", [], |row| {
                row.get::<_, Option<i64>>(0)
            })?
        {
            if ts <= last_ts {
                return Err(SeracError::Config(
                    "archive run timestamps must strictly increase".into(),
                ));
            }
        }

        txn.execute(
            "INSERT INTO archive_runs(ts, files_added, files_removed, bytes_uploaded)
             VALUES (?1, ?2, ?3, ?4)",
            params![
                ts,
                buffer.files_added as i64,
                buffer.files_removed as i64,
                buffer.bytes_uploaded as i64
            ],
        )?;
        let run_id = txn.last_insert_rowid();

        {
            let mut stmt = txn.prepare(
                "INSERT INTO file_versions(run_id, path, size, mtime, mode, owner, grp, hash, is_symlink)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
            )?;
            for v in &buffer.pending {
                stmt.execute(params![
                    run_id,
                    v.path,
                    v.size as i64,
                    v.mtime,
                    v.mode,
                    v.owner,
                    v.group,
                    v.hash,
                    v.is_symlink
                ])?;
            }
        }

        txn.commit()?;

        Ok(ArchiveRun {
            id: run_id,
            ts,
            files_added: buffer.files_added,
            files_removed: buffer.files_removed,
            bytes_uploaded: buffer.bytes_uploaded,
        })
    }
}

fn row_to_file_version(row: &rusqlite::Row) -> rusqlite::Result<FileVersion> {
    Ok(FileVersion {
        id: row.get(0)?,
        run_id: row.get(1)?,
        path: row.get(2)?,
        size: row.get::<_, i64>(3)? as u64,
        mtime: row.get(4)?,
        mode: row.get::<_, i64>(5)? as u32,
        owner: row.get(6)?,
        group: row.get(7)?,
        hash: row.get(8)?,
        is_symlink: row.get(9)?,
    })
}
