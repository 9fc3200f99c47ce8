//! Orchestrates one `archive` invocation: Scanner -> Differ -> (crypto
//! envelope -> object store) + index store, committed transactionally
//! (§4.4). Hashing and uploads overlap across a bounded worker pool;
//! every index write happens on this coordinator, buffered until the
//! final transaction — mirrors the "plan everything, then write the
//! superblock last" discipline this crate already used for its
//! container format, generalized from one file to one transaction.

use std::fs;

use rayon::{ThreadPoolBuilder, prelude::*};

use crate::cancel::Cancellation;
use crate::crypto::envelope;
use crate::differ::{self, Change};
use crate::domain::{ArchiveRun, ScanEntry};
use crate::error::{Result, SeracError};
use crate::hash;
use crate::ids::IdResolver;
use crate::index::{ArchiveBuffer, IndexStore, PendingVersion};
use crate::scan::Scanner;
use crate::store::{ObjectStore, PutOutcome, with_retry};

/// Default bounded parallelism for scanning/hashing/upload I/O (§5).
pub const DEFAULT_WORKERS: usize = 4;

pub struct ArchiveOptions {
    pub passphrase: String,
    pub workers: usize,
}

impl Default for ArchiveOptions {
    fn default() -> Self {
        Self {
            passphrase: String::new(),
            workers: DEFAULT_WORKERS,
        }
    }
}

/// Outcome of hashing+uploading one changed/new path, computed off the
/// coordinator thread. Carries everything the coordinator needs to
/// buffer a `PendingVersion` without touching the filesystem again.
struct Uploaded {
    path: String,
    size: u64,
    mtime: i64,
    mode: u32,
    owner: String,
    group: String,
    hash: String,
    is_symlink: bool,
    uploaded_bytes: u64,
}

/// Reads the plaintext this path's content hash is computed over: file
/// bytes for a regular file, the link target string for a symlink (§4.3
/// records symlinks by path without following them; see `domain::ScanEntry`
/// for why the target string stands in as "content" here).
fn read_plaintext(entry: &ScanEntry) -> Result<Vec<u8>> {
    if entry.is_symlink {
        let target = fs::read_link(&entry.path)?;
        return Ok(target.to_string_lossy().into_owned().into_bytes());
    }
    fs::read(&entry.path)
}

fn hash_and_upload(
    entry: &ScanEntry,
    store: &dyn ObjectStore,
    passphrase: &str,
) -> Result<Uploaded> {
    let plaintext = read_plaintext(entry).map_err(|e| SeracError::Scan {
        path: entry.path.clone(),
        source: match e {
            SeracError::Io(io) => io,
            other => std::io::Error::other(other.to_string()),
        },
    })?;
    let content_hash = hash::hex_digest(&plaintext);

    let already_present = with_retry(|| store.exists(&content_hash), is_transient)?;
    let mut uploaded_bytes = 0u64;
    if !already_present {
        let mut envelope_bytes = Vec::new();
        envelope::encrypt(&plaintext, passphrase, &mut envelope_bytes)?;
        let outcome = with_retry(
            || store.put(&content_hash, &envelope_bytes),
            is_transient,
        )?;
        if outcome == PutOutcome::Written {
            uploaded_bytes = envelope_bytes.len() as u64;
        }
    }

    Ok(Uploaded {
        path: entry.path.clone(),
        size: entry.size,
        mtime: entry.mtime,
        mode: entry.mode,
        owner: entry.owner.clone(),
        group: entry.group.clone(),
        hash: content_hash,
        is_symlink: entry.is_symlink,
        uploaded_bytes,
    })
}

/// Only `Store` errors are worth retrying here: a backend adapter has
/// already collapsed its own transient/permanent distinction
/// (`store::StoreError::is_transient`) by the time it hands back a
/// `SeracError::Store`, so anything else (config, crypto, I/O) is
/// retry-proof and should fail the run immediately.
fn is_transient(err: &SeracError) -> bool {
    matches!(err, SeracError::Store(_))
}

/// Runs one archive invocation against `index`/`store`, scanning the
/// paths `scanner` enumerates. `now_ts` is the wall-clock run start
/// (seconds since epoch, UTC) — passed in rather than read from the
/// clock here so callers (and tests) control it directly.
pub fn archive(
    index: &IndexStore,
    store: &dyn ObjectStore,
    scanner: &Scanner,
    opts: &ArchiveOptions,
    now_ts: i64,
    cancel: &Cancellation,
) -> Result<ArchiveRun> {
    index.verify_passphrase(&opts.passphrase)?;

    let latest = index.latest_versions()?;
    let resolver = IdResolver::load();
    let scan = scanner.scan(&resolver);

    if cancel.is_cancelled() {
        return Err(SeracError::Config("archive cancelled before scan completed".into()));
    }

    let changes = differ::diff(&scan, &latest);

    let to_upload: Vec<&ScanEntry> = changes
        .iter()
        .filter_map(|(_, change)| match change {
            Change::New(entry) => Some(*entry),
            Change::Changed { entry, rehash: true } => Some(*entry),
            _ => None,
        })
        .collect();

    let pool = ThreadPoolBuilder::new()
        .num_threads(opts.workers.max(1))
        .build()
        .map_err(|e| SeracError::Config(format!("failed to start worker pool: {e}")))?;

    let uploaded: Vec<Result<Uploaded>> = pool.install(|| {
        to_upload
            .par_iter()
            .map(|entry| {
                if cancel.is_cancelled() {
                    return Err(SeracError::Config("archive cancelled".into()));
                }
                hash_and_upload(entry, store, &opts.passphrase)
            })
            .collect()
    });

    if cancel.is_cancelled() {
        return Err(SeracError::Config("archive cancelled before commit".into()));
    }

    let mut by_path: std::collections::HashMap<String, Uploaded> = std::collections::HashMap::new();
    for result in uploaded {
        let u = result?;
        by_path.insert(u.path.clone(), u);
    }

    let mut buffer = ArchiveBuffer::new();

    for (path, change) in &changes {
        match change {
            Change::New(_) | Change::Changed { rehash: true, .. } => {
                let u = by_path
                    .remove(*path)
                    .expect("every New/rehash entry was uploaded above");
                buffer.record_added(u.uploaded_bytes);
                buffer.push(PendingVersion {
                    path: u.path,
                    size: u.size,
                    mtime: u.mtime,
                    mode: u.mode,
                    owner: u.owner,
                    group: u.group,
                    hash: Some(u.hash),
                    is_symlink: u.is_symlink,
                });
            }
            Change::Changed { entry, rehash: false } => {
                let fv = latest.get(*path).expect("path exists in latest state");
                buffer.push(PendingVersion {
                    path: entry.path.clone(),
                    size: entry.size,
                    mtime: entry.mtime,
                    mode: entry.mode,
                    owner: entry.owner.clone(),
                    group: entry.group.clone(),
                    hash: fv.hash.clone(),
                    is_symlink: entry.is_symlink,
                });
            }
            Change::Unchanged => {}
            Change::Deleted => {
                buffer.record_removed();
                buffer.push(PendingVersion {
                    path: path.to_string(),
                    size: 0,
                    mtime: 0,
                    mode: 0,
                    owner: String::new(),
                    group: String::new(),
                    hash: None,
                    is_symlink: false,
                });
            }
        }
    }

    index.commit_archive(now_ts, buffer)
}

/// Builds the default `ObjectStore`-independent parts (scanner excludes,
/// worker count) from already-validated config values. Kept here rather
/// than in `serac-cli` only because it is pure data shaping with no I/O;
/// actual config *parsing* remains the CLI's job.
pub fn scanner_from_paths(includes: Vec<std::path::PathBuf>, excludes: Vec<String>) -> Result<Scanner> {
    let rules = excludes
        .iter()
        .map(|p| crate::scan::ExcludeRule::literal(p))
        .collect::<Result<Vec<_>>>()?;
    Ok(Scanner::new(includes, rules))
}
