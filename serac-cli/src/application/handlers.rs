//! One function per subcommand (§6). Each owns its own lock/index/store
//! lifetime — there is no shared session object, matching "no process-wide
//! singletons" (spec.md §9): every subsystem gets an explicit, freshly
//! built context value.

use std::path::{Path, PathBuf};

use serac_core::archiver::{self, ArchiveOptions};
use serac_core::error::Result;
use serac_core::index::IndexStore;
use serac_core::lock::IndexLock;
use serac_core::reconstruct::{filter_by_pattern, state_as_of};
use serac_core::{cancel::Cancellation, restore as restorer};

use crate::config::Config;
use crate::date;
use crate::store;

const EXIT_OK: i32 = 0;
const EXIT_PARTIAL: i32 = 3;

pub fn handle_test(config_path: &Path) -> Result<i32> {
    let config = Config::load(config_path)?;
    let object_store = store::open_store(&config.storage)?;
    // A nonsense name can never collide with a real content hash; a
    // reachable backend answers `false` here, an unreachable one errors.
    object_store.exists("serac-connectivity-probe")?;

    let _lock = IndexLock::acquire_shared(&config.index_path)?;
    let index = IndexStore::open(&config.index_path)?;
    index.verify_passphrase(&config.passphrase)?;

    println!("test: OK");
    Ok(EXIT_OK)
}

pub fn handle_init(config_path: &Path) -> Result<i32> {
    let config = Config::load(config_path)?;
    if let Some(parent) = config.index_path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    IndexStore::create_new(&config.index_path, &config.passphrase)?;
    println!("init: created index at {}", config.index_path.display());
    Ok(EXIT_OK)
}

pub fn handle_archive(config_path: &Path) -> Result<i32> {
    let config = Config::load(config_path)?;
    let _lock = IndexLock::acquire_exclusive(&config.index_path)?;
    let index = IndexStore::open(&config.index_path)?;
    let object_store = store::open_store(&config.storage)?;

    let scanner = archiver::scanner_from_paths(config.source.include.clone(), config.source.exclude.clone())?;
    let opts = ArchiveOptions {
        passphrase: config.passphrase.clone(),
        workers: archiver::DEFAULT_WORKERS,
    };
    let cancel = Cancellation::install();
    let now_ts = date::now_ts();

    let run = archiver::archive(&index, object_store.as_ref(), &scanner, &opts, now_ts, &cancel)?;
    println!(
        "archive: run #{} at {} — {} added, {} removed, {} bytes uploaded",
        run.id, run.ts, run.files_added, run.files_removed, run.bytes_uploaded
    );
    Ok(EXIT_OK)
}

pub fn handle_ls(config_path: &Path, at: Option<String>, pattern: Option<String>) -> Result<i32> {
    let config = Config::load(config_path)?;
    let _lock = IndexLock::acquire_shared(&config.index_path)?;
    let index = IndexStore::open(&config.index_path)?;

    let at_ts = match at {
        Some(raw) => date::parse_at(&raw)?,
        None => date::now_ts(),
    };
    let versions = state_as_of(&index, at_ts)?;
    let filtered = filter_by_pattern(&versions, pattern.as_deref());

    for fv in &filtered {
        println!(
            "{:o}  {:>8}  {}  {}/{}  {}",
            fv.mode,
            fv.size,
            fv.mtime,
            fv.owner,
            fv.group,
            fv.path
        );
    }
    Ok(EXIT_OK)
}

pub fn handle_restore(
    config_path: &Path,
    destination: &PathBuf,
    at: Option<String>,
    pattern: Option<String>,
) -> Result<i32> {
    let config = Config::load(config_path)?;
    let _lock = IndexLock::acquire_exclusive(&config.index_path)?;
    let index = IndexStore::open(&config.index_path)?;
    let object_store = store::open_store(&config.storage)?;
    index.verify_passphrase(&config.passphrase)?;

    let at_ts = match at {
        Some(raw) => date::parse_at(&raw)?,
        None => date::now_ts(),
    };
    let versions = state_as_of(&index, at_ts)?;
    let filtered = filter_by_pattern(&versions, pattern.as_deref());

    std::fs::create_dir_all(destination)?;
    let summary = restorer::restore(destination, &filtered, object_store.as_ref(), &config.passphrase)?;

    println!(
        "restore: {} restored, {} unchanged, {} pending retrieval, {} failed",
        summary.restored.len(),
        summary.skipped_unchanged.len(),
        summary.pending_retrieval.len(),
        summary.failed.len()
    );
    for path in &summary.pending_retrieval {
        eprintln!("pending retrieval: {path}");
    }
    for (path, err) in &summary.failed {
        eprintln!("failed: {path}: {err}");
    }

    if summary.is_clean() {
        Ok(EXIT_OK)
    } else {
        Ok(EXIT_PARTIAL)
    }
}
