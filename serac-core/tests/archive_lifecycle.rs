//! End-to-end exercise of the scenarios from spec.md §8 (S1-S6): scan,
//! diff, archive, point-in-time `ls`, and `restore`, all against a real
//! tempdir source tree and a tempdir-backed `ObjectStore`.

use std::collections::HashMap;
use std::fs;
use std::sync::Mutex;

use serac_core::archiver::{self, ArchiveOptions};
use serac_core::cancel::Cancellation;
use serac_core::hash;
use serac_core::index::IndexStore;
use serac_core::reconstruct::{filter_by_pattern, state_as_of};
use serac_core::restore::restore;
use serac_core::store::{ObjectStore, PutOutcome, RetrievalHandle};

const PASSPHRASE: &str = "correct horse battery staple";

/// A content-addressed, in-memory `ObjectStore`, standing in for the
/// local-disk/S3 adapters that live in `serac-cli`. Good enough to
/// exercise every invariant the core itself owns (dedup, idempotent put,
/// tamper detection).
struct MemStore(Mutex<HashMap<String, Vec<u8>>>);

impl MemStore {
    fn new() -> Self {
        Self(Mutex::new(HashMap::new()))
    }

    fn put_count(&self) -> usize {
        self.0.lock().unwrap().len()
    }

    /// Flips one bit of a stored object in place, simulating bit rot or
    /// an adversary tampering with cold storage (spec.md §8 property 6).
    fn tamper(&self, name: &str) {
        let mut map = self.0.lock().unwrap();
        if let Some(bytes) = map.get_mut(name) {
            let last = bytes.len() - 1;
            bytes[last] ^= 0x01;
        }
    }
}

impl ObjectStore for MemStore {
    fn put(&self, name: &str, bytes: &[u8]) -> serac_core::Result<PutOutcome> {
        let mut map = self.0.lock().unwrap();
        if map.contains_key(name) {
            return Ok(PutOutcome::AlreadyExists);
        }
        map.insert(name.to_string(), bytes.to_vec());
        Ok(PutOutcome::Written)
    }

    fn get(&self, name: &str) -> serac_core::Result<Box<dyn std::io::Read + Send>> {
        let map = self.0.lock().unwrap();
        let bytes = map
            .get(name)
            .cloned()
            .ok_or_else(|| serac_core::SeracError::Store(format!("{name} not found")))?;
        Ok(Box::new(std::io::Cursor::new(bytes)))
    }

    fn exists(&self, name: &str) -> serac_core::Result<bool> {
        Ok(self.0.lock().unwrap().contains_key(name))
    }

    fn request_retrieval(&self, name: &str) -> serac_core::Result<RetrievalHandle> {
        Ok(RetrievalHandle {
            name: name.to_string(),
            eta: Some(std::time::Duration::ZERO),
        })
    }
}

fn run_archive(index: &IndexStore, store: &MemStore, src: &std::path::Path, ts: i64) -> serac_core::domain::ArchiveRun {
    let scanner = archiver::scanner_from_paths(vec![src.to_path_buf()], vec![]).unwrap();
    let opts = ArchiveOptions {
        passphrase: PASSPHRASE.to_string(),
        workers: 2,
    };
    archiver::archive(index, store, &scanner, &opts, ts, &Cancellation::none()).unwrap()
}

#[test]
fn s1_two_identical_files_dedupe_to_one_object() {
    let src = tempfile::tempdir().unwrap();
    let idx_path = tempfile::NamedTempFile::new().unwrap().path().to_path_buf();
    fs::write(src.path().join("a.txt"), "hello").unwrap();
    fs::write(src.path().join("b.txt"), "hello").unwrap();

    let index = IndexStore::create_new(&idx_path, PASSPHRASE).unwrap();
    let store = MemStore::new();
    let run = run_archive(&index, &store, src.path(), 1_000);

    assert_eq!(run.files_added, 2);
    assert_eq!(store.put_count(), 1, "identical content must dedupe to one object");

    let latest = index.latest_versions().unwrap();
    assert_eq!(latest.len(), 2);
    let hash = hash::hex_digest(b"hello");
    for fv in latest.values() {
        assert_eq!(fv.hash.as_deref(), Some(hash.as_str()));
    }
}

#[test]
fn s2_modifying_a_file_adds_one_version_and_one_object() {
    let src = tempfile::tempdir().unwrap();
    let idx_path = tempfile::NamedTempFile::new().unwrap().path().to_path_buf();
    fs::write(src.path().join("a.txt"), "hello").unwrap();
    fs::write(src.path().join("b.txt"), "hello").unwrap();

    let index = IndexStore::create_new(&idx_path, PASSPHRASE).unwrap();
    let store = MemStore::new();
    run_archive(&index, &store, src.path(), 1_000);

    // Force a distinct mtime so the differ's fast path doesn't just see
    // "same size, same mtime" and skip the rehash.
    std::thread::sleep(std::time::Duration::from_millis(1100));
    fs::write(src.path().join("a.txt"), "world").unwrap();
    let run2 = run_archive(&index, &store, src.path(), 2_000);

    assert_eq!(run2.files_added, 1, "only a.txt's new content should count as added");
    assert_eq!(store.put_count(), 2);
}

#[test]
fn s2_modifying_a_file_updates_its_hash() {
    let src = tempfile::tempdir().unwrap();
    let idx_path = tempfile::NamedTempFile::new().unwrap().path().to_path_buf();
    let a_path = src.path().join("a.txt");
    fs::write(&a_path, "hello").unwrap();

    let index = IndexStore::create_new(&idx_path, PASSPHRASE).unwrap();
    let store = MemStore::new();
    run_archive(&index, &store, src.path(), 1_000);

    std::thread::sleep(std::time::Duration::from_millis(1100));
    fs::write(&a_path, "world").unwrap();
    run_archive(&index, &store, src.path(), 2_000);

    let latest = index.latest_versions().unwrap();
    let key = a_path.to_string_lossy().to_string();
    let fv = latest.get(&key).expect("a.txt should be tracked");
    assert_eq!(fv.hash.as_deref(), Some(hash::hex_digest(b"world").as_str()));
}

#[test]
fn s3_deleting_a_file_records_a_deleted_marker_without_new_objects() {
    let src = tempfile::tempdir().unwrap();
    let idx_path = tempfile::NamedTempFile::new().unwrap().path().to_path_buf();
    let b_path = src.path().join("b.txt");
    fs::write(src.path().join("a.txt"), "hello").unwrap();
    fs::write(&b_path, "hello").unwrap();

    let index = IndexStore::create_new(&idx_path, PASSPHRASE).unwrap();
    let store = MemStore::new();
    run_archive(&index, &store, src.path(), 1_000);

    fs::remove_file(&b_path).unwrap();
    let run2 = run_archive(&index, &store, src.path(), 2_000);

    assert_eq!(run2.files_removed, 1);
    assert_eq!(store.put_count(), 1, "deletion must not touch the object store");

    let latest = index.latest_versions().unwrap();
    let key = b_path.to_string_lossy().to_string();
    assert!(latest[&key].is_deleted());
}

#[test]
fn s4_ls_at_each_run_reflects_visibility_at_that_instant() {
    let src = tempfile::tempdir().unwrap();
    let idx_path = tempfile::NamedTempFile::new().unwrap().path().to_path_buf();
    let a_path = src.path().join("a.txt");
    let b_path = src.path().join("b.txt");
    fs::write(&a_path, "hello").unwrap();
    fs::write(&b_path, "hello").unwrap();

    let index = IndexStore::create_new(&idx_path, PASSPHRASE).unwrap();
    let store = MemStore::new();
    let run1 = run_archive(&index, &store, src.path(), 1_000);

    std::thread::sleep(std::time::Duration::from_millis(1100));
    fs::write(&a_path, "world").unwrap();
    fs::remove_file(&b_path).unwrap();
    let run3 = run_archive(&index, &store, src.path(), 3_000);

    let at_run1 = state_as_of(&index, run1.ts).unwrap();
    assert_eq!(at_run1.len(), 2, "both files visible right after run 1");

    let at_run3 = state_as_of(&index, run3.ts).unwrap();
    assert_eq!(at_run3.len(), 1, "only a.txt visible after b.txt is deleted");
    assert_eq!(at_run3[0].hash.as_deref(), Some(hash::hex_digest(b"world").as_str()));
}

#[test]
fn s5_restore_at_first_run_reproduces_original_bytes() {
    let src = tempfile::tempdir().unwrap();
    let dst = tempfile::tempdir().unwrap();
    let idx_path = tempfile::NamedTempFile::new().unwrap().path().to_path_buf();
    fs::write(src.path().join("a.txt"), "hello").unwrap();
    fs::write(src.path().join("b.txt"), "hello").unwrap();

    let index = IndexStore::create_new(&idx_path, PASSPHRASE).unwrap();
    let store = MemStore::new();
    let run1 = run_archive(&index, &store, src.path(), 1_000);

    let versions = state_as_of(&index, run1.ts).unwrap();
    let filtered = filter_by_pattern(&versions, None);
    let summary = restore(dst.path(), &filtered, &store, PASSPHRASE).unwrap();
    assert!(summary.is_clean());

    let a_rel = src.path().join("a.txt").to_string_lossy().trim_start_matches('/').to_string();
    let b_rel = src.path().join("b.txt").to_string_lossy().trim_start_matches('/').to_string();
    assert_eq!(fs::read(dst.path().join(a_rel)).unwrap(), b"hello");
    assert_eq!(fs::read(dst.path().join(b_rel)).unwrap(), b"hello");
}

#[test]
fn s6_restore_with_pattern_after_deletion_restores_nothing() {
    let src = tempfile::tempdir().unwrap();
    let dst = tempfile::tempdir().unwrap();
    let idx_path = tempfile::NamedTempFile::new().unwrap().path().to_path_buf();
    let b_path = src.path().join("b.txt");
    fs::write(src.path().join("a.txt"), "hello").unwrap();
    fs::write(&b_path, "hello").unwrap();

    let index = IndexStore::create_new(&idx_path, PASSPHRASE).unwrap();
    let store = MemStore::new();
    run_archive(&index, &store, src.path(), 1_000);
    fs::remove_file(&b_path).unwrap();
    let run2 = run_archive(&index, &store, src.path(), 2_000);

    let versions = state_as_of(&index, run2.ts).unwrap();
    let pattern = b_path.to_string_lossy().to_string();
    let filtered = filter_by_pattern(&versions, Some(&pattern));
    assert!(filtered.is_empty());

    let summary = restore(dst.path(), &filtered, &store, PASSPHRASE).unwrap();
    assert!(summary.restored.is_empty());
    assert!(summary.is_clean());
}

#[test]
fn tamper_detection_fails_only_the_affected_file() {
    let src = tempfile::tempdir().unwrap();
    let dst = tempfile::tempdir().unwrap();
    let idx_path = tempfile::NamedTempFile::new().unwrap().path().to_path_buf();
    fs::write(src.path().join("a.txt"), "hello").unwrap();
    fs::write(src.path().join("b.txt"), "world").unwrap();

    let index = IndexStore::create_new(&idx_path, PASSPHRASE).unwrap();
    let store = MemStore::new();
    let run1 = run_archive(&index, &store, src.path(), 1_000);

    store.tamper(&hash::hex_digest(b"hello"));

    let versions = state_as_of(&index, run1.ts).unwrap();
    let filtered = filter_by_pattern(&versions, None);
    let summary = restore(dst.path(), &filtered, &store, PASSPHRASE).unwrap();

    assert_eq!(summary.failed.len(), 1);
    assert_eq!(summary.restored.len(), 1);
    assert!(!summary.is_clean());
}

#[test]
fn idempotent_archive_adds_nothing_on_second_run_with_no_changes() {
    let src = tempfile::tempdir().unwrap();
    let idx_path = tempfile::NamedTempFile::new().unwrap().path().to_path_buf();
    fs::write(src.path().join("a.txt"), "hello").unwrap();

    let index = IndexStore::create_new(&idx_path, PASSPHRASE).unwrap();
    let store = MemStore::new();
    run_archive(&index, &store, src.path(), 1_000);

    let before = index.latest_versions().unwrap().len();
    let run2 = run_archive(&index, &store, src.path(), 2_000);
    let after = index.latest_versions().unwrap().len();

    assert_eq!(run2.files_added, 0);
    assert_eq!(run2.files_removed, 0);
    assert_eq!(before, after, "no new FileVersion rows on an unchanged tree");
}
