//! Materializes reconstructed state onto disk (§4.6): skip-if-unchanged,
//! fetch + decrypt + write otherwise, then reapply mode/mtime/owner/group.
//! A decrypt failure is fatal for that one file, never for the whole run;
//! cold-storage objects that aren't immediately retrievable go on a
//! pending list instead of blocking.

use std::fs;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::crypto::envelope;
use crate::domain::FileVersion;
use crate::error::Result;
use crate::hash;
use crate::ids::IdResolver;
use crate::store::ObjectStore;

#[derive(Debug, Default)]
pub struct RestoreSummary {
    pub restored: Vec<String>,
    pub skipped_unchanged: Vec<String>,
    /// Paths whose blob is in cold storage and was not immediately
    /// retrievable; a `request_retrieval` call was issued for each.
    pub pending_retrieval: Vec<String>,
    /// Path -> error message, for files that failed decryption or I/O.
    pub failed: Vec<(String, String)>,
}

impl RestoreSummary {
    /// §6: restore exits 0 on full success, 3 when any file failed or is
    /// pending cold-storage retrieval, independent of everything else
    /// that aborts the run outright with a non-`RestoreSummary` error.
    pub fn is_clean(&self) -> bool {
        self.failed.is_empty() && self.pending_retrieval.is_empty()
    }
}

/// Restores every `version` under `destination`, using `destination /
/// original_path` joined as a relative path (the recorded path's leading
/// separator is stripped so it composes under an arbitrary destination
/// root rather than being treated as absolute).
pub fn restore(
    destination: &Path,
    versions: &[&FileVersion],
    store: &dyn ObjectStore,
    passphrase: &str,
) -> Result<RestoreSummary> {
    let resolver = IdResolver::load();
    let mut summary = RestoreSummary::default();

    for version in versions {
        match restore_one(destination, version, store, passphrase, &resolver) {
            Ok(Outcome::Restored) => summary.restored.push(version.path.clone()),
            Ok(Outcome::SkippedUnchanged) => summary.skipped_unchanged.push(version.path.clone()),
            Ok(Outcome::PendingRetrieval) => summary.pending_retrieval.push(version.path.clone()),
            Err(e) => summary.failed.push((version.path.clone(), e.to_string())),
        }
    }

    Ok(summary)
}

enum Outcome {
    Restored,
    SkippedUnchanged,
    PendingRetrieval,
}

fn restore_one(
    destination: &Path,
    version: &FileVersion,
    store: &dyn ObjectStore,
    passphrase: &str,
    resolver: &IdResolver,
) -> Result<Outcome> {
    let hash = version
        .hash
        .as_ref()
        .expect("reconstructed state never includes DELETED markers");
    let dest_path = join_under(destination, &version.path);

    if already_matches(&dest_path, hash, version.is_symlink) {
        return Ok(Outcome::SkippedUnchanged);
    }

    let handle = store.request_retrieval(hash)?;
    if handle.eta != Some(Duration::ZERO) {
        return Ok(Outcome::PendingRetrieval);
    }

    let mut reader = store.get(hash)?;
    let mut envelope_bytes = Vec::new();
    reader.read_to_end(&mut envelope_bytes)?;
    let plaintext = envelope::decrypt(&mut &envelope_bytes[..], passphrase, &version.path)?;

    if let Some(parent) = dest_path.parent() {
        fs::create_dir_all(parent)?;
    }
    write_content(&dest_path, &plaintext, version.is_symlink)?;
    apply_metadata(&dest_path, version, resolver);

    Ok(Outcome::Restored)
}

fn join_under(destination: &Path, recorded_path: &str) -> PathBuf {
    let relative = recorded_path.trim_start_matches('/');
    destination.join(relative)
}

/// Writes reconstructed content at `dest_path`: a regular file for
/// ordinary paths, or (§4.3) a symlink pointing at `plaintext` decoded as
/// the recorded link target when `is_symlink` is set. Any pre-existing
/// entry at `dest_path` — file or symlink — is removed first, since
/// `std::os::unix::fs::symlink` refuses to overwrite.
fn write_content(dest_path: &Path, plaintext: &[u8], is_symlink: bool) -> Result<()> {
    if is_symlink {
        if fs::symlink_metadata(dest_path).is_ok() {
            fs::remove_file(dest_path)?;
        }
        let target = String::from_utf8_lossy(plaintext).into_owned();
        symlink_at(&target, dest_path)?;
        return Ok(());
    }
    fs::write(dest_path, plaintext)?;
    Ok(())
}

#[cfg(unix)]
fn symlink_at(target: &str, dest_path: &Path) -> Result<()> {
    std::os::unix::fs::symlink(target, dest_path)?;
    Ok(())
}

#[cfg(not(unix))]
fn symlink_at(target: &str, dest_path: &Path) -> Result<()> {
    tracing::warn!(
        path = %dest_path.display(),
        "symlinks are not supported on this platform; writing link target as plain text"
    );
    fs::write(dest_path, target.as_bytes())?;
    Ok(())
}

fn already_matches(dest_path: &Path, expected_hash: &str, is_symlink: bool) -> bool {
    if is_symlink {
        let Ok(target) = fs::read_link(dest_path) else {
            return false;
        };
        return hash::hex_digest(target.to_string_lossy().as_bytes()) == expected_hash;
    }
    let Ok(meta) = fs::symlink_metadata(dest_path) else {
        return false;
    };
    if meta.file_type().is_symlink() {
        return false;
    }
    let Ok(bytes) = fs::read(dest_path) else {
        return false;
    };
    hash::hex_digest(&bytes) == expected_hash
}

#[cfg(unix)]
fn apply_metadata(path: &Path, version: &FileVersion, resolver: &IdResolver) {
    use std::os::unix::fs::PermissionsExt;

    // A symlink has no permission bits of its own to chmod; only its
    // ownership and timestamps are restorable, and both must be applied
    // without following the link onto its target.
    if !version.is_symlink {
        if let Err(e) = fs::set_permissions(path, fs::Permissions::from_mode(version.mode)) {
            tracing::warn!(path = %path.display(), error = %e, "failed to set mode");
        }
    }

    let uid = resolver.uid_for(&version.owner);
    let gid = resolver.gid_for(&version.group);
    let (uid, gid) = match (uid, gid) {
        (Some(u), Some(g)) => (Some(u), Some(g)),
        _ => {
            tracing::warn!(
                path = %path.display(),
                owner = %version.owner,
                group = %version.group,
                fallback = %crate::ids::invoking_user(),
                "owner/group not found on this system; falling back to invoking user"
            );
            (None, None)
        }
    };
    let uid = uid.map(nix::unistd::Uid::from_raw);
    let gid = gid.map(nix::unistd::Gid::from_raw);
    if let Err(e) = nix::unistd::fchownat(
        None,
        path,
        uid,
        gid,
        nix::unistd::FchownatFlags::NoFollowSymlink,
    ) {
        tracing::warn!(path = %path.display(), error = %e, "failed to set owner/group");
    }

    let mtime = nix::sys::time::TimeSpec::new(version.mtime, 0);
    if let Err(e) = nix::sys::stat::utimensat(
        None,
        path,
        &mtime,
        &mtime,
        nix::sys::stat::UtimensatFlags::NoFollowSymlink,
    ) {
        tracing::warn!(path = %path.display(), error = %e, "failed to set mtime");
    }
}

#[cfg(not(unix))]
fn apply_metadata(_path: &Path, _version: &FileVersion, _resolver: &IdResolver) {}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{PutOutcome, RetrievalHandle};
    use std::collections::HashMap;
    use std::sync::Mutex;

    struct MemStore(Mutex<HashMap<String, Vec<u8>>>);

    impl ObjectStore for MemStore {
        fn put(&self, name: &str, bytes: &[u8]) -> Result<PutOutcome> {
            let mut map = self.0.lock().unwrap();
            if map.contains_key(name) {
                return Ok(PutOutcome::AlreadyExists);
            }
            map.insert(name.to_string(), bytes.to_vec());
            Ok(PutOutcome::Written)
        }

        fn get(&self, name: &str) -> Result<Box<dyn Read + Send>> {
            let map = self.0.lock().unwrap();
            Ok(Box::new(std::io::Cursor::new(
                map.get(name).cloned().unwrap_or_default(),
            )))
        }

        fn exists(&self, name: &str) -> Result<bool> {
            Ok(self.0.lock().unwrap().contains_key(name))
        }

        fn request_retrieval(&self, name: &str) -> Result<RetrievalHandle> {
            Ok(RetrievalHandle {
                name: name.to_string(),
                eta: Some(Duration::ZERO),
            })
        }
    }

    fn version(path: &str, hash: &str) -> FileVersion {
        FileVersion {
            id: 1,
            run_id: 1,
            path: path.to_string(),
            size: 5,
            mtime: 0,
            mode: 0o644,
            owner: whoami::username(),
            group: String::new(),
            hash: Some(hash.to_string()),
            is_symlink: false,
        }
    }

    #[test]
    fn restores_and_then_skips_unchanged() {
        let dir = tempfile::tempdir().unwrap();
        let store = MemStore(Mutex::new(HashMap::new()));
        let plaintext = b"hello";
        let content_hash = hash::hex_digest(plaintext);
        let mut envelope_bytes = Vec::new();
        envelope::encrypt(plaintext, "pw", &mut envelope_bytes).unwrap();
        store.put(&content_hash, &envelope_bytes).unwrap();

        let v = version("/src/a.txt", &content_hash);
        let summary = restore(dir.path(), &[&v], &store, "pw").unwrap();
        assert_eq!(summary.restored, vec!["/src/a.txt".to_string()]);
        assert!(summary.is_clean());
        assert_eq!(fs::read(dir.path().join("src/a.txt")).unwrap(), plaintext);

        let summary2 = restore(dir.path(), &[&v], &store, "pw").unwrap();
        assert_eq!(summary2.skipped_unchanged, vec!["/src/a.txt".to_string()]);
        assert!(summary2.restored.is_empty());
    }

    #[test]
    fn tampered_blob_fails_that_file_only() {
        let dir = tempfile::tempdir().unwrap();
        let store = MemStore(Mutex::new(HashMap::new()));
        let plaintext = b"hello";
        let content_hash = hash::hex_digest(plaintext);
        let mut envelope_bytes = Vec::new();
        envelope::encrypt(plaintext, "pw", &mut envelope_bytes).unwrap();
        let last = envelope_bytes.len() - 1;
        envelope_bytes[last] ^= 0x01;
        store.put(&content_hash, &envelope_bytes).unwrap();

        let good_hash = hash::hex_digest(b"untouched");
        let mut good_envelope = Vec::new();
        envelope::encrypt(b"untouched", "pw", &mut good_envelope).unwrap();
        store.put(&good_hash, &good_envelope).unwrap();

        let bad = version("/a.txt", &content_hash);
        let good = version("/b.txt", &good_hash);
        let summary = restore(dir.path(), &[&bad, &good], &store, "pw").unwrap();

        assert_eq!(summary.failed.len(), 1);
        assert_eq!(summary.failed[0].0, "/a.txt");
        assert_eq!(summary.restored, vec!["/b.txt".to_string()]);
        assert!(!summary.is_clean());
    }

    #[test]
    fn symlink_version_restores_as_a_symlink_not_a_regular_file() {
        let dir = tempfile::tempdir().unwrap();
        let store = MemStore(Mutex::new(HashMap::new()));
        let target = b"../shared/config.toml";
        let content_hash = hash::hex_digest(target);
        let mut envelope_bytes = Vec::new();
        envelope::encrypt(target, "pw", &mut envelope_bytes).unwrap();
        store.put(&content_hash, &envelope_bytes).unwrap();

        let mut v = version("/link.toml", &content_hash);
        v.is_symlink = true;
        let summary = restore(dir.path(), &[&v], &store, "pw").unwrap();
        assert_eq!(summary.restored, vec!["/link.toml".to_string()]);

        let dest = dir.path().join("link.toml");
        let meta = fs::symlink_metadata(&dest).unwrap();
        assert!(meta.file_type().is_symlink());
        assert_eq!(
            fs::read_link(&dest).unwrap().to_string_lossy(),
            "../shared/config.toml"
        );

        let summary2 = restore(dir.path(), &[&v], &store, "pw").unwrap();
        assert_eq!(summary2.skipped_unchanged, vec!["/link.toml".to_string()]);
    }
}
