//! The persistent entities from the data model: one successful archive
//! invocation (`ArchiveRun`) and one observation of a path at a point in
//! time (`FileVersion`). Archive objects (blobs) are not modeled as a Rust
//! type here — they are opaque bytes in the object store, named by their
//! hex content hash.

/// Hex-encoded SHA-256 of a blob's plaintext. Doubles as the object store
/// key and as the file-identity key used for deduplication.
pub type ContentHash = String;

/// One successful `archive` invocation.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ArchiveRun {
    pub id: i64,
    /// Wall-clock seconds since epoch, UTC, at run start.
    pub ts: i64,
    pub files_added: u64,
    pub files_removed: u64,
    pub bytes_uploaded: u64,
}

/// One row per observation of a path. `hash` is `None` for a `DELETED`
/// marker; every other field is still populated from the last
/// non-deleted observation's metadata at deletion time is not recorded —
/// a deletion row only carries the path and the run it was recorded in.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FileVersion {
    pub id: i64,
    pub run_id: i64,
    pub path: String,
    pub size: u64,
    pub mtime: i64,
    pub mode: u32,
    pub owner: String,
    pub group: String,
    /// `None` means this row is the `DELETED` marker for `path`.
    pub hash: Option<ContentHash>,
    /// Whether `path` was a symlink as of this observation. `hash` is then
    /// the content hash of the link-target string, not of file bytes
    /// (§4.3); restoring such a version recreates a symlink rather than a
    /// regular file.
    pub is_symlink: bool,
}

impl FileVersion {
    pub fn is_deleted(&self) -> bool {
        self.hash.is_none()
    }
}

/// Metadata observed for one path during a scan, before it is compared
/// against the index's latest-known state.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ScanEntry {
    pub path: String,
    pub size: u64,
    pub mtime: i64,
    pub mode: u32,
    pub owner: String,
    pub group: String,
    /// Symlinks are recorded by path but never followed (§4.3): their
    /// "content" for hashing/dedup purposes is the link target string,
    /// not file bytes, and the archiver reads that target rather than
    /// opening the path.
    pub is_symlink: bool,
}

/// The subset of `FileVersion` attributes the differ compares against a
/// fresh `ScanEntry`. `hash` is looked at only when `size`/`mtime` already
/// forced a rehash (see `differ::classify`).
impl ScanEntry {
    pub fn metadata_eq(&self, fv: &FileVersion) -> bool {
        self.size == fv.size
            && self.mtime == fv.mtime
            && self.mode == fv.mode
            && self.owner == fv.owner
            && self.group == fv.group
            && self.is_symlink == fv.is_symlink
    }
}
