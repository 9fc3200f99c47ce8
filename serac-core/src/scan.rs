//! Walks each configured include root in deterministic order, yielding
//! file metadata. Symlinks are recorded by path but never followed.
//! Exclude patterns are literal path prefixes (globs are rejected at
//! config load, not here — by the time a `Scanner` runs, its `excludes`
//! are already known-literal). Grounded in this crate's existing
//! `WalkDir`-based directory walk (`pack::writer::pack`), generalized from
//! "collect files to chunk and pack" to "collect metadata to diff".

use std::fs;
use std::path::{Path, PathBuf};

use walkdir::WalkDir;

use crate::domain::ScanEntry;
use crate::error::Result;
use crate::ids::IdResolver;

/// A literal path prefix to exclude. Rejecting globs happens where config
/// values are parsed (`serac-cli`); by construction every `ExcludeRule`
/// here is already glob-free.
#[derive(Clone, Debug)]
pub struct ExcludeRule(String);

impl ExcludeRule {
    /// Builds a rule from an already-validated literal prefix. Returns
    /// `Err` if `raw` looks like a glob (`*` or `?`), as a last line of
    /// defense even though config loading should have caught this.
    pub fn literal(raw: &str) -> Result<Self> {
        if raw.contains('*') || raw.contains('?') {
            return Err(crate::error::SeracError::Config(format!(
                "exclude pattern '{raw}' looks like a glob; globs are not supported"
            )));
        }
        Ok(Self(raw.trim_end_matches('/').to_string()))
    }

    /// §4.3: a pattern `P` excludes `X` iff `X == P` or `X` begins with
    /// `P + '/'`.
    fn excludes(&self, path: &str) -> bool {
        path == self.0 || path.starts_with(&format!("{}/", self.0))
    }
}

pub struct Scanner {
    includes: Vec<PathBuf>,
    excludes: Vec<ExcludeRule>,
}

impl Scanner {
    pub fn new(includes: Vec<PathBuf>, excludes: Vec<ExcludeRule>) -> Self {
        Self { includes, excludes }
    }

    fn is_excluded(&self, path: &str) -> bool {
        self.excludes.iter().any(|r| r.excludes(path))
    }

    /// Enumerates every include root in lexicographic order, skipping
    /// excluded paths, non-regular files, and permission-denied entries
    /// (each of the latter two logged and skipped, never fatal).
    pub fn scan(&self, resolver: &IdResolver) -> Vec<ScanEntry> {
        let mut out = Vec::new();
        for root in &self.includes {
            let mut entries: Vec<_> = WalkDir::new(root)
                .follow_links(false)
                .into_iter()
                .filter_map(|res| match res {
                    Ok(e) => Some(e),
                    Err(e) => {
                        tracing::warn!(error = %e, "skipping unreadable directory entry");
                        None
                    }
                })
                .collect();
            entries.sort_by(|a, b| a.path().cmp(b.path()));

            for entry in entries {
                let path = entry.path();
                let path_str = path.to_string_lossy().to_string();
                if self.is_excluded(&path_str) {
                    continue;
                }
                if entry.file_type().is_dir() {
                    continue;
                }
                match self.scan_one(path, &path_str, resolver) {
                    Ok(Some(se)) => out.push(se),
                    Ok(None) => {}
                    Err(e) => {
                        tracing::warn!(path = %path_str, error = %e, "skipping unreadable file");
                    }
                }
            }
        }
        out
    }

    fn scan_one(
        &self,
        path: &Path,
        path_str: &str,
        resolver: &IdResolver,
    ) -> Result<Option<ScanEntry>> {
        let metadata = fs::symlink_metadata(path)?;

        #[cfg(unix)]
        let (owner, group) = crate::ids::owner_group_of(&metadata, resolver);
        #[cfg(not(unix))]
        let (owner, group) = {
            let _ = resolver;
            (String::new(), String::new())
        };

        if metadata.file_type().is_symlink() {
            let target_len = fs::read_link(path).map(|t| t.to_string_lossy().len() as u64).unwrap_or(0);
            return Ok(Some(ScanEntry {
                path: path_str.to_string(),
                size: target_len,
                mtime: mtime_of(&metadata),
                mode: mode_of(&metadata),
                owner,
                group,
                is_symlink: true,
            }));
        }

        if !metadata.is_file() {
            tracing::warn!(path = %path_str, "skipping non-regular file (device/socket/fifo)");
            return Ok(None);
        }

        Ok(Some(ScanEntry {
            path: path_str.to_string(),
            size: metadata.len(),
            mtime: mtime_of(&metadata),
            mode: mode_of(&metadata),
            owner,
            group,
            is_symlink: false,
        }))
    }
}

fn mode_of(md: &fs::Metadata) -> u32 {
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        md.permissions().mode()
    }
    #[cfg(not(unix))]
    {
        let _ = md;
        0o100644
    }
}

fn mtime_of(md: &fs::Metadata) -> i64 {
    md.modified()
        .ok()
        .and_then(|t| t.duration_since(std::time::UNIX_EPOCH).ok())
        .map(|d| d.as_secs() as i64)
        .unwrap_or(0)
}
