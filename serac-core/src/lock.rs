//! Single-writer-per-index enforcement: a filesystem lock living
//! alongside the index database. `archive`/`restore` take an exclusive
//! lock; `ls` takes a shared one. Grounded in `fs4::fs_std::FileExt`,
//! already used elsewhere in this pack for exactly this kind of advisory
//! locking.

use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};

use fs4::fs_std::FileExt;

use crate::error::{Result, SeracError};

pub struct IndexLock {
    file: File,
    path: PathBuf,
}

impl IndexLock {
    fn lock_path(index_path: &Path) -> PathBuf {
        let mut p = index_path.as_os_str().to_owned();
        p.push(".lock");
        PathBuf::from(p)
    }

    /// Exclusive lock for `archive`/`restore`. Blocks until acquired;
    /// callers that want SIGINT to abort a wait should not hold this
    /// across a long-running external process.
    pub fn acquire_exclusive(index_path: &Path) -> Result<Self> {
        let path = Self::lock_path(index_path);
        let file = OpenOptions::new()
            .create(true)
            .write(true)
            .open(&path)?;
        file.lock_exclusive()
            .map_err(|e| SeracError::Store(format!("could not acquire index lock: {e}")))?;
        Ok(Self { file, path })
    }

    /// Shared lock for `ls`, which only reads the index.
    pub fn acquire_shared(index_path: &Path) -> Result<Self> {
        let path = Self::lock_path(index_path);
        let file = OpenOptions::new()
            .create(true)
            .write(true)
            .open(&path)?;
        file.lock_shared()
            .map_err(|e| SeracError::Store(format!("could not acquire index lock: {e}")))?;
        Ok(Self { file, path })
    }
}

impl Drop for IndexLock {
    fn drop(&mut self) {
        let _ = FileExt::unlock(&self.file);
        let _ = &self.path;
    }
}
