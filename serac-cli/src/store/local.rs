//! Local-filesystem `ObjectStore`: blobs at `<root>/<first two hex
//! chars>/<full hex hash>` (§6). Reads and writes are always immediate —
//! there is no cold tier to wait on here.

use std::fs;
use std::io::Read;
use std::path::PathBuf;
use std::time::Duration;

use serac_core::error::{Result, SeracError};
use serac_core::store::{ObjectStore, PutOutcome, RetrievalHandle};

pub struct LocalStore {
    root: PathBuf,
}

impl LocalStore {
    pub fn new(root: PathBuf) -> Self {
        Self { root }
    }

    fn object_path(&self, name: &str) -> Result<PathBuf> {
        if name.len() < 2 {
            return Err(SeracError::Store(format!("hash '{name}' too short for sharded layout")));
        }
        Ok(self.root.join(&name[..2]).join(name))
    }
}

impl ObjectStore for LocalStore {
    fn put(&self, name: &str, bytes: &[u8]) -> Result<PutOutcome> {
        let path = self.object_path(name)?;
        if path.exists() {
            return Ok(PutOutcome::AlreadyExists);
        }
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .map_err(|e| SeracError::Store(format!("failed to create {}: {e}", parent.display())))?;
        }
        let tmp = path.with_extension("tmp");
        fs::write(&tmp, bytes)
            .map_err(|e| SeracError::Store(format!("failed to write {}: {e}", tmp.display())))?;
        fs::rename(&tmp, &path)
            .map_err(|e| SeracError::Store(format!("failed to finalize {}: {e}", path.display())))?;
        Ok(PutOutcome::Written)
    }

    fn get(&self, name: &str) -> Result<Box<dyn Read + Send>> {
        let path = self.object_path(name)?;
        let file = fs::File::open(&path)
            .map_err(|e| SeracError::Store(format!("failed to open {}: {e}", path.display())))?;
        Ok(Box::new(file))
    }

    fn exists(&self, name: &str) -> Result<bool> {
        Ok(self.object_path(name)?.exists())
    }

    fn request_retrieval(&self, name: &str) -> Result<RetrievalHandle> {
        Ok(RetrievalHandle {
            name: name.to_string(),
            eta: Some(Duration::ZERO),
        })
    }
}
