//! S3-backed `ObjectStore`, objects at `<configured path>/<first two hex
//! chars>/<full hex hash>` within the bucket (§6). `rust-s3`'s client is
//! async; `serac-core::ObjectStore` is synchronous, so this adapter owns
//! a small current-thread `tokio::Runtime` and blocks on it per call —
//! the core never needs to know the backend is async underneath.

use std::io::Read;
use std::time::Duration;

use s3::creds::Credentials;
use s3::{Bucket, Region};
use serac_core::error::{Result, SeracError};
use serac_core::store::{ObjectStore, PutOutcome, RetrievalHandle};
use tokio::runtime::Runtime;

pub struct S3Config {
    pub path_prefix: String,
    pub key: String,
    pub secret: String,
    pub bucket: String,
}

pub struct S3Store {
    bucket: Box<Bucket>,
    path_prefix: String,
    runtime: Runtime,
}

impl S3Store {
    pub fn connect(config: S3Config) -> Result<Self> {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .map_err(|e| SeracError::Store(format!("failed to start S3 runtime: {e}")))?;
        let credentials = Credentials::new(Some(&config.key), Some(&config.secret), None, None, None)
            .map_err(|e| SeracError::Config(format!("invalid S3 credentials: {e}")))?;
        let bucket = Bucket::new(&config.bucket, Region::default(), credentials)
            .map_err(|e| SeracError::Config(format!("invalid S3 bucket config: {e}")))?
            .with_path_style();

        Ok(Self {
            bucket,
            path_prefix: config.path_prefix,
            runtime,
        })
    }

    fn object_key(&self, name: &str) -> Result<String> {
        if name.len() < 2 {
            return Err(SeracError::Store(format!("hash '{name}' too short for sharded layout")));
        }
        Ok(format!("{}/{}/{}", self.path_prefix.trim_end_matches('/'), &name[..2], name))
    }
}

impl ObjectStore for S3Store {
    fn put(&self, name: &str, bytes: &[u8]) -> Result<PutOutcome> {
        let key = self.object_key(name)?;
        if self.exists(name)? {
            return Ok(PutOutcome::AlreadyExists);
        }
        self.runtime
            .block_on(self.bucket.put_object(&key, bytes))
            .map_err(|e| SeracError::Store(format!("S3 put {key} failed: {e}")))?;
        Ok(PutOutcome::Written)
    }

    fn get(&self, name: &str) -> Result<Box<dyn Read + Send>> {
        let key = self.object_key(name)?;
        let response = self
            .runtime
            .block_on(self.bucket.get_object(&key))
            .map_err(|e| SeracError::Store(format!("S3 get {key} failed: {e}")))?;
        Ok(Box::new(std::io::Cursor::new(response.bytes().to_vec())))
    }

    fn exists(&self, name: &str) -> Result<bool> {
        let key = self.object_key(name)?;
        match self.runtime.block_on(self.bucket.head_object(&key)) {
            Ok((_, 200)) => Ok(true),
            Ok((_, 404)) => Ok(false),
            Ok((_, code)) => Err(SeracError::Store(format!("S3 head {key} returned status {code}"))),
            Err(e) => Err(SeracError::Store(format!("S3 head {key} failed: {e}"))),
        }
    }

    fn request_retrieval(&self, name: &str) -> Result<RetrievalHandle> {
        // Glacier-class restores in S3 require a POST Object Restore call
        // that `rust-s3` does not expose directly; treat any object this
        // store can `exists()` as immediately retrievable and anything
        // else as not yet present, matching a lifecycle-policy bucket
        // where cold objects simply 404 until restored out of band.
        let retrievable = self.exists(name)?;
        Ok(RetrievalHandle {
            name: name.to_string(),
            eta: if retrievable { Some(Duration::ZERO) } else { None },
        })
    }
}
