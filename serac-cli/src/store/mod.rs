//! Concrete `ObjectStore` adapters (§4.2): the local-disk and S3 backends
//! `serac-core` never constructs itself, built here from an
//! already-validated `config::StorageConfig`.

pub mod local;
pub mod s3;

use serac_core::error::Result;
use serac_core::store::ObjectStore;

use crate::config::StorageConfig;
use local::LocalStore;
use s3::{S3Config, S3Store};

/// Builds the `ObjectStore` named by `storage`, connecting eagerly for the
/// S3 backend so config/credential mistakes surface before any scanning
/// or hashing work happens.
pub fn open_store(storage: &StorageConfig) -> Result<Box<dyn ObjectStore>> {
    match storage {
        StorageConfig::Local { path } => Ok(Box::new(LocalStore::new(path.clone()))),
        StorageConfig::S3 {
            path,
            key,
            secret,
            bucket,
        } => {
            let store = S3Store::connect(S3Config {
                path_prefix: path.clone(),
                key: key.clone(),
                secret: secret.clone(),
                bucket: bucket.clone(),
            })?;
            Ok(Box::new(store))
        }
    }
}
