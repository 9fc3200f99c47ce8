//! The object store interface the core consumes. Concrete adapters (local
//! filesystem, S3) are external collaborators — `serac-core` only ever
//! talks to this trait, never to a filesystem or an HTTP client directly.
//! Mirrors the `ArchiveRepo` trait-object boundary this crate already used
//! for its container format, generalized to content-addressed blobs.

use std::io::Read;
use std::time::Duration;

use crate::error::Result;

/// Outcome of `ObjectStore::put`. Puts are idempotent by construction
/// (names are content-derived, so the core never attempts to overwrite a
/// name with different bytes) but the store still reports whether it did
/// any work, which the archiver uses for its upload-bytes accounting.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PutOutcome {
    Written,
    AlreadyExists,
}

/// A pending retrieval request against a cold store (e.g. Glacier). The
/// restorer records these and reports them to the operator instead of
/// blocking on the underlying retrieval latency.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RetrievalHandle {
    pub name: String,
    /// Best-effort estimate from the backend; `None` if unknown.
    pub eta: Option<Duration>,
}

pub trait ObjectStore: Send + Sync {
    /// Writes `bytes` under `name` (the hex content hash). Idempotent: if
    /// `name` already exists, this is a no-op that reports
    /// `PutOutcome::AlreadyExists`.
    fn put(&self, name: &str, bytes: &[u8]) -> Result<PutOutcome>;

    /// Reads the full object named `name`.
    fn get(&self, name: &str) -> Result<Box<dyn Read + Send>>;

    fn exists(&self, name: &str) -> Result<bool>;

    /// Requests that a cold-stored object become readable. Backends for
    /// which reads are always immediate (e.g. local disk, S3 Standard)
    /// return a handle with `eta: Some(Duration::ZERO)` and the object is
    /// already gettable; Glacier-class backends return a pending handle
    /// the restorer surfaces to the operator.
    fn request_retrieval(&self, name: &str) -> Result<RetrievalHandle>;
}

/// Wraps a transient-vs-permanent distinction the backend adapter makes
/// about its own errors, so the retry wrapper below knows when to give up
/// early instead of burning the whole backoff budget on a permanent
/// failure (e.g. "bucket does not exist").
pub trait StoreError: std::error::Error {
    fn is_transient(&self) -> bool;
}

/// Retries a store operation with exponential backoff: 5 attempts,
/// starting at 1s and doubling up to a 30s cap, per the resource model's
/// fixed retry budget. Only retries when `should_retry` reports the
/// failure as transient; a permanent failure fails the run immediately.
pub fn with_retry<T>(
    mut op: impl FnMut() -> Result<T>,
    should_retry: impl Fn(&crate::error::SeracError) -> bool,
) -> Result<T> {
    const MAX_ATTEMPTS: u32 = 5;
    const INITIAL_BACKOFF: Duration = Duration::from_secs(1);
    const MAX_BACKOFF: Duration = Duration::from_secs(30);

    let mut backoff = INITIAL_BACKOFF;
    let mut attempt = 0;
    loop {
        attempt += 1;
        match op() {
            Ok(v) => return Ok(v),
            Err(e) if attempt < MAX_ATTEMPTS && should_retry(&e) => {
                tracing::warn!(attempt, ?backoff, error = %e, "retrying transient store error");
                std::thread::sleep(backoff);
                backoff = (backoff * 2).min(MAX_BACKOFF);
            }
            Err(e) => return Err(e),
        }
    }
}
