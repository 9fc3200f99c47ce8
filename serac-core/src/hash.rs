//! Content hashing. The archiver's whole-file identity is SHA-256 of
//! plaintext, hex-encoded lowercase — this is the name blobs are stored
//! under and the key deduplication compares on.

use sha2::{Digest, Sha256};

pub fn hex_digest(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    hex::encode(hasher.finalize())
}
