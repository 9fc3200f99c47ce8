use thiserror::Error;

/// The six error kinds from the archiver's error handling design: each maps
/// to a specific exit code and propagation rule at the CLI boundary.
#[derive(Error, Debug)]
pub enum SeracError {
    /// Bad configuration, bad CLI args. Surfaced to the user, never retried.
    #[error("config error: {0}")]
    Config(String),

    /// Index transaction/schema failure. Fatal: either every change commits
    /// or none does.
    #[error("index error: {0}")]
    Index(#[from] rusqlite::Error),

    /// Object store failure. Transient failures are retried with backoff
    /// before becoming this; permanent failures are fatal for `archive` and
    /// per-file for `restore`.
    #[error("store error: {0}")]
    Store(String),

    /// Envelope construction/parsing failed.
    #[error("crypto error: {0}")]
    Crypto(String),

    /// AEAD authentication failed: the ciphertext was tampered with. No
    /// plaintext is ever returned to the caller when this fires.
    #[error("integrity error: ciphertext failed authentication for {0}")]
    Integrity(String),

    /// A single path could not be scanned (permission denied, vanished
    /// mid-walk, unsupported file type). Logged and skipped, never fatal.
    #[error("scan error at {path}: {source}")]
    Scan {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// An index row references a blob hash that the store does not have.
    #[error("blob {hash} referenced by {path} not found in store")]
    NotFound { hash: String, path: String },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, SeracError>;

impl SeracError {
    /// Maps a terminal error onto the process exit codes from the CLI
    /// surface: 1 for user error, 2 for everything else that aborts a run.
    /// `restore`'s partial-success exit code (3) is decided by the caller
    /// from its `RestoreSummary`, not from this mapping, since a restore
    /// with per-file failures does not itself return an `Err`.
    pub fn exit_code(&self) -> i32 {
        match self {
            SeracError::Config(_) => 1,
            _ => 2,
        }
    }
}
