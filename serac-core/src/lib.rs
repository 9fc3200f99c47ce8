#![forbid(unsafe_code)]

pub const VERSION: &str = env!("CARGO_PKG_VERSION");

pub mod error;

pub mod domain;

pub mod crypto {
    pub mod envelope;
    pub mod kdf;
}

pub mod hash;
pub mod store;
pub mod index;
pub mod lock;
pub mod ids;
pub mod scan;
pub mod differ;
pub mod cancel;
pub mod archiver;
pub mod reconstruct;
pub mod restore;

pub use crate::error::{Result, SeracError};

pub mod prelude {
    pub use crate::archiver::{ArchiveOptions, archive};
    pub use crate::cancel::Cancellation;
    pub use crate::domain::{ArchiveRun, ContentHash, FileVersion, ScanEntry};
    pub use crate::error::{Result, SeracError};
    pub use crate::index::IndexStore;
    pub use crate::lock::IndexLock;
    pub use crate::reconstruct::{filter_by_pattern, state_as_of};
    pub use crate::restore::{RestoreSummary, restore};
    pub use crate::scan::{ExcludeRule, Scanner};
    pub use crate::store::ObjectStore;
}
