//! SIGINT handling. Cancellation aborts before the final index commit:
//! uploaded-but-unreferenced blobs remain in the store (harmless, they
//! dedupe into the next run) and the index is untouched — cancellation is
//! safe and idempotent (§5).

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

#[derive(Clone)]
pub struct Cancellation(Arc<AtomicBool>);

impl Cancellation {
    pub fn none() -> Self {
        Self(Arc::new(AtomicBool::new(false)))
    }

    /// Installs a process-wide Ctrl-C handler that flips this flag. Only
    /// one such handler can be installed per process; callers in a
    /// long-running embedding (rather than a one-shot CLI) should prefer
    /// `none()` plus their own signal wiring.
    pub fn install() -> Self {
        let flag = Arc::new(AtomicBool::new(false));
        let flag_for_handler = flag.clone();
        let _ = ctrlc::set_handler(move || {
            flag_for_handler.store(true, Ordering::SeqCst);
        });
        Self(flag)
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}
