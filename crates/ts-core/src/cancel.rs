//! Cooperative interruption.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// Shared interruption flag.
///
/// Clones observe the same flag.  The stepper checks it before every phase
/// and the scenario builder before every vehicle; nothing is ever interrupted
/// in the middle of a phase.
#[derive(Clone, Debug, Default)]
pub struct CancelToken {
    flag: Arc<AtomicBool>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    /// Request interruption.
    pub fn cancel(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }

    /// Clear a previous request so the token can be reused for the next run.
    pub fn clear(&self) {
        self.flag.store(false, Ordering::SeqCst);
    }
}
