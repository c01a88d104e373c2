//! Shared cancellation flag for long-running state transitions.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::constants::CANCEL_WAIT_POLL_MS;

/// A cancellation handle shared between the requester of a long-running
/// transition and the weapon executing it.
///
/// Clones share the same flag: the weapon keeps a clone of the caller's
/// token as its current handle for the duration of the in-flight
/// transition, so cancelling either side cancels both. `cancel` is
/// idempotent and unblocks pollers within one check interval.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    cancelled: Arc<AtomicBool>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    /// A token that is already cancelled.
    pub fn cancelled() -> Self {
        let token = Self::new();
        token.cancel();
        token
    }

    /// Set the flag. Safe to call repeatedly from any thread.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    /// Sleep for `duration`, polling the flag every 10 ms.
    ///
    /// Returns `true` if the full duration elapsed, `false` if cancellation
    /// was observed first.
    pub fn wait_for(&self, duration: Duration) -> bool {
        let deadline = Instant::now() + duration;
        while Instant::now() < deadline {
            if self.is_cancelled() {
                return false;
            }
            std::thread::sleep(Duration::from_millis(CANCEL_WAIT_POLL_MS));
        }
        !self.is_cancelled()
    }
}
