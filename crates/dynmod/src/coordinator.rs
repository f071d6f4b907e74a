//! Reload coordination and quiescence tracking.
//!
//! Two small synchronization pieces, kept apart from the loader so their
//! protocols are testable on their own:
//!
//! - [`ReloadCoordinator`] serializes reloads. At most one reload runs per
//!   loader; a second request while one is running is dropped, not queued.
//!   Lookups wait for the idle state before touching the cache, and they
//!   wait *before* taking the loader mutex, never while holding it.
//! - [`InflightCalls`] counts calls currently executing through resolved
//!   addresses. A blocking reload waits for the count to reach zero before
//!   closing the old module.

use std::sync::Arc;

use parking_lot::{Condvar, Mutex};

/// Gate that serializes reloads and lets lookups wait one out.
pub struct ReloadCoordinator {
    /// True while a reload owns the module.
    reloading: Mutex<bool>,
    /// Signaled when the reloading flag clears.
    idle: Condvar,
}

impl ReloadCoordinator {
    pub fn new() -> Self {
        Self {
            reloading: Mutex::new(false),
            idle: Condvar::new(),
        }
    }

    /// Claim the reload slot.
    ///
    /// Returns false when a reload is already running; the caller drops
    /// its request in that case.
    pub fn try_begin(&self) -> bool {
        let mut reloading = self.reloading.lock();
        if *reloading {
            return false;
        }
        *reloading = true;
        true
    }

    /// Release the slot and wake every blocked lookup.
    pub fn finish(&self) {
        let mut reloading = self.reloading.lock();
        *reloading = false;
        self.idle.notify_all();
    }

    /// Block until no reload is running. Returns immediately when idle.
    pub fn wait_until_idle(&self) {
        let mut reloading = self.reloading.lock();
        while *reloading {
            self.idle.wait(&mut reloading);
        }
    }

    pub fn is_reloading(&self) -> bool {
        *self.reloading.lock()
    }

    /// Wake all waiters without changing state. Waiters re-check the flag
    /// and sleep again when a reload is still running.
    pub fn signal_all(&self) {
        self.idle.notify_all();
    }
}

impl Default for ReloadCoordinator {
    fn default() -> Self {
        Self::new()
    }
}

/// Count of calls currently executing through resolved addresses.
pub struct InflightCalls {
    /// Number of outstanding guards.
    count: Mutex<usize>,
    /// Signaled when the count reaches zero.
    quiescent: Condvar,
}

impl InflightCalls {
    pub fn new() -> Self {
        Self {
            count: Mutex::new(0),
            quiescent: Condvar::new(),
        }
    }

    /// Block until no call is executing. Returns immediately at zero.
    pub fn wait_quiescent(&self) {
        let mut count = self.count.lock();
        while *count != 0 {
            self.quiescent.wait(&mut count);
        }
    }

    /// Number of calls currently in flight.
    pub fn in_flight(&self) -> usize {
        *self.count.lock()
    }

    fn exit(&self) {
        let mut count = self.count.lock();
        *count = count.saturating_sub(1);
        if *count == 0 {
            self.quiescent.notify_all();
        }
    }
}

impl Default for InflightCalls {
    fn default() -> Self {
        Self::new()
    }
}

/// RAII marker for one in-flight call.
///
/// Held across an invocation through a resolved address; blocking reloads
/// wait for every outstanding guard to drop before unloading.
pub struct CallGuard {
    calls: Arc<InflightCalls>,
}

impl CallGuard {
    pub(crate) fn enter(calls: Arc<InflightCalls>) -> Self {
        {
            let mut count = calls.count.lock();
            *count += 1;
        }
        Self { calls }
    }
}

impl Drop for CallGuard {
    fn drop(&mut self) {
        self.calls.exit();
    }
}
