//! Epoch-based guard implementation using crossbeam-epoch.
//!
//! ```text
//! LockedTree<EpochGuard>
//!     │
//!     ├── every operation pins the calling thread for its duration
//!     └── removed nodes are freed once all pinned threads have moved on
//! ```

use arbor_core::guard::Guard;
use crossbeam_epoch::{self as epoch, Guard as CrossbeamGuard};

/// Epoch-based memory reclamation guard.
///
/// Nodes are not freed until all threads have advanced past the epoch
/// in which they were removed. A search that read a pointer to a node
/// before its removal can therefore keep walking from it.
///
/// Unlike `DeferredGuard`, which stores pending destructions, `EpochGuard`
/// is a zero-sized type that schedules destruction using the global epoch
/// collector.
///
#[derive(Debug, Clone, Copy, Default)]
pub struct EpochGuard {
    // Zero-sized - all state is in the global epoch collector
}

impl EpochGuard {
    pub fn new() -> Self {
        EpochGuard {}
    }
}

// EpochGuard is Send and Sync since it's stateless (zero-sized)
unsafe impl Send for EpochGuard {}
unsafe impl Sync for EpochGuard {}

impl Guard for EpochGuard {
    /// Pins the current thread for the duration of a tree operation.
    type ReadGuard = CrossbeamGuard;

    fn pin() -> Self::ReadGuard {
        epoch::pin()
    }

    unsafe fn defer_destroy<N>(&self, node: *mut N, dealloc: unsafe fn(*mut N)) {
        // Re-pinning is cheap when the caller already holds a pin. The
        // destruction runs after every thread has left the current epoch.
        let guard = epoch::pin();
        unsafe {
            guard.defer_unchecked(move || {
                dealloc(node);
            });
        }
    }
}
