//! Guard trait for memory reclamation strategies.
//!
//! Nodes unlinked from a concurrent tree can still be reachable from a thread
//! that read a child pointer before the unlink and has not yet validated it.
//! Such a node must stay allocated until no thread can hold that stale
//! pointer. The `Guard` trait abstracts over the strategy that decides when.
//!
//! ```text
//! LockedTree<G: Guard>
//!     │
//!     ├── LockedTree<EpochGuard>      (production, arbor-crossbeam)
//!     └── LockedTree<DeferredGuard>   (testing)
//! ```
//!
//! # Example
//!
//! ```rust,ignore
//! use arbor_core::{LockedTree, OrderedSet};
//! use arbor_crossbeam::EpochGuard;
//!
//! let tree: LockedTree<EpochGuard> = LockedTree::new();
//! tree.insert(42);
//! ```

mod deferred_guard;

pub use deferred_guard::DeferredGuard;

/// A memory reclamation guard that protects concurrent access to nodes.
///
/// - **EpochGuard**: low overhead, batched reclamation (crossbeam-epoch)
/// - **DeferredGuard**: defers all destruction until the guard drops (testing)
///
/// # Safety Contract
///
/// Implementations must ensure that nodes passed to `defer_destroy` are not
/// freed while any thread that pinned a `ReadGuard` before the call is still
/// holding it.
///
/// Guards are stored in collections and must be `Send + Sync`. The stored
/// guard schedules destruction; thread pinning happens per operation.
///
pub trait Guard: Sized + Default + Send + Sync {
    /// An active guard that protects node reads for its lifetime.
    ///
    /// For epoch-based guards this is a pinned `crossbeam_epoch::Guard`.
    /// For deferred guards it is `()`, since nothing is freed before the
    /// collection drops.
    ///
    type ReadGuard: Sized;

    /// Pin an active read guard for the duration of one operation.
    ///
    fn pin() -> Self::ReadGuard;

    /// Schedule a node for deferred destruction.
    ///
    /// # Safety
    ///
    /// - `node` must be a valid pointer previously allocated by the collection
    /// - `node` must be unlinked from the collection (not reachable by traversal)
    /// - `node` must not be scheduled more than once
    /// - `dealloc` must be the correct deallocation function for `node`
    ///
    unsafe fn defer_destroy<N>(&self, node: *mut N, dealloc: unsafe fn(*mut N));
}
