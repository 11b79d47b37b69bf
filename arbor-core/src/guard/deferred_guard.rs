//! Deferred guard implementation for testing.
//!
//! `DeferredGuard` keeps every unlinked node alive until the guard itself is
//! dropped, which happens when the owning tree is dropped.

use std::collections::HashSet;
use std::sync::Mutex;

use super::Guard;

/// A simple guard that defers all node destruction until the guard is dropped.
///
/// Destruction timing is fully predictable, which makes it the guard of choice
/// for tests. Memory accumulates until the tree is dropped, so it is not
/// suitable for long-running use.
///
/// In debug builds every scheduled address is recorded, and scheduling the same
/// node twice panics. A tree removal that frees the relocated successor instead
/// of the removed node shows up here first.
///
pub struct DeferredGuard {
    deferred: Mutex<Vec<DeferredNode>>,
    #[cfg(debug_assertions)]
    seen: Mutex<HashSet<usize>>,
}

struct DeferredNode {
    ptr: *mut (),
    dealloc: unsafe fn(*mut ()),
}

// Safety: the pointer is only dereferenced by `dealloc` when the guard drops,
// and all access to the list is serialised by the Mutex.
unsafe impl Send for DeferredNode {}

impl DeferredGuard {
    pub fn new() -> Self {
        DeferredGuard {
            deferred: Mutex::new(Vec::new()),
            #[cfg(debug_assertions)]
            seen: Mutex::new(HashSet::new()),
        }
    }

    /// Number of nodes waiting for destruction.
    pub fn pending(&self) -> usize {
        self.deferred
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .len()
    }
}

impl Default for DeferredGuard {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for DeferredGuard {
    fn drop(&mut self) {
        let nodes = self
            .deferred
            .get_mut()
            .unwrap_or_else(|poisoned| poisoned.into_inner());

        let mut seen: HashSet<usize> = HashSet::new();
        let duplicates = nodes
            .iter()
            .filter(|node| !seen.insert(node.ptr as usize))
            .count();
        assert_eq!(
            duplicates, 0,
            "Found {} duplicate pointer(s) in deferred list",
            duplicates
        );

        for node in nodes.drain(..) {
            unsafe {
                (node.dealloc)(node.ptr);
            }
        }
    }
}

impl Guard for DeferredGuard {
    /// No-op: every node stays alive until the collection's stored guard drops.
    type ReadGuard = ();

    fn pin() -> Self::ReadGuard {}

    unsafe fn defer_destroy<N>(&self, node: *mut N, dealloc: unsafe fn(*mut N)) {
        #[cfg(debug_assertions)]
        {
            let addr = node as usize;
            let mut seen = self
                .seen
                .lock()
                .unwrap_or_else(|poisoned| poisoned.into_inner());
            if !seen.insert(addr) {
                panic!("DUPLICATE defer_destroy at {:#x}", addr);
            }
        }

        let node = DeferredNode {
            ptr: node as *mut (),
            dealloc: unsafe {
                std::mem::transmute::<unsafe fn(*mut N), unsafe fn(*mut ())>(dealloc)
            },
        };
        self.deferred
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(node);
    }
}
