use std::ptr;
use std::sync::atomic::{AtomicBool, AtomicPtr, Ordering};

use parking_lot::{ReentrantMutex, ReentrantMutexGuard};

use crate::data_structures::{CollectionNode, Key};

/// Raw node pointer. Null is the sentinel: "no child here".
pub(crate) type NodePtr = *mut TreeNode;

/// Which child slot of a parent a node occupies.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ChildSide {
    Left,
    Right,
}

impl ChildSide {
    pub(crate) fn as_str(self) -> &'static str {
        match self {
            ChildSide::Left => "left",
            ChildSide::Right => "right",
        }
    }
}

/// A tree node.
///
/// The key never changes after construction. Child slots and the mark are
/// read without the lock by searches, so they are atomics: loads use Acquire
/// and stores use Release, which makes a writer's update visible to a later
/// validation on another thread. All stores happen while holding the lock of
/// the node being written (and, for child slots, after validation).
///
pub(crate) struct TreeNode {
    key: Key,
    left: AtomicPtr<TreeNode>,
    right: AtomicPtr<TreeNode>,
    marked: AtomicBool,
    // Re-entrant: binary removal may lock the removed node a second time when
    // it is also the successor's parent.
    lock: ReentrantMutex<()>,
}

impl TreeNode {
    pub(crate) fn new(key: Key) -> Self {
        TreeNode {
            key,
            left: AtomicPtr::new(ptr::null_mut()),
            right: AtomicPtr::new(ptr::null_mut()),
            marked: AtomicBool::new(false),
            lock: ReentrantMutex::new(()),
        }
    }

    #[inline]
    pub(crate) fn key(&self) -> Key {
        self.key
    }

    #[inline]
    pub(crate) fn child(&self, side: ChildSide) -> NodePtr {
        match side {
            ChildSide::Left => self.left.load(Ordering::Acquire),
            ChildSide::Right => self.right.load(Ordering::Acquire),
        }
    }

    #[inline]
    pub(crate) fn set_child(&self, side: ChildSide, child: NodePtr) {
        match side {
            ChildSide::Left => self.left.store(child, Ordering::Release),
            ChildSide::Right => self.right.store(child, Ordering::Release),
        }
    }

    #[inline]
    pub(crate) fn left(&self) -> NodePtr {
        self.child(ChildSide::Left)
    }

    #[inline]
    pub(crate) fn right(&self) -> NodePtr {
        self.child(ChildSide::Right)
    }

    #[inline]
    pub(crate) fn is_marked(&self) -> bool {
        self.marked.load(Ordering::Acquire)
    }

    /// Logically delete the node. Irreversible.
    #[inline]
    pub(crate) fn mark(&self) {
        self.marked.store(true, Ordering::Release);
    }

    #[inline]
    pub(crate) fn lock(&self) -> ReentrantMutexGuard<'_, ()> {
        self.lock.lock()
    }
}

impl CollectionNode for TreeNode {
    fn key(&self) -> Key {
        self.key
    }
}

/// Point-in-time observation of one edge: `current` sits (or sat) in
/// `parent`'s `side` slot. `current` may be the sentinel.
///
/// Stale as soon as either node changes; only trusted after `validate`
/// succeeds under lock.
///
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Edge {
    pub parent: NodePtr,
    pub current: NodePtr,
    pub side: ChildSide,
}

impl Edge {
    #[inline]
    pub(crate) fn is_sentinel(&self) -> bool {
        self.current.is_null()
    }
}

/// Dereference a node pointer.
///
/// # Safety
/// `ptr` must be non-null and point to a node that has not been reclaimed.
/// Inside a tree operation this holds for any pointer read after the
/// operation's read guard was pinned.
#[inline]
pub(crate) unsafe fn node_ref<'a>(ptr: NodePtr) -> &'a TreeNode {
    debug_assert!(!ptr.is_null(), "dereferenced the sentinel");
    unsafe { &*ptr }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_node_is_unmarked_leaf() {
        let node = TreeNode::new(7);
        assert_eq!(node.key(), 7);
        assert!(node.left().is_null());
        assert!(node.right().is_null());
        assert!(!node.is_marked());
    }

    #[test]
    fn child_slots_are_independent() {
        let parent = TreeNode::new(10);
        let child = Box::into_raw(Box::new(TreeNode::new(15)));

        parent.set_child(ChildSide::Right, child);
        assert_eq!(parent.right(), child);
        assert!(parent.left().is_null());

        parent.set_child(ChildSide::Right, ptr::null_mut());
        unsafe { drop(Box::from_raw(child)) };
    }

    #[test]
    fn mark_is_sticky() {
        let node = TreeNode::new(1);
        node.mark();
        assert!(node.is_marked());
        node.mark();
        assert!(node.is_marked());
    }

    #[test]
    fn lock_is_reentrant() {
        let node = TreeNode::new(3);
        let _outer = node.lock();
        let _inner = node.lock();
    }
}
