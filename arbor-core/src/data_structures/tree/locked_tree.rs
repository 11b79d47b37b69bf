use std::cmp::Ordering;
use std::ptr;

use parking_lot::ReentrantMutexGuard;
use tracing::trace;

use super::tree_node::{ChildSide, Edge, NodePtr, TreeNode, node_ref};
use crate::data_structures::{CollectionNode, Key, Keysum, OrderedSet, RESERVED_KEY};
use crate::error::{Result, TreeError};
use crate::guard::Guard;

///
/// Concurrent unbalanced binary search tree with one lock per node.
///
/// Searches take no locks. Every mutation locks the nodes of the edge it is
/// about to change, top-down, then re-checks the edge with `validate`; if the
/// check fails the whole operation restarts from a fresh search. Contention
/// therefore shows up as retries rather than long lock hold times.
///
// =============================================================================
// STRUCTURE
// =============================================================================
//
//            ┌─────────────────┐
//            │ HEAD (i64::MIN) │  never marked, never removed
//            └───────┬─────────┘
//                    │ right
//                  ┌─▼─┐
//                  │ 10│  root
//                 └┬─┬┘
//             left │ │ right
//               ┌──▼┐ ┌▼──┐
//               │ 5 │ │ 15│
//               └───┘ └┬──┘
//                      │ left
//                    ┌─▼─┐
//                    │ 12│
//                    └───┘
//
// A null child pointer is the sentinel. The head removes every special case
// for an empty tree and for replacing the root: the root is just head.right.
//
// =============================================================================
// INVARIANTS
// =============================================================================
//
// 1. Keys in a left subtree are smaller, keys in a right subtree are larger.
// 2. A node is marked before it is unlinked and is never unmarked.
// 3. Child slots and marks are only written while holding the lock of the
//    node being written, after the edge being changed was validated.
// 4. Locks are taken top-down along the search path:
//    parent -> node -> successor's parent -> successor
//    -> relocation parent -> relocation node.
//
// =============================================================================
// REMOVE: NODE WITH TWO CHILDREN
// =============================================================================
//
// Successor without a right child: splice it into the removed node's place.
//
//        P                     P
//        │                     │
//       [T]                   S
//      /   \        =>       / \
//     A     R               A   R
//          / \                 / \
//         X   .               X   .
//        /
//       S
//
// Successor with a right child: park it under the leftmost node of its own
// right subtree first, so it is never missing from a path that reaches it,
// then splice it from there.
//
// Between parking S under L and redirecting S's old parent slot to C, the
// path S -> C -> ... -> L -> S is a cycle. An unlocked search for an absent
// key between S and L (say 16 with S = 15, L = 17) circles until the next
// store breaks it. It never returns a wrong edge: lock-then-validate rejects
// anything it reports from inside the cycle.
//
//       [T]                  [T]                   S
//      /   \                /   \                 / \
//     A     R      =>      A     R       =>      A   R
//          /                    /                   /
//         S                    C                   C
//          \                  / \                   \
//           C                L   .                   ...
//          /                /
//         L                S
//
// =============================================================================
//
pub struct LockedTree<G: Guard> {
    head: Box<TreeNode>,
    /// Shared guard for deferred destruction of removed nodes.
    guard: G,
}

/// An edge whose parent and current node are both locked, parent first.
struct LockedEdge<'a> {
    edge: Edge,
    _parent: ReentrantMutexGuard<'a, ()>,
    _current: ReentrantMutexGuard<'a, ()>,
}

impl<G: Guard> LockedTree<G> {
    pub fn new() -> Self {
        LockedTree {
            head: Box::new(TreeNode::new(RESERVED_KEY)),
            guard: G::default(),
        }
    }

    /// The guard removed nodes are deferred to.
    pub fn guard(&self) -> &G {
        &self.guard
    }

    #[inline]
    fn head_ptr(&self) -> NodePtr {
        &*self.head as *const TreeNode as NodePtr
    }

    // =========================================================================
    // Search / validate
    // =========================================================================

    /// One unlocked descent from the head.
    ///
    /// Stops at the node holding `key` or at the sentinel where `key` would be
    /// attached. Reads may be stale.
    fn search_once(&self, key: Key) -> Edge {
        let mut parent = self.head_ptr();
        let mut current = self.head.right();
        let mut side = ChildSide::Right;

        while !current.is_null() {
            let node = unsafe { node_ref(current) };
            side = match node.key().cmp(&key) {
                Ordering::Less => ChildSide::Right,
                Ordering::Greater => ChildSide::Left,
                Ordering::Equal => break,
            };
            parent = current;
            current = node.child(side);
        }

        Edge {
            parent,
            current,
            side,
        }
    }

    /// Repeats `search_once` until the result looks stable: either the key was
    /// found, or two consecutive descents ended under the same parent.
    ///
    /// Only limits wasted lock acquisitions. Correctness comes from `validate`.
    fn search(&self, key: Key) -> Edge {
        let mut previous_parent = ptr::null_mut();
        loop {
            let edge = self.search_once(key);
            if !edge.is_sentinel() || edge.parent == previous_parent {
                return edge;
            }
            previous_parent = edge.parent;
        }
    }

    /// Whether an observed edge is still current.
    ///
    /// Must be called with the parent locked, and the current node too when it
    /// is not the sentinel.
    fn validate(&self, edge: &Edge) -> bool {
        let parent = unsafe { node_ref(edge.parent) };
        !parent.is_marked()
            && (edge.is_sentinel() || !unsafe { node_ref(edge.current) }.is_marked())
            && parent.child(edge.side) == edge.current
    }

    // =========================================================================
    // Insert / remove
    // =========================================================================

    fn insert_internal(&self, key: Key) -> bool {
        loop {
            let edge = self.search(key);
            let parent = unsafe { node_ref(edge.parent) };
            let _parent_lock = parent.lock();

            if !self.validate(&edge) {
                trace!(key, "insert: edge changed before lock, retrying");
                continue;
            }

            if edge.is_sentinel() {
                let node = Box::into_raw(Box::new(TreeNode::new(key)));
                parent.set_child(edge.side, node);
                return true;
            }

            let current = unsafe { node_ref(edge.current) };
            let _current_lock = current.lock();

            // Only a duplicate if the edge still holds with both ends locked.
            if self.validate(&edge) {
                return false;
            }
            trace!(key, "insert: matching node retired, retrying");
        }
    }

    /// Unlinks the node holding `key` and returns it. The caller owns the
    /// returned pointer's reclamation.
    fn remove_internal(&self, key: Key) -> Option<NodePtr> {
        loop {
            let edge = self.search(key);
            let parent = unsafe { node_ref(edge.parent) };
            let _parent_lock = parent.lock();

            if !self.validate(&edge) {
                trace!(key, "remove: edge changed before lock, retrying");
                continue;
            }

            if edge.is_sentinel() {
                return None;
            }

            let current = unsafe { node_ref(edge.current) };
            let _current_lock = current.lock();

            if !self.validate(&edge) {
                trace!(key, "remove: edge changed before node lock, retrying");
                continue;
            }

            let left = current.left();
            let right = current.right();

            if !left.is_null() && !right.is_null() {
                self.remove_binary_node(&edge);
            } else if !left.is_null() {
                current.mark();
                parent.set_child(edge.side, left);
            } else {
                current.mark();
                parent.set_child(edge.side, right);
            }

            return Some(edge.current);
        }
    }

    // =========================================================================
    // Binary-node removal
    // =========================================================================

    /// Leftmost node of `base`'s right subtree, with its parent edge. Unlocked.
    ///
    /// `base` must be locked and have a right child.
    fn find_successor(&self, base: NodePtr) -> Edge {
        let mut parent = base;
        let mut current = unsafe { node_ref(base) }.right();
        let mut side = ChildSide::Right;
        debug_assert!(!current.is_null(), "successor search needs a right subtree");

        let mut next = unsafe { node_ref(current) }.left();
        while !next.is_null() {
            parent = current;
            current = next;
            side = ChildSide::Left;
            next = unsafe { node_ref(current) }.left();
        }

        Edge {
            parent,
            current,
            side,
        }
    }

    /// Locks the successor edge below `base`.
    ///
    /// Returns `None` if the edge moved between the unlocked descent and the
    /// lock acquisition: either `validate` fails, a second descent under both
    /// locks disagrees with the first, or the successor gained a left child.
    fn try_lock_successor(&self, base: NodePtr) -> Option<LockedEdge<'_>> {
        let edge = self.find_successor(base);
        let parent = unsafe { node_ref(edge.parent) };
        let parent_lock = parent.lock();

        if !self.validate(&edge) {
            return None;
        }

        let current = unsafe { node_ref(edge.current) };
        let current_lock = current.lock();

        if self.find_successor(base) != edge
            || !current.left().is_null()
            || !self.validate(&edge)
        {
            return None;
        }

        Some(LockedEdge {
            edge,
            _parent: parent_lock,
            _current: current_lock,
        })
    }

    /// Replaces `target.current`, which has two children, with its in-order
    /// successor. `target` must be validated with both of its ends locked.
    fn remove_binary_node(&self, target: &Edge) {
        loop {
            let Some(successor) = self.try_lock_successor(target.current) else {
                trace!(
                    key = unsafe { node_ref(target.current) }.key(),
                    "binary removal: successor moved, retrying"
                );
                continue;
            };

            if !self.validate(target) {
                continue;
            }

            if unsafe { node_ref(successor.edge.current) }.right().is_null() {
                self.splice_successor(target, &successor.edge);
            } else {
                self.relocate_successor(target, &successor.edge);
            }
            return;
        }
    }

    /// Parks a successor that has a right child as the left child of the
    /// leftmost node of that right subtree, then splices it from there.
    ///
    /// `successor` must be locked at both ends.
    fn relocate_successor(&self, target: &Edge, successor: &Edge) {
        loop {
            let Some(leftmost) = self.try_lock_successor(successor.current) else {
                trace!(
                    key = unsafe { node_ref(successor.current) }.key(),
                    "successor relocation: leftmost node moved, retrying"
                );
                continue;
            };

            let successor_node = unsafe { node_ref(successor.current) };
            let leftmost_node = unsafe { node_ref(leftmost.edge.current) };

            leftmost_node.set_child(ChildSide::Left, successor.current);
            unsafe { node_ref(successor.parent) }
                .set_child(successor.side, successor_node.right());
            successor_node.set_child(ChildSide::Right, ptr::null_mut());

            let parked = Edge {
                parent: leftmost.edge.current,
                current: successor.current,
                side: ChildSide::Left,
            };
            self.splice_successor(target, &parked);
            return;
        }
    }

    /// Moves `replacement.current` (no right child, no left child) into the
    /// place of `target.current`, and marks the target.
    ///
    /// All four nodes must be locked.
    fn splice_successor(&self, target: &Edge, replacement: &Edge) {
        let removed = unsafe { node_ref(target.current) };
        let successor = unsafe { node_ref(replacement.current) };

        removed.mark();
        if removed.right() != replacement.current {
            successor.set_child(ChildSide::Right, removed.right());
        }
        successor.set_child(ChildSide::Left, removed.left());
        unsafe { node_ref(target.parent) }.set_child(target.side, replacement.current);
        unsafe { node_ref(replacement.parent) }.set_child(replacement.side, ptr::null_mut());
    }

    // =========================================================================
    // Queries
    // =========================================================================

    fn contains_internal(&self, key: Key) -> bool {
        let edge = self.search(key);
        !edge.is_sentinel() && !unsafe { node_ref(edge.current) }.is_marked()
    }

    /// Visits every node reachable from the root, in no particular order.
    ///
    /// Explicit stack: an unbalanced tree can be as deep as it is large.
    fn for_each_node(&self, mut visit: impl FnMut(&TreeNode)) {
        let mut stack = vec![self.head.right()];
        while let Some(ptr) = stack.pop() {
            if ptr.is_null() {
                continue;
            }
            let node = unsafe { node_ref(ptr) };
            visit(node);
            stack.push(node.left());
            stack.push(node.right());
        }
    }

    fn collect_in_order(&self) -> Vec<Key> {
        let mut keys = Vec::new();
        let mut stack = Vec::new();
        let mut current = self.head.right();

        while !current.is_null() || !stack.is_empty() {
            while !current.is_null() {
                stack.push(current);
                current = unsafe { node_ref(current) }.left();
            }
            if let Some(ptr) = stack.pop() {
                let node = unsafe { node_ref(ptr) };
                keys.push(node.key());
                current = node.right();
            }
        }
        keys
    }

    fn check_structure(&self) -> Result<()> {
        // (node, exclusive lower bound, exclusive upper bound, parent key, side)
        let mut stack = vec![(
            self.head.right(),
            RESERVED_KEY,
            None::<Key>,
            RESERVED_KEY,
            ChildSide::Right,
        )];

        while let Some((ptr, low, high, parent, side)) = stack.pop() {
            if ptr.is_null() {
                continue;
            }
            let node = unsafe { node_ref(ptr) };
            let key = node.key();

            if node.is_marked() {
                return Err(TreeError::MarkedNodeReachable(key));
            }
            if key <= low || high.is_some_and(|high| key >= high) {
                return Err(TreeError::OrderViolation {
                    parent,
                    child: key,
                    side: side.as_str(),
                });
            }

            stack.push((node.left(), low, Some(key), key, ChildSide::Left));
            stack.push((node.right(), key, high, key, ChildSide::Right));
        }
        Ok(())
    }
}

impl<G: Guard> OrderedSet for LockedTree<G> {
    fn insert(&self, key: Key) -> bool {
        assert_ne!(
            key, RESERVED_KEY,
            "key {} is reserved for the head sentinel",
            key
        );
        let _guard = G::pin();
        self.insert_internal(key)
    }

    fn remove(&self, key: Key) -> bool {
        let _guard = G::pin();
        match self.remove_internal(key) {
            Some(node) => {
                // Unlinked and marked; stale readers may still hold it.
                unsafe { self.guard.defer_destroy(node, TreeNode::dealloc_ptr) };
                true
            }
            None => false,
        }
    }

    fn contains(&self, key: Key) -> bool {
        let _guard = G::pin();
        self.contains_internal(key)
    }

    fn size(&self) -> usize {
        let _guard = G::pin();
        let mut count = 0;
        self.for_each_node(|_| count += 1);
        count
    }

    fn keysum(&self) -> Keysum {
        let _guard = G::pin();
        let mut sum: Keysum = 0;
        self.for_each_node(|node| sum += Keysum::from(node.key()));
        sum
    }

    fn to_vec(&self) -> Vec<Key> {
        let _guard = G::pin();
        self.collect_in_order()
    }

    fn verify_structure(&self) -> Result<()> {
        let _guard = G::pin();
        self.check_structure()
    }

    fn is_empty(&self) -> bool {
        let _guard = G::pin();
        self.head.right().is_null()
    }
}

impl<G: Guard> Default for LockedTree<G> {
    fn default() -> Self {
        Self::new()
    }
}

impl<G: Guard> Drop for LockedTree<G> {
    fn drop(&mut self) {
        // Reachable nodes belong to the tree; unlinked ones belong to the guard.
        let mut stack = vec![self.head.right()];
        self.head.set_child(ChildSide::Right, ptr::null_mut());

        while let Some(ptr) = stack.pop() {
            if ptr.is_null() {
                continue;
            }
            unsafe {
                let node = node_ref(ptr);
                debug_assert!(
                    !node.is_marked(),
                    "INVARIANT VIOLATION: marked node {} reachable at drop time",
                    node.key()
                );
                stack.push(node.left());
                stack.push(node.right());
                TreeNode::dealloc_ptr(ptr);
            }
        }
    }
}

// ============================================================================
// Tests - shape-specific
// ============================================================================
// Note: implementation-independent tests are in common_tests

#[cfg(test)]
mod tests {
    use super::*;
    use crate::guard::DeferredGuard;

    type Tree = LockedTree<DeferredGuard>;

    fn tree_of(keys: &[Key]) -> Tree {
        let tree = Tree::new();
        for &key in keys {
            assert!(tree.insert(key));
        }
        tree
    }

    fn root_key(tree: &Tree) -> Option<Key> {
        let root = tree.head.right();
        (!root.is_null()).then(|| unsafe { node_ref(root) }.key())
    }

    fn child_key(tree: &Tree, key: Key, side: ChildSide) -> Option<Key> {
        let edge = tree.search_once(key);
        assert!(!edge.is_sentinel(), "key {} not in tree", key);
        let child = unsafe { node_ref(edge.current) }.child(side);
        (!child.is_null()).then(|| unsafe { node_ref(child) }.key())
    }

    #[test]
    fn search_on_empty_tree_stops_under_head() {
        let tree = Tree::new();
        let edge = tree.search_once(42);

        assert_eq!(edge.parent, tree.head_ptr());
        assert!(edge.is_sentinel());
        assert_eq!(edge.side, ChildSide::Right);
    }

    #[test]
    fn search_reports_attach_point_for_absent_key() {
        let tree = tree_of(&[10, 5, 15]);
        let edge = tree.search(12);

        assert!(edge.is_sentinel());
        assert_eq!(unsafe { node_ref(edge.parent) }.key(), 15);
        assert_eq!(edge.side, ChildSide::Left);
    }

    #[test]
    fn validate_rejects_edge_to_removed_node() {
        let tree = tree_of(&[10, 5, 15]);
        let edge = tree.search(5);
        assert!(tree.validate(&edge));

        assert!(tree.remove(5));
        assert!(!tree.validate(&edge));
    }

    #[test]
    fn validate_rejects_filled_sentinel_slot() {
        let tree = tree_of(&[10]);
        let edge = tree.search(20);
        assert!(tree.validate(&edge));

        assert!(tree.insert(20));
        assert!(!tree.validate(&edge));
    }

    #[test]
    fn remove_leaf() {
        let tree = tree_of(&[10, 5, 15]);
        assert!(tree.remove(5));

        assert_eq!(child_key(&tree, 10, ChildSide::Left), None);
        assert_eq!(tree.to_vec(), vec![10, 15]);
    }

    #[test]
    fn remove_node_with_only_left_child() {
        let tree = tree_of(&[10, 5, 3]);
        assert!(tree.remove(5));

        assert_eq!(child_key(&tree, 10, ChildSide::Left), Some(3));
        assert_eq!(tree.to_vec(), vec![3, 10]);
    }

    #[test]
    fn remove_node_with_only_right_child() {
        let tree = tree_of(&[10, 5, 7]);
        assert!(tree.remove(5));

        assert_eq!(child_key(&tree, 10, ChildSide::Left), Some(7));
        assert_eq!(tree.to_vec(), vec![7, 10]);
    }

    #[test]
    fn remove_root_with_single_child_updates_head() {
        let tree = tree_of(&[10, 20]);
        assert!(tree.remove(10));

        assert_eq!(root_key(&tree), Some(20));
    }

    #[test]
    fn binary_removal_successor_is_right_leaf() {
        let tree = tree_of(&[10, 5, 15]);
        assert!(tree.remove(10));

        assert_eq!(root_key(&tree), Some(15));
        assert_eq!(child_key(&tree, 15, ChildSide::Left), Some(5));
        assert_eq!(child_key(&tree, 15, ChildSide::Right), None);
        tree.verify_structure().unwrap();
    }

    #[test]
    fn binary_removal_successor_is_deep_leaf() {
        let tree = tree_of(&[10, 5, 15, 12, 20]);
        assert!(tree.remove(10));

        assert_eq!(root_key(&tree), Some(12));
        assert_eq!(child_key(&tree, 12, ChildSide::Left), Some(5));
        assert_eq!(child_key(&tree, 12, ChildSide::Right), Some(15));
        assert_eq!(child_key(&tree, 15, ChildSide::Left), None);
        assert_eq!(tree.keysum(), 52);
        tree.verify_structure().unwrap();
    }

    #[test]
    fn binary_removal_relocates_successor_with_right_child() {
        let tree = tree_of(&[10, 5, 20, 15, 17]);
        assert!(tree.remove(10));

        assert_eq!(root_key(&tree), Some(15));
        assert_eq!(child_key(&tree, 15, ChildSide::Left), Some(5));
        assert_eq!(child_key(&tree, 15, ChildSide::Right), Some(20));
        assert_eq!(child_key(&tree, 20, ChildSide::Left), Some(17));
        assert_eq!(child_key(&tree, 17, ChildSide::Left), None);
        assert_eq!(tree.to_vec(), vec![5, 15, 17, 20]);
        tree.verify_structure().unwrap();
    }

    #[test]
    fn relocation_leaves_no_cycle_between_successor_and_leftmost() {
        let tree = tree_of(&[10, 5, 20, 15, 17]);
        assert!(tree.remove(10));

        let edge = tree.search(16);
        assert!(edge.is_sentinel());
        assert_eq!(unsafe { node_ref(edge.parent) }.key(), 17);
        assert_eq!(edge.side, ChildSide::Left);

        assert!(!tree.contains(16));
        assert!(tree.insert(16));
        assert_eq!(child_key(&tree, 17, ChildSide::Left), Some(16));
        assert_eq!(tree.to_vec(), vec![5, 15, 16, 17, 20]);
        tree.verify_structure().unwrap();
    }

    #[test]
    fn binary_removal_relocates_direct_right_child() {
        // Successor is the removed node's right child and has a right subtree:
        // relocation locks the successor a second time as the leftmost node's
        // parent.
        let tree = tree_of(&[10, 5, 15, 20]);
        assert!(tree.remove(10));

        assert_eq!(root_key(&tree), Some(15));
        assert_eq!(child_key(&tree, 15, ChildSide::Left), Some(5));
        assert_eq!(child_key(&tree, 15, ChildSide::Right), Some(20));
        assert_eq!(child_key(&tree, 20, ChildSide::Left), None);
        tree.verify_structure().unwrap();
    }

    #[test]
    fn removal_defers_exactly_the_removed_node() {
        let tree = tree_of(&[10, 5, 20, 15, 17, 3, 8]);

        assert!(tree.remove(10));
        assert!(tree.remove(3));
        assert!(!tree.remove(3));
        assert!(tree.remove(15));

        assert_eq!(tree.guard().pending(), 3);
        assert_eq!(tree.to_vec(), vec![5, 8, 17, 20]);
    }

    #[test]
    fn verify_structure_reports_marked_reachable_node() {
        let tree = tree_of(&[10, 5]);
        let edge = tree.search(5);
        unsafe { node_ref(edge.current) }.mark();

        assert_eq!(
            tree.verify_structure(),
            Err(TreeError::MarkedNodeReachable(5))
        );

        // Unlink by hand so drop does not trip over the marked node.
        unsafe { node_ref(edge.parent) }.set_child(edge.side, ptr::null_mut());
        unsafe { TreeNode::dealloc_ptr(edge.current) };
    }

    #[test]
    fn verify_structure_reports_order_violation() {
        let tree = tree_of(&[10, 5]);
        let five = tree.search(5);
        let rogue = Box::into_raw(Box::new(TreeNode::new(12)));
        unsafe { node_ref(five.current) }.set_child(ChildSide::Right, rogue);

        assert_eq!(
            tree.verify_structure(),
            Err(TreeError::OrderViolation {
                parent: 5,
                child: 12,
                side: "right",
            })
        );
    }

    #[test]
    fn deep_sequential_tree_is_traversed_without_recursion() {
        let tree = Tree::new();
        let count = 3_000;
        for key in 1..=count {
            assert!(tree.insert(key));
        }

        assert_eq!(tree.size(), count as usize);
        assert_eq!(tree.keysum(), Keysum::from(count * (count + 1) / 2));
        assert_eq!(tree.to_vec().len(), count as usize);
        tree.verify_structure().unwrap();
    }

    #[test]
    #[should_panic(expected = "reserved for the head sentinel")]
    fn insert_reserved_key_panics() {
        let tree = Tree::new();
        tree.insert(RESERVED_KEY);
    }

    #[test]
    fn try_insert_rejects_reserved_key() {
        let tree = Tree::new();
        assert_eq!(
            tree.try_insert(RESERVED_KEY),
            Err(TreeError::ReservedKey(RESERVED_KEY))
        );
        assert!(tree.is_empty());
        assert_eq!(tree.try_insert(1), Ok(true));
        assert_eq!(tree.try_insert(1), Ok(false));
    }

    #[test]
    fn reserved_key_is_never_found_or_removed() {
        let tree = tree_of(&[1, -1]);
        assert!(!tree.contains(RESERVED_KEY));
        assert!(!tree.remove(RESERVED_KEY));
        assert_eq!(tree.size(), 2);
    }
}
