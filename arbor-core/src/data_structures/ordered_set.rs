use crate::error::{Result, TreeError};

/// Key type stored by the collections in this crate.
pub type Key = i64;

/// Key held by the head of a `LockedTree`. Never a legal user key.
pub const RESERVED_KEY: Key = Key::MIN;

/// Sum of keys. Wide enough that no sequence of `i64` keys overflows it in
/// practice.
pub type Keysum = i128;

pub trait CollectionNode {
    fn key(&self) -> Key;

    /// Deallocate this node.
    ///
    /// # Safety
    /// - The pointer must have been allocated by the collection that created it
    /// - Must only be called once
    /// - Node must not be accessed after this call
    ///
    /// The default uses `Box::from_raw`, which matches nodes allocated with
    /// `Box::new`.
    ///
    unsafe fn dealloc_ptr(ptr: *mut Self)
    where
        Self: Sized,
    {
        // SAFETY: caller must ensure ptr was allocated with Box::new
        unsafe { drop(Box::from_raw(ptr)) };
    }
}

/// A concurrent set of integer keys kept in order.
///
/// `insert`, `remove` and `contains` may be called from any number of threads.
/// The aggregate queries (`size`, `keysum`, `to_vec`, `verify_structure`) walk
/// the whole structure without synchronisation and are only meaningful when no
/// writer is active, e.g. after all worker threads have been joined.
///
/// ```text
/// LockedTree<EpochGuard>     - per-node locks, epoch reclamation
/// LockedTree<DeferredGuard>  - per-node locks, reclamation at drop (tests)
/// CoarseLockedSet            - one global lock, reference baseline
/// ```
///
pub trait OrderedSet {
    /// Insert a key.
    ///
    /// Returns `true` if the key was inserted, `false` if it was present.
    ///
    /// # Panics
    /// Panics if `key` is `RESERVED_KEY`. Use `try_insert` to get an error
    /// instead.
    ///
    fn insert(&self, key: Key) -> bool;

    /// Remove a key.
    ///
    /// Returns `true` if the key was removed, `false` if it was absent.
    ///
    fn remove(&self, key: Key) -> bool;

    /// Check whether a key is present.
    ///
    fn contains(&self, key: Key) -> bool;

    /// Number of keys. Quiescent only.
    ///
    fn size(&self) -> usize;

    /// Sum of all keys. Quiescent only.
    ///
    fn keysum(&self) -> Keysum;

    /// All keys in ascending order. Quiescent only.
    ///
    fn to_vec(&self) -> Vec<Key>;

    /// Check the structural invariants. Quiescent only.
    ///
    fn verify_structure(&self) -> Result<()> {
        Ok(())
    }

    /// Insert a key, rejecting the reserved key with an error.
    ///
    fn try_insert(&self, key: Key) -> Result<bool> {
        if key == RESERVED_KEY {
            return Err(TreeError::ReservedKey(key));
        }
        Ok(self.insert(key))
    }

    fn is_empty(&self) -> bool {
        self.size() == 0
    }
}
