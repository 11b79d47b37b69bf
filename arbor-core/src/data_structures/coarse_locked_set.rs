use std::collections::BTreeSet;

use parking_lot::Mutex;

use crate::data_structures::{Key, Keysum, OrderedSet, RESERVED_KEY};

/// A `BTreeSet` behind one global lock.
///
/// Every operation serialises on the same mutex, so it is trivially
/// linearizable. Serves as the reference model in tests and as the
/// global-lock baseline in benchmarks.
///
#[derive(Default)]
pub struct CoarseLockedSet {
    keys: Mutex<BTreeSet<Key>>,
}

impl CoarseLockedSet {
    pub fn new() -> Self {
        Self::default()
    }
}

impl OrderedSet for CoarseLockedSet {
    fn insert(&self, key: Key) -> bool {
        assert_ne!(
            key, RESERVED_KEY,
            "key {} is reserved for the head sentinel",
            key
        );
        self.keys.lock().insert(key)
    }

    fn remove(&self, key: Key) -> bool {
        self.keys.lock().remove(&key)
    }

    fn contains(&self, key: Key) -> bool {
        self.keys.lock().contains(&key)
    }

    fn size(&self) -> usize {
        self.keys.lock().len()
    }

    fn keysum(&self) -> Keysum {
        self.keys.lock().iter().map(|&key| Keysum::from(key)).sum()
    }

    fn to_vec(&self) -> Vec<Key> {
        self.keys.lock().iter().copied().collect()
    }
}
