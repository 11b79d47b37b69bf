//! Concurrent ordered-set implementations.
//!
//! # Organization
//!
//! - [`tree`] - `LockedTree`, the fine-grained locking binary search tree
//! - [`coarse_locked_set`] - single-lock baseline used as a reference model
//! - [`ordered_set`] - the `OrderedSet` trait shared by both

pub mod coarse_locked_set;
pub mod ordered_set;
pub mod tree;

pub use coarse_locked_set::CoarseLockedSet;
pub use ordered_set::{CollectionNode, Key, Keysum, OrderedSet, RESERVED_KEY};
pub use tree::LockedTree;
