//! Crossbeam-based reclamation for arbor trees.
//!
//! This crate provides `EpochGuard`, an implementation of the `Guard` trait
//! using crossbeam-epoch for memory reclamation.
//!
//! # Usage
//!
//! ```
//! use arbor_core::OrderedSet;
//! use arbor_crossbeam::EpochTree;
//!
//! let tree = EpochTree::new();
//! tree.insert(42);
//! assert!(tree.contains(42));
//! ```

pub mod epoch_guard;

pub use epoch_guard::EpochGuard;

/// A `LockedTree` whose removed nodes are reclaimed by the global epoch
/// collector.
pub type EpochTree = arbor_core::LockedTree<EpochGuard>;
