//! Concurrent binary search tree with fine-grained per-node locking.
//!
//! Disjoint-key operations proceed in parallel: searches are lock-free and
//! optimistic, and mutations lock only the edge they change, validating it
//! before writing. Memory reclamation of removed nodes is pluggable through
//! the [`Guard`] trait.

pub mod common_tests;
pub mod data_structures;
pub mod error;
pub mod guard;
pub mod workload;

pub use data_structures::{
    CoarseLockedSet, Key, Keysum, LockedTree, OrderedSet, RESERVED_KEY,
};
pub use error::TreeError;
pub use guard::{DeferredGuard, Guard};
