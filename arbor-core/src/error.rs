use thiserror::Error;

use crate::data_structures::{Key, Keysum};

/// Errors reported by the tree itself.
///
/// Lost validation races are never surfaced: they restart the operation.
/// These variants cover caller precondition violations and structural
/// defects found by a quiescent verification pass.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TreeError {
    #[error("key {0} is reserved for the head sentinel and cannot be inserted")]
    ReservedKey(Key),

    #[error("key {child} is out of order in the {side} subtree of key {parent}")]
    OrderViolation {
        parent: Key,
        child: Key,
        side: &'static str,
    },

    #[error("marked node with key {0} is still reachable from the head")]
    MarkedNodeReachable(Key),
}

pub type Result<T> = std::result::Result<T, TreeError>;

/// Errors reported by the workload driver.
///
/// `KeysumMismatch` means the concurrency protocol lost or duplicated an
/// update. It is never retried: callers treat it as a failed assertion.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum WorkloadError {
    #[error(
        "invalid operation mix {insert}i-{remove}d: fractions must be non-negative and sum to at most 1"
    )]
    InvalidMix { insert: f64, remove: f64 },

    #[error("key range must be at least 1, got {0}")]
    InvalidKeyRange(Key),

    #[error("a workload needs at least one thread")]
    NoThreads,

    #[error(
        "could not reach steady state after {repetitions} repetitions: size {size}, expected {expected}"
    )]
    SteadyStateNotReached {
        repetitions: usize,
        size: usize,
        expected: usize,
    },

    #[error("keysum mismatch: workers tracked {expected}, set reports {actual}")]
    KeysumMismatch { expected: Keysum, actual: Keysum },

    #[error(transparent)]
    Tree(#[from] TreeError),
}
