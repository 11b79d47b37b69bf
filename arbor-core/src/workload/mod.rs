//! Fixed-operation-count workload driver.
//!
//! Worker threads draw keys uniformly from `1..=key_range` and pick an
//! operation from an [`OperationMix`]. Each worker tracks the net change in
//! keysum its successful updates caused; after the workers join, the sum of
//! those deltas must equal the change in the set's own keysum. A mismatch
//! means an update was lost or duplicated.

mod config;
mod driver;
mod operation_mix;

pub use config::WorkloadConfig;
pub use driver::{
    FillReport, ThreadTally, TrialReport, fill_to_steady_state, run_fixed_ops, run_trial,
    verify_keysum,
};
pub use operation_mix::{Operation, OperationMix};

pub use crate::error::WorkloadError;

pub type Result<T> = std::result::Result<T, WorkloadError>;
