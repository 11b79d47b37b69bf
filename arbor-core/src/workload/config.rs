use std::thread;

use crate::data_structures::Key;

use super::{OperationMix, Result, WorkloadError};

/// Parameters for one workload run.
#[derive(Debug, Clone, PartialEq)]
pub struct WorkloadConfig {
    pub threads: usize,
    pub ops_per_thread: usize,
    /// Keys are drawn uniformly from `1..=key_range`.
    pub key_range: Key,
    pub mix: OperationMix,
    pub seed: u64,
    /// Fill the set to its steady-state size before the measured phase.
    pub prefill: bool,
}

impl Default for WorkloadConfig {
    fn default() -> Self {
        WorkloadConfig {
            threads: thread::available_parallelism().map_or(4, |n| n.get()),
            ops_per_thread: 10_000,
            key_range: 10_000,
            mix: OperationMix::default(),
            seed: 0x5eed,
            prefill: true,
        }
    }
}

impl WorkloadConfig {
    pub fn with_threads(mut self, threads: usize) -> Self {
        self.threads = threads;
        self
    }

    pub fn with_ops_per_thread(mut self, ops_per_thread: usize) -> Self {
        self.ops_per_thread = ops_per_thread;
        self
    }

    pub fn with_key_range(mut self, key_range: Key) -> Self {
        self.key_range = key_range;
        self
    }

    pub fn with_mix(mut self, mix: OperationMix) -> Self {
        self.mix = mix;
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    pub fn with_prefill(mut self, prefill: bool) -> Self {
        self.prefill = prefill;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.threads == 0 {
            return Err(WorkloadError::NoThreads);
        }
        if self.key_range < 1 {
            return Err(WorkloadError::InvalidKeyRange(self.key_range));
        }
        Ok(())
    }
}
