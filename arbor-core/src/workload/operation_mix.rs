use std::fmt;

use crate::data_structures::Key;

use super::{Result, WorkloadError};

/// One of the three set operations a worker can issue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    Insert,
    Remove,
    Contains,
}

/// Fractions of inserts and removes in a workload. The rest are lookups.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OperationMix {
    insert: f64,
    remove: f64,
}

// Below this the mix counts as lookup-only when building an update-only mix.
const NEGLIGIBLE_UPDATES: f64 = 1e-8;

impl OperationMix {
    pub fn new(insert: f64, remove: f64) -> Result<Self> {
        let valid = insert.is_finite()
            && remove.is_finite()
            && insert >= 0.0
            && remove >= 0.0
            && insert + remove <= 1.0;
        if !valid {
            return Err(WorkloadError::InvalidMix { insert, remove });
        }
        Ok(OperationMix { insert, remove })
    }

    pub fn read_only() -> Self {
        OperationMix {
            insert: 0.0,
            remove: 0.0,
        }
    }

    pub fn insert_fraction(&self) -> f64 {
        self.insert
    }

    pub fn remove_fraction(&self) -> f64 {
        self.remove
    }

    pub fn contains_fraction(&self) -> f64 {
        (1.0 - self.insert - self.remove).max(0.0)
    }

    /// The same insert:remove ratio with lookups dropped. A mix with no
    /// updates at all becomes an even split.
    pub fn updates_only(&self) -> OperationMix {
        let updates = self.insert + self.remove;
        if updates < NEGLIGIBLE_UPDATES {
            return OperationMix {
                insert: 0.5,
                remove: 0.5,
            };
        }
        // Remove takes the exact complement so no lookup fraction is left over.
        let insert = self.insert / updates;
        OperationMix {
            insert,
            remove: 1.0 - insert,
        }
    }

    /// Size a set settles at when keys from `1..=key_range` are inserted and
    /// removed at this ratio for long enough.
    pub fn expected_steady_size(&self, key_range: Key) -> usize {
        let normalized = self.updates_only();
        (key_range.max(0) as f64 * normalized.insert).round() as usize
    }

    /// Map a roll in `[0, 1)` onto an operation.
    pub fn pick(&self, roll: f64) -> Operation {
        if roll < self.insert {
            Operation::Insert
        } else if roll < self.insert + self.remove || self.contains_fraction() == 0.0 {
            Operation::Remove
        } else {
            Operation::Contains
        }
    }
}

impl Default for OperationMix {
    fn default() -> Self {
        OperationMix {
            insert: 0.25,
            remove: 0.25,
        }
    }
}

impl fmt::Display for OperationMix {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}i-{}d",
            (self.insert * 100.0).round() as u32,
            (self.remove * 100.0).round() as u32
        )
    }
}
