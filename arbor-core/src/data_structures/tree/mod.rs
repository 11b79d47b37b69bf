//! Binary search tree with per-node locks and optimistic unlocked search.

mod locked_tree;
mod tree_node;

pub use locked_tree::LockedTree;
