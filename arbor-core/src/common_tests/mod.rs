//! Generic test bodies shared by every `OrderedSet` implementation.
//!
//! Integration tests in each crate instantiate these for their own set types.
