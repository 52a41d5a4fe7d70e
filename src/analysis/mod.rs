//! Analysis modules.
//!
//! Aggregation of agent findings and their deduplication into patch
//! candidates.

pub mod aggregator;
pub mod dedup;

pub use aggregator::*;
pub use dedup::*;
