//! Analysis modules.
//!
//! Aggregation of version exports into month/observation tallies.

pub mod aggregator;

pub use aggregator::*;
