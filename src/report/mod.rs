//! Report rendering for aggregation tables.

pub mod generator;

pub use generator::*;
