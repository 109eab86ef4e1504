//! Analysis modules.
//!
//! Aggregation of per-experiment results into a single summary.

pub mod aggregator;

pub use aggregator::*;
