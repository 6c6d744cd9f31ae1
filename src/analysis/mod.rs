//! Analysis modules.
//!
//! Orchestration of the collectors and post-processing of their output.

pub mod aggregator;

pub use aggregator::*;
