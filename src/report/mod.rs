//! Result rendering.
//!
//! JSON envelopes and plain-text summaries for the CLI commands.

pub mod generator;

pub use generator::*;
