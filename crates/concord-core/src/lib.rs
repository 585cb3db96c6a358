//! # concord-core
//!
//! Device-independent foundation for the concord ARI engine: the unified
//! error type, the partition tensor view, pair-index arithmetic shared with
//! the device code, the CPU reference scorer, and the score container with
//! the max-coefficient reduction.

pub mod errors;
pub mod index;
pub mod reference;
pub mod types;

pub use errors::{ConcordError, Result};
pub use types::{AriScores, FeaturePairMax, PartitionSet};
