//! Basic-block reordering ("software trace cache") and hot/cold
//! partitioning for a compiler back-end.
//!
//! Consumes an already-built control-flow graph whose edges carry branch
//! probabilities and execution counts, and rearranges/partitions its blocks
//! in place. See [`pass`] for the two entry points.

pub mod cfg;
pub mod config;
pub mod error;
pub mod partition;
pub mod pass;
pub mod stats;
pub mod target;
pub mod trace;

pub use config::ReorderConfig;
pub use error::ReorderError;
pub use pass::{partition_hot_cold_basic_blocks, reorder_basic_blocks};
pub use stats::PassStats;
