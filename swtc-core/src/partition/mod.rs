//! Hot/cold partitioning: classification and the CFG surgery required to
//! make the partition physically realizable.

pub mod classify;
pub mod surgery;

pub use classify::classify_partitions;
pub use surgery::run_surgery;
