//! The CFG abstraction the reordering/partitioning core consumes and
//! mutates: blocks, edges, and the per-block layout side-band.

pub mod block;
pub mod edge;
pub mod graph;

pub use block::{BasicBlock, BlockIndex, BlockScratch, HeapSlot, Partition, RbiState, TraceId, ENTRY_BLOCK, EXIT_BLOCK};
pub use edge::{Edge, EdgeFlags, EdgeIndex};
pub use graph::{edge_frequency, ControlFlowGraph};
