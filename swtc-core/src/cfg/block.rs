//! Basic blocks and their layout side-band.

use smallvec::SmallVec;

use crate::target::Instr;

use super::edge::EdgeIndex;

/// Stable integer index of a basic block within a [`super::graph::ControlFlowGraph`].
pub type BlockIndex = u32;

/// Sentinel destination meaning "the function's synthetic exit", never a
/// real stored block.
pub const EXIT_BLOCK: BlockIndex = u32::MAX;

/// Sentinel source meaning "the function's synthetic entry", never a real
/// stored block. Used only when checking whether a predecessor is the
/// synthetic entry in `bb_to_key` (§4.1).
pub const ENTRY_BLOCK: BlockIndex = u32::MAX - 1;

/// A block's id within a trace; `0` means "not yet assigned to a trace".
pub type TraceId = u32;

/// Hot/cold classification of a block, assigned by the partition classifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Partition {
    Unset,
    Hot,
    Cold,
}

impl Partition {
    pub fn is_cold(&self) -> bool {
        matches!(self, Partition::Cold)
    }
}

/// A handle into one of the trace builder's two heaps (current-round,
/// next-round), recorded per-block so a block's resident heap/key can be
/// looked up and updated in place while it is a live seed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HeapSlot {
    Current,
    Next,
}

/// Per-block scratch used only while the trace builder and connector are
/// running (`bbd[i]` in the distilled design). Lives for the duration of one
/// `reorder_basic_blocks` call.
#[derive(Debug, Clone, Default)]
pub struct BlockScratch {
    pub start_of_trace: Option<TraceId>,
    pub end_of_trace: Option<TraceId>,
    /// The heap the block currently lives in, and the key it was pushed
    /// with — used to discard stale pops under the lazy-deletion heap
    /// (see the trace module).
    pub heap_slot: Option<HeapSlot>,
    pub current_key: i64,
}

/// Grows `scratch` to cover `needed_index`, if it doesn't already, by the
/// `ceil(n * 5/4)` factor the design specifies for `bbd`.
pub fn grow_scratch(scratch: &mut Vec<BlockScratch>, needed_index: BlockIndex) {
    let needed = needed_index as usize + 1;
    if scratch.len() < needed {
        let grown = crate::config::grow_capacity(needed).max(needed);
        scratch.resize(grown, BlockScratch::default());
    }
}

/// Mutable layout side-band attached to every block: the `next` pointer of
/// the final chain, whether (and by which trace) the block has been
/// visited, and a detached footer instruction chain appended after the
/// block once the final layout is emitted.
#[derive(Debug, Clone, Default)]
pub struct RbiState<I> {
    pub next: Option<BlockIndex>,
    /// `0` = unvisited; otherwise the id of the trace that first visited it.
    pub visited: TraceId,
    pub footer: Vec<I>,
}

impl<I> RbiState<I> {
    pub fn is_visited(&self) -> bool {
        self.visited != 0
    }
}

/// A basic block as the reordering/partitioning core consumes it.
#[derive(Debug, Clone)]
pub struct BasicBlock<I> {
    pub index: BlockIndex,
    pub frequency: i32,
    pub count: i64,
    pub partition: Partition,
    pub successors: SmallVec<[EdgeIndex; 4]>,
    pub predecessors: SmallVec<[EdgeIndex; 4]>,
    pub instructions: Vec<I>,
    /// Liveness at block entry/exit, when available from an earlier data-flow
    /// pass. Optional: most tests and the CLI demo never populate this.
    pub global_live_at_start: Option<smallvec::SmallVec<[u32; 8]>>,
    pub global_live_at_end: Option<smallvec::SmallVec<[u32; 8]>>,
    pub rbi: RbiState<I>,
}

impl<I> BasicBlock<I> {
    pub fn new(index: BlockIndex, frequency: i32, count: i64) -> Self {
        BasicBlock {
            index,
            frequency,
            count,
            partition: Partition::Unset,
            successors: SmallVec::new(),
            predecessors: SmallVec::new(),
            instructions: Vec::new(),
            global_live_at_start: None,
            global_live_at_end: None,
            rbi: RbiState::default(),
        }
    }

    pub fn last_instr(&self) -> Option<&I>
    where
        I: Instr,
    {
        self.instructions.last()
    }
}
