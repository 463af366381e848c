//! CFG edges.

use bitflags::bitflags;

use super::block::BlockIndex;

/// Stable integer index of an edge within a [`super::graph::ControlFlowGraph`].
pub type EdgeIndex = u32;

bitflags! {
    /// Bit-set of flags carried by every edge, mirroring the flag set the
    /// distilled design calls out.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct EdgeFlags: u8 {
        /// The edge may be realized as a fall-through in some layout.
        const CAN_FALLTHRU = 1 << 0;
        /// The edge is "complex": multiple edges share a source jump
        /// instruction (e.g. a table jump), or the edge is otherwise not a
        /// simple direct branch.
        const COMPLEX      = 1 << 1;
        /// The edge is *currently* realized as a fall-through in the block
        /// layout.
        const FALLTHRU     = 1 << 2;
        /// A synthetic edge inserted for analysis purposes only; never a
        /// candidate for trace growth.
        const FAKE         = 1 << 3;
        /// Identified by DFS as closing a loop (a back-edge).
        const DFS_BACK     = 1 << 4;
    }
}

/// An edge in the control-flow graph.
#[derive(Debug, Clone)]
pub struct Edge {
    pub src: BlockIndex,
    pub dst: BlockIndex,
    /// Branch probability, in `[0, PROB_BASE]`.
    pub probability: i32,
    /// Absolute profile count (may saturate).
    pub count: i64,
    pub flags: EdgeFlags,
    /// Set by the partition classifier; true iff `src` and `dst` partitions
    /// differ.
    pub crossing_edge: bool,
}

impl Edge {
    pub fn new(src: BlockIndex, dst: BlockIndex, probability: i32, count: i64, flags: EdgeFlags) -> Self {
        Edge {
            src,
            dst,
            probability,
            count,
            flags,
            crossing_edge: false,
        }
    }

    pub fn can_fallthru(&self) -> bool {
        self.flags.contains(EdgeFlags::CAN_FALLTHRU)
    }

    pub fn is_complex(&self) -> bool {
        self.flags.contains(EdgeFlags::COMPLEX)
    }

    pub fn is_fallthru(&self) -> bool {
        self.flags.contains(EdgeFlags::FALLTHRU)
    }

    pub fn is_fake(&self) -> bool {
        self.flags.contains(EdgeFlags::FAKE)
    }

    pub fn is_dfs_back(&self) -> bool {
        self.flags.contains(EdgeFlags::DFS_BACK)
    }

    pub fn dest_is_exit(&self) -> bool {
        self.dst == super::block::EXIT_BLOCK
    }
}
