//! The control-flow graph arena: blocks and edges addressed by integer
//! index, never by owning pointer. The graph is mutated in place by block
//! duplication and by partition surgery.

use crate::config::PROB_BASE;
use crate::error::ReorderError;

use super::block::{BasicBlock, BlockIndex, ENTRY_BLOCK, EXIT_BLOCK};
use super::edge::{Edge, EdgeFlags, EdgeIndex};

/// A control-flow graph over blocks carrying instructions of type `I`.
///
/// Blocks and edges are stored in parallel arenas and referenced by index;
/// `Option<BlockIndex>` is never used to mean "no block" for a real
/// successor — use the [`EXIT_BLOCK`] sentinel for that, matching the
/// distilled design's treatment of the function's synthetic exit.
#[derive(Debug, Clone)]
pub struct ControlFlowGraph<I> {
    blocks: Vec<BasicBlock<I>>,
    edges: Vec<Edge>,
    entry: BlockIndex,
    /// Edges out of the synthetic entry block, used once to compute
    /// `max_entry_frequency`/`max_entry_count`.
    entry_edges: Vec<EdgeIndex>,
}

impl<I> ControlFlowGraph<I> {
    pub fn new(entry: BlockIndex) -> Self {
        ControlFlowGraph {
            blocks: Vec::new(),
            edges: Vec::new(),
            entry,
            entry_edges: Vec::new(),
        }
    }

    pub fn entry(&self) -> BlockIndex {
        self.entry
    }

    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    pub fn block(&self, i: BlockIndex) -> &BasicBlock<I> {
        &self.blocks[i as usize]
    }

    pub fn block_mut(&mut self, i: BlockIndex) -> &mut BasicBlock<I> {
        &mut self.blocks[i as usize]
    }

    pub fn try_block(&self, i: BlockIndex) -> Option<&BasicBlock<I>> {
        self.blocks.get(i as usize)
    }

    pub fn blocks(&self) -> impl Iterator<Item = &BasicBlock<I>> {
        self.blocks.iter()
    }

    pub fn block_indices(&self) -> impl Iterator<Item = BlockIndex> {
        0..self.blocks.len() as BlockIndex
    }

    pub fn edge(&self, i: EdgeIndex) -> &Edge {
        &self.edges[i as usize]
    }

    pub fn edge_mut(&mut self, i: EdgeIndex) -> &mut Edge {
        &mut self.edges[i as usize]
    }

    pub fn edges(&self) -> impl Iterator<Item = &Edge> {
        self.edges.iter()
    }

    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    pub fn entry_edges(&self) -> &[EdgeIndex] {
        &self.entry_edges
    }

    /// Adds a new block with no edges yet attached. Returns its index.
    pub fn add_block(&mut self, frequency: i32, count: i64) -> BlockIndex {
        let index = self.blocks.len() as BlockIndex;
        self.blocks.push(BasicBlock::new(index, frequency, count));
        index
    }

    /// Adds an edge `src -> dst` and registers it in both blocks' adjacency
    /// lists. `dst == EXIT_BLOCK` is allowed and simply skips updating any
    /// destination block's predecessor list.
    pub fn add_edge(&mut self, src: BlockIndex, dst: BlockIndex, probability: i32, count: i64, flags: EdgeFlags) -> EdgeIndex {
        let idx = self.edges.len() as EdgeIndex;
        self.edges.push(Edge::new(src, dst, probability, count, flags));
        if src != ENTRY_BLOCK {
            self.blocks[src as usize].successors.push(idx);
        } else {
            self.entry_edges.push(idx);
        }
        if dst != EXIT_BLOCK {
            self.blocks[dst as usize].predecessors.push(idx);
        }
        idx
    }

    /// Duplicates `block`, attaching a copy of its instructions and a copy
    /// of every outgoing edge to a freshly allocated block, then redirects
    /// `incoming_edge` (previously terminating at `block`) to the copy.
    /// Standing in for the host compiler's `duplicate_block` primitive,
    /// which the distilled design treats as an external collaborator; the
    /// core still needs *a* concrete duplication to realize the
    /// trace-builder and connector's duplication steps against, so this
    /// gives it the obvious one.
    pub fn duplicate_block(&mut self, block: BlockIndex, incoming_edge: EdgeIndex) -> BlockIndex
    where
        I: Clone,
    {
        let src = self.block(block).clone();
        let new_index = self.blocks.len() as BlockIndex;
        let mut new_block = BasicBlock::new(new_index, src.frequency, src.count);
        new_block.instructions = src.instructions.clone();
        new_block.partition = src.partition;
        self.blocks.push(new_block);

        let out_edges: Vec<Edge> = src.successors.iter().map(|&e| self.edge(e).clone()).collect();
        for e in out_edges {
            self.add_edge(new_index, e.dst, e.probability, e.count, e.flags);
        }

        self.redirect_edge_succ(incoming_edge, new_index);
        new_index
    }

    /// Redirects an existing edge's destination to `new_dst`, fixing up
    /// both the old and new destination's predecessor lists. Used by
    /// partition surgery when retargeting a crossing branch.
    pub fn redirect_edge_succ(&mut self, edge: EdgeIndex, new_dst: BlockIndex) {
        let old_dst = self.edges[edge as usize].dst;
        if old_dst != EXIT_BLOCK {
            self.blocks[old_dst as usize].predecessors.retain(|&e| e != edge);
        }
        self.edges[edge as usize].dst = new_dst;
        if new_dst != EXIT_BLOCK {
            self.blocks[new_dst as usize].predecessors.push(edge);
        }
    }

    /// The single outgoing edge of `b`, or `None` if it has zero or more
    /// than one successor.
    pub fn single_successor(&self, b: BlockIndex) -> Option<EdgeIndex> {
        let succs = &self.blocks[b as usize].successors;
        if succs.len() == 1 {
            Some(succs[0])
        } else {
            None
        }
    }

    /// Sums the probabilities of a block's outgoing edges; used by internal
    /// consistency checks and tests (should equal `PROB_BASE` for any block
    /// with at least one real successor).
    pub fn outgoing_probability_sum(&self, b: BlockIndex) -> i32 {
        self.blocks[b as usize]
            .successors
            .iter()
            .map(|&e| self.edges[e as usize].probability)
            .sum()
    }

    /// Validates that every edge references an in-range block index (or the
    /// EXIT sentinel) and that the designated entry block itself is
    /// in-range.
    pub fn validate(&self) -> Result<(), ReorderError> {
        if self.blocks.is_empty() {
            return Ok(());
        }
        if self.entry as usize >= self.blocks.len() {
            return Err(ReorderError::UnknownBlockIndex(self.entry));
        }
        for e in &self.edges {
            if e.src != ENTRY_BLOCK && e.src as usize >= self.blocks.len() {
                return Err(ReorderError::UnknownBlockIndex(e.src));
            }
            if e.dst != EXIT_BLOCK && e.dst as usize >= self.blocks.len() {
                return Err(ReorderError::UnknownBlockIndex(e.dst));
            }
        }
        Ok(())
    }
}

/// `edge_frequency(p -> b)`: the execution frequency attributable to a
/// specific edge, derived from the source block's frequency and the edge's
/// probability.
pub fn edge_frequency<I>(graph: &ControlFlowGraph<I>, edge: EdgeIndex) -> i32 {
    let e = graph.edge(edge);
    if e.src == ENTRY_BLOCK {
        return e.count.min(i32::MAX as i64) as i32;
    }
    let src_freq = graph.block(e.src).frequency as i64;
    ((src_freq * e.probability as i64) / PROB_BASE as i64) as i32
}
