//! Terse synthetic-CFG builder shared by the integration tests. Lets a test
//! describe a function as a block/edge list without a real instruction
//! stream.

use swtc_core::cfg::{BlockIndex, ControlFlowGraph, EdgeFlags};
use swtc_core::target::DemoInstr;

pub struct BlockSpec {
    pub frequency: i32,
    pub count: i64,
}

pub fn block(frequency: i32, count: i64) -> BlockSpec {
    BlockSpec { frequency, count }
}

pub struct EdgeSpec {
    pub src: BlockIndex,
    pub dst: BlockIndex,
    pub probability: i32,
    pub count: i64,
    pub flags: EdgeFlags,
}

pub fn edge(src: BlockIndex, dst: BlockIndex, probability: i32, count: i64, flags: EdgeFlags) -> EdgeSpec {
    EdgeSpec { src, dst, probability, count, flags }
}

/// Builds a graph from a block list (index = position) and an edge list.
/// Every block gets a single zero-length placeholder instruction so
/// `Instr`-bounded passes have something to inspect.
pub fn build(entry: BlockIndex, blocks: Vec<BlockSpec>, edges: Vec<EdgeSpec>) -> ControlFlowGraph<DemoInstr> {
    let mut graph = ControlFlowGraph::new(entry);
    for b in blocks {
        let idx = graph.add_block(b.frequency, b.count);
        graph.block_mut(idx).instructions.push(DemoInstr::Plain(4));
    }
    for e in edges {
        graph.add_edge(e.src, e.dst, e.probability, e.count, e.flags);
    }
    graph
}
