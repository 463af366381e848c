//! Loads a terse JSON description of a control-flow graph, for driving the
//! pass without a real instruction stream — the CLI's demo/debug mode.

use serde::Deserialize;
use swtc_core::cfg::{BlockIndex, ControlFlowGraph, EdgeFlags};
use swtc_core::target::DemoInstr;
use swtc_core::ReorderError;

#[derive(Debug, Deserialize)]
pub struct BlockDescription {
    pub frequency: i32,
    #[serde(default)]
    pub count: i64,
    /// Length, in target length units, of a single placeholder instruction
    /// synthesized to occupy the block; `0` leaves it empty.
    #[serde(default)]
    pub length: u32,
}

#[derive(Debug, Deserialize)]
pub struct EdgeDescription {
    pub src: BlockIndex,
    pub dst: BlockIndex,
    pub probability: i32,
    #[serde(default)]
    pub count: i64,
    #[serde(default)]
    pub can_fallthru: bool,
    #[serde(default)]
    pub is_fallthru: bool,
    #[serde(default)]
    pub complex: bool,
}

#[derive(Debug, Deserialize)]
pub struct CfgDescription {
    pub entry: BlockIndex,
    pub blocks: Vec<BlockDescription>,
    pub edges: Vec<EdgeDescription>,
}

/// Parses a [`CfgDescription`] from JSON text.
pub fn parse(text: &str) -> Result<CfgDescription, ReorderError> {
    serde_json::from_str(text).map_err(|e| ReorderError::CfgDescriptionError(e.to_string()))
}

/// Builds a `ControlFlowGraph<DemoInstr>` from a parsed description.
pub fn build_graph(desc: &CfgDescription) -> Result<ControlFlowGraph<DemoInstr>, ReorderError> {
    if desc.entry as usize >= desc.blocks.len() {
        return Err(ReorderError::UnknownBlockIndex(desc.entry));
    }

    let mut graph = ControlFlowGraph::new(desc.entry);
    for b in &desc.blocks {
        let idx = graph.add_block(b.frequency, b.count);
        if b.length > 0 {
            graph.block_mut(idx).instructions.push(DemoInstr::Plain(b.length));
        }
    }

    for e in &desc.edges {
        if e.src as usize >= desc.blocks.len() {
            return Err(ReorderError::UnknownBlockIndex(e.src));
        }
        if e.dst as usize >= desc.blocks.len() {
            return Err(ReorderError::UnknownBlockIndex(e.dst));
        }
        let mut flags = EdgeFlags::empty();
        if e.can_fallthru {
            flags |= EdgeFlags::CAN_FALLTHRU;
        }
        if e.is_fallthru {
            flags |= EdgeFlags::FALLTHRU;
        }
        if e.complex {
            flags |= EdgeFlags::COMPLEX;
        }
        graph.add_edge(e.src, e.dst, e.probability, e.count, flags);
    }

    graph.validate()?;
    Ok(graph)
}
