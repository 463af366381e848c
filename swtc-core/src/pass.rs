//! Pass drivers: the two entry points the host compiler calls.

use log::info;

use crate::cfg::{BlockScratch, ControlFlowGraph};
use crate::config::ReorderConfig;
use crate::partition::{classify_partitions, run_surgery};
use crate::stats::PassStats;
use crate::target::Instr;
use crate::trace::{connect_traces, find_traces};

/// Rearranges the function's basic blocks into traces and connects them
/// into a single linear layout. Mutates `graph`'s `rbi.next` chain in
/// place. Early-returns (no mutation) when the function has at most one
/// basic block or the target forbids touching jumps.
pub fn reorder_basic_blocks<I: Instr + Clone>(graph: &mut ControlFlowGraph<I>, config: &ReorderConfig) -> PassStats {
    let mut stats = PassStats { blocks: graph.len(), ..Default::default() };

    if graph.len() <= 1 || config.target().cannot_modify_jumps_p() {
        info!("reorder_basic_blocks: early return ({} blocks)", graph.len());
        return stats;
    }

    let before = graph.len();
    let mut scratch: Vec<BlockScratch> = vec![BlockScratch::default(); graph.len()];

    let mut traces = find_traces(graph, &mut scratch, config);
    info!("reorder_basic_blocks: formed {} traces", traces.len());

    if !traces.is_empty() {
        connect_traces(graph, &mut scratch, &mut traces, config);
    }

    stats.traces_formed = traces.len();
    stats.blocks_duplicated = graph.len().saturating_sub(before);
    stats
}

/// Classifies every block hot/cold and rewrites the CFG so the partition is
/// physically realizable (labels, fall-through fixup, branch
/// thunking/indirection). Early-returns when the function has at most one
/// basic block.
pub fn partition_hot_cold_basic_blocks<I: Instr + Clone>(graph: &mut ControlFlowGraph<I>, config: &ReorderConfig) -> PassStats {
    let mut stats = PassStats { blocks: graph.len(), ..Default::default() };

    if graph.len() <= 1 {
        info!("partition_hot_cold_basic_blocks: early return ({} blocks)", graph.len());
        return stats;
    }

    let crossing = classify_partitions(graph, config.target());
    info!("partition_hot_cold_basic_blocks: {} crossing edges before surgery", crossing.len());
    stats.crossing_edges = crossing.len();

    let notes = run_surgery(graph, &crossing, config.target());
    stats.crossing_jump_notes = notes;
    stats
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cfg::EdgeFlags;
    use crate::target::{DemoInstr, DemoTarget};

    #[test]
    fn single_block_function_is_untouched() {
        let mut g: ControlFlowGraph<DemoInstr> = ControlFlowGraph::new(0);
        g.add_block(1000, 1000);
        let config = ReorderConfig::new(Box::new(DemoTarget::default()));
        let stats = reorder_basic_blocks(&mut g, &config);
        assert_eq!(stats.traces_formed, 0);
        assert!(g.block(0).rbi.next.is_none());

        let stats = partition_hot_cold_basic_blocks(&mut g, &config);
        assert_eq!(stats.crossing_edges, 0);
    }

    #[test]
    fn target_refusing_jump_modification_blocks_reorder() {
        let mut g: ControlFlowGraph<DemoInstr> = ControlFlowGraph::new(0);
        let a = g.add_block(1000, 1000);
        let b = g.add_block(1000, 1000);
        g.add_edge(a, b, 10_000, 1000, EdgeFlags::CAN_FALLTHRU);

        let target = DemoTarget { cannot_modify_jumps: true, ..Default::default() };
        let config = ReorderConfig::new(Box::new(target));
        let stats = reorder_basic_blocks(&mut g, &config);
        assert_eq!(stats.traces_formed, 0);
        assert!(g.block(a).rbi.next.is_none());
    }

    #[test]
    fn linear_pair_reorders_into_one_trace() {
        let mut g: ControlFlowGraph<DemoInstr> = ControlFlowGraph::new(0);
        let a = g.add_block(1000, 1000);
        let b = g.add_block(1000, 1000);
        g.add_edge(a, b, 10_000, 1000, EdgeFlags::CAN_FALLTHRU);

        let config = ReorderConfig::new(Box::new(DemoTarget::default()));
        let stats = reorder_basic_blocks(&mut g, &config);
        assert_eq!(stats.traces_formed, 1);
        assert_eq!(g.block(a).rbi.next, Some(b));
    }
}
