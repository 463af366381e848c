//! Priority-heap key derivation for trace-builder seeds (`bb_to_key`).

use crate::cfg::{block::ENTRY_BLOCK, graph::edge_frequency, BlockIndex, BlockScratch, ControlFlowGraph};
use crate::config::BB_FREQ_MAX;
use crate::target::TargetCapabilities;

/// Computes the heap key for candidate seed `b`. Lower key = higher
/// priority. See the distilled design's discussion of the two-tier
/// ordering: trace continuations dominate fresh seeds, and the `100x`
/// multiplier on `priority` keeps that term dominant over the
/// frequency tie-break.
pub fn bb_to_key<I>(graph: &ControlFlowGraph<I>, scratch: &[BlockScratch], b: BlockIndex, target: &dyn TargetCapabilities) -> i64 {
    let block = graph.block(b);

    if block.partition.is_cold() || target.probably_never_executed_bb_p(block.frequency, block.count) {
        return BB_FREQ_MAX as i64;
    }

    let mut priority: i32 = 0;
    for &e in &block.predecessors {
        let edge = graph.edge(e);
        if edge.src == ENTRY_BLOCK {
            continue;
        }
        let pred_ends_a_trace = scratch[edge.src as usize].end_of_trace.is_some();
        if pred_ends_a_trace || edge.is_dfs_back() {
            let f = edge_frequency(graph, e);
            if f > priority {
                priority = f;
            }
        }
    }

    if priority > 0 {
        -(100i64 * BB_FREQ_MAX as i64 + 100i64 * priority as i64 + block.frequency as i64)
    } else {
        -(block.frequency as i64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cfg::EdgeFlags;
    use crate::target::DemoTarget;

    #[test]
    fn never_executed_block_is_deprioritized() {
        let mut g: ControlFlowGraph<crate::target::DemoInstr> = ControlFlowGraph::new(0);
        let a = g.add_block(0, 0);
        g.block_mut(a).partition = crate::cfg::Partition::Cold;
        let scratch = vec![BlockScratch::default(); g.len()];
        let target = DemoTarget::default();
        assert_eq!(bb_to_key(&g, &scratch, a, &target), BB_FREQ_MAX as i64);
    }

    #[test]
    fn priority_term_dominates_raw_frequency() {
        let mut g: ControlFlowGraph<crate::target::DemoInstr> = ControlFlowGraph::new(0);
        let p = g.add_block(1000, 1000);
        let b = g.add_block(5, 5);
        let hot_no_pred = g.add_block(900, 900);
        let e = g.add_edge(p, b, 10_000, 1000, EdgeFlags::CAN_FALLTHRU);
        let _ = e;
        let mut scratch = vec![BlockScratch::default(); g.len()];
        scratch[p as usize].end_of_trace = Some(1);
        let target = DemoTarget::default();
        let key_b = bb_to_key(&g, &scratch, b, &target);
        let key_hot = bb_to_key(&g, &scratch, hot_no_pred, &target);
        assert!(key_b < key_hot, "trace continuation must outrank a fresh, higher-frequency seed");
    }
}
