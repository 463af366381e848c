//! Partition classifier (§4.7): tags every block hot/cold and marks
//! crossing edges.

use crate::cfg::block::{ENTRY_BLOCK, EXIT_BLOCK};
use crate::cfg::{ControlFlowGraph, EdgeIndex, Partition};
use crate::target::TargetCapabilities;

/// Classifies every block, marks crossing edges, and returns them.
pub fn classify_partitions<I>(graph: &mut ControlFlowGraph<I>, target: &dyn TargetCapabilities) -> Vec<EdgeIndex> {
    for b in graph.block_indices() {
        let blk = graph.block(b);
        let partition = if target.probably_never_executed_bb_p(blk.frequency, blk.count) {
            Partition::Cold
        } else {
            Partition::Hot
        };
        graph.block_mut(b).partition = partition;
    }

    let mut crossing = Vec::new();
    for e in 0..graph.edge_count() as EdgeIndex {
        let edge = graph.edge(e);
        if edge.src == ENTRY_BLOCK || edge.dst == EXIT_BLOCK {
            graph.edge_mut(e).crossing_edge = false;
            continue;
        }
        let src_p = graph.block(edge.src).partition;
        let dst_p = graph.block(edge.dst).partition;
        let is_crossing = src_p != dst_p;
        graph.edge_mut(e).crossing_edge = is_crossing;
        if is_crossing {
            crossing.push(e);
        }
    }
    crossing
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cfg::EdgeFlags;
    use crate::target::{DemoInstr, DemoTarget};

    #[test]
    fn every_block_gets_a_partition() {
        let mut g: ControlFlowGraph<DemoInstr> = ControlFlowGraph::new(0);
        let hot = g.add_block(1000, 1000);
        let cold = g.add_block(0, 0);
        g.add_edge(hot, cold, 10_000, 0, EdgeFlags::CAN_FALLTHRU);
        let target = DemoTarget::default();
        let crossing = classify_partitions(&mut g, &target);
        assert_eq!(g.block(hot).partition, Partition::Hot);
        assert_eq!(g.block(cold).partition, Partition::Cold);
        assert_eq!(crossing.len(), 1);
    }
}
