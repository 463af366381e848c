//! Edge comparison for trace growth (`better_edge_p`, §4.3).

use crate::cfg::{BlockIndex, ControlFlowGraph, EdgeIndex};

/// Probability band, in tenths of a percent, within which two edges are
/// treated as equivalent (±10%).
const EQUIVALENCE_BAND_PCT: i64 = 10;

fn within_equivalence_band(candidate_prob: i32, best_prob: i32) -> bool {
    let best = best_prob as i64;
    let cand = candidate_prob as i64;
    let slack = best * EQUIVALENCE_BAND_PCT / 100;
    cand >= best - slack && cand <= best + slack
}

/// Returns true iff `candidate` should replace `current_best` as the edge
/// to extend the trace along, when both originate at `bb`.
///
/// `partitioning_enabled` gates the final override: when hot/cold
/// partitioning is on, a non-crossing edge always beats a crossing one
/// regardless of probability or frequency.
pub fn better_edge_p<I>(
    graph: &ControlFlowGraph<I>,
    bb: BlockIndex,
    current_best: EdgeIndex,
    candidate: EdgeIndex,
    partitioning_enabled: bool,
) -> bool {
    let best_edge = graph.edge(current_best);
    let cand_edge = graph.edge(candidate);

    if partitioning_enabled && cand_edge.crossing_edge != best_edge.crossing_edge {
        return !cand_edge.crossing_edge;
    }

    if within_equivalence_band(cand_edge.probability, best_edge.probability) {
        let best_dest_freq = dest_frequency(graph, best_edge.dst);
        let cand_dest_freq = dest_frequency(graph, cand_edge.dst);
        if cand_dest_freq < best_dest_freq {
            return true;
        }
        if cand_dest_freq > best_dest_freq {
            return false;
        }
        // Equal successor frequency: prefer the destination that was bb's
        // layout-next neighbour in the original block order.
        let layout_next = bb + 1;
        if cand_edge.dst == layout_next {
            return true;
        }
        return false;
    }

    cand_edge.probability > best_edge.probability
}

fn dest_frequency<I>(graph: &ControlFlowGraph<I>, dst: BlockIndex) -> i32 {
    graph.try_block(dst).map(|b| b.frequency).unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cfg::EdgeFlags;

    fn graph_with_two_successors(prob_a: i32, freq_a: i32, prob_b: i32, freq_b: i32) -> (ControlFlowGraph<crate::target::DemoInstr>, EdgeIndex, EdgeIndex) {
        let mut g: ControlFlowGraph<crate::target::DemoInstr> = ControlFlowGraph::new(0);
        let src = g.add_block(1000, 1000);
        let a = g.add_block(freq_a, freq_a as i64);
        let b = g.add_block(freq_b, freq_b as i64);
        let ea = g.add_edge(src, a, prob_a, 0, EdgeFlags::CAN_FALLTHRU);
        let eb = g.add_edge(src, b, prob_b, 0, EdgeFlags::CAN_FALLTHRU);
        (g, ea, eb)
    }

    #[test]
    fn strictly_higher_probability_wins_outside_band() {
        let (g, ea, eb) = graph_with_two_successors(3000, 100, 9000, 100);
        assert!(better_edge_p(&g, 0, ea, eb, false));
        assert!(!better_edge_p(&g, 0, eb, ea, false));
    }

    #[test]
    fn equivalent_band_prefers_lower_successor_frequency() {
        let (g, ea, eb) = graph_with_two_successors(5000, 500, 5100, 100);
        assert!(better_edge_p(&g, 0, ea, eb, false));
    }

    #[test]
    fn partitioning_override_beats_probability() {
        let (mut g, ea, eb) = graph_with_two_successors(9000, 100, 1000, 100);
        g.edge_mut(eb).crossing_edge = false;
        g.edge_mut(ea).crossing_edge = true;
        assert!(better_edge_p(&g, 0, ea, eb, true));
    }
}
