//! Trace builder: one round (`find_traces_1_round`) and the outer
//! multi-round driver (`find_traces`), §4.2.

use log::{debug, trace as log_trace};

use crate::cfg::block::EXIT_BLOCK;
use crate::cfg::graph::edge_frequency;
use crate::cfg::{BlockIndex, BlockScratch, ControlFlowGraph, EdgeIndex, HeapSlot, TraceId};
use crate::config::{is_hot_enough_to_rotate, ReorderConfig, N_ROUNDS};
use crate::target::{Instr, TargetCapabilities};

use super::compare::better_edge_p;
use super::duplicate::copy_bb_p;
use super::heap::SeedHeap;
use super::key::bb_to_key;
use super::rotate::rotate_loop;
use super::Trace;

fn round_is_not_last(round: usize, max_round: usize) -> bool {
    round < max_round
}

fn qualifies_for_deferral<I>(graph: &ControlFlowGraph<I>, target: &dyn TargetCapabilities, b: BlockIndex, exec_th: i32, count_th: i64) -> bool {
    let block = graph.block(b);
    block.partition.is_cold()
        || block.frequency < exec_th
        || block.count < count_th
        || target.probably_never_executed_bb_p(block.frequency, block.count)
}

/// Picks the best outgoing edge of `tail` to extend the trace with, per
/// §4.2 step 3: filters out ineligible edges, rejects edges below
/// threshold, then folds the survivors through [`better_edge_p`]. If the
/// winner is cheaply duplicable and has more than one predecessor, defers
/// to the connector by returning `None`.
fn find_best_successor_edge<I: Instr>(
    graph: &ControlFlowGraph<I>,
    tail: BlockIndex,
    trace_id: TraceId,
    round: usize,
    max_round: usize,
    branch_th: i32,
    exec_th: i32,
    count_th: i64,
    partitioning_enabled: bool,
    target: &dyn TargetCapabilities,
) -> Option<EdgeIndex> {
    let successors = graph.block(tail).successors.clone();
    let mut best: Option<EdgeIndex> = None;

    for e in successors {
        let edge = graph.edge(e);
        if edge.dst == EXIT_BLOCK {
            continue;
        }
        let dst_block = graph.block(edge.dst);
        if dst_block.rbi.visited != 0 && dst_block.rbi.visited != trace_id {
            continue;
        }
        if edge.is_fake() {
            continue;
        }
        if !edge.can_fallthru() || edge.is_complex() {
            continue;
        }
        if dst_block.partition.is_cold() && round < max_round.saturating_sub(1) {
            continue;
        }
        if edge.probability < branch_th {
            continue;
        }
        let freq = edge_frequency(graph, e);
        if freq < exec_th || edge.count < count_th {
            continue;
        }

        best = match best {
            None => Some(e),
            Some(cur) => {
                if better_edge_p(graph, tail, cur, e, partitioning_enabled) {
                    Some(e)
                } else {
                    Some(cur)
                }
            }
        };
    }

    if let Some(e) = best {
        let dest = graph.edge(e).dst;
        if graph.block(dest).predecessors.len() > 1 && copy_bb_p(graph, target, dest, false) {
            return None;
        }
    }
    best
}

/// §4.2 step 6: the "A -> B -> C with A -> C alternative" triangle rewrite.
/// If a cheaper intermediate block exists, prefer routing through it.
fn apply_triangle_rewrite<I: Instr>(graph: &ControlFlowGraph<I>, tail: BlockIndex, best: EdgeIndex, trace_id: TraceId) -> EdgeIndex {
    let best_dst = graph.edge(best).dst;
    if best_dst == EXIT_BLOCK || graph.block(best_dst).rbi.visited != 0 {
        return best;
    }
    let best_freq = edge_frequency(graph, best);

    for &e in &graph.block(tail).successors {
        if e == best {
            continue;
        }
        let edge = graph.edge(e);
        let m = edge.dst;
        if m == EXIT_BLOCK || graph.block(m).rbi.visited != 0 {
            continue;
        }
        if graph.block(m).predecessors.len() != 1 {
            continue;
        }
        if edge.crossing_edge {
            continue;
        }
        let m_successors = &graph.block(m).successors;
        if m_successors.len() != 1 {
            continue;
        }
        let m_out = graph.edge(m_successors[0]);
        if m_out.dst != best_dst || m_out.is_complex() || !m_out.can_fallthru() {
            continue;
        }
        if 2 * graph.block(m).frequency >= best_freq {
            return e;
        }
    }
    best
}

/// §4.2 step 4: defer non-chosen successors into the appropriate heap, or
/// re-key them in place if already resident in one.
#[allow(clippy::too_many_arguments)]
fn defer_losers<I>(
    graph: &ControlFlowGraph<I>,
    scratch: &mut [BlockScratch],
    current: &mut SeedHeap,
    next: &mut SeedHeap,
    tail: BlockIndex,
    best: Option<EdgeIndex>,
    exec_th: i32,
    count_th: i64,
    target: &dyn TargetCapabilities,
) {
    let successors = graph.block(tail).successors.clone();
    for e in successors {
        if Some(e) == best {
            continue;
        }
        let edge = graph.edge(e);
        if edge.dst == EXIT_BLOCK {
            continue;
        }
        if graph.block(edge.dst).rbi.visited != 0 {
            continue;
        }
        let d = edge.dst;
        let key = bb_to_key(graph, scratch, d, target);

        match scratch[d as usize].heap_slot {
            Some(HeapSlot::Current) => current.push(scratch, d, key),
            Some(HeapSlot::Next) => next.push(scratch, d, key),
            None => {
                let freq = edge_frequency(graph, e);
                let fails_threshold = freq < exec_th || edge.count < count_th;
                if fails_threshold && qualifies_for_deferral(graph, target, d, exec_th, count_th) {
                    next.push(scratch, d, key);
                } else {
                    current.push(scratch, d, key);
                }
            }
        }
    }
}

/// Re-keys every unvisited successor of `tail` that currently lives in some
/// heap: its predecessors' `end_of_trace` may have just changed, which can
/// raise its priority. Must run against the *post-extension* tail.
fn rekey_tail_successors<I>(graph: &ControlFlowGraph<I>, scratch: &mut [BlockScratch], current: &mut SeedHeap, next: &mut SeedHeap, tail: BlockIndex, target: &dyn TargetCapabilities) {
    let successors = graph.block(tail).successors.clone();
    for e in successors {
        let dst = graph.edge(e).dst;
        if dst == EXIT_BLOCK || graph.block(dst).rbi.visited != 0 {
            continue;
        }
        let slot = scratch[dst as usize].heap_slot;
        if let Some(slot) = slot {
            let key = bb_to_key(graph, scratch, dst, target);
            match slot {
                HeapSlot::Current => current.push(scratch, dst, key),
                HeapSlot::Next => next.push(scratch, dst, key),
            }
        }
    }
}

/// Runs one trace-builder round to exhaustion against `heap`, appending
/// newly formed traces to `traces` and returning the heap for the
/// following round.
#[allow(clippy::too_many_arguments)]
pub fn find_traces_1_round<I: Instr + Clone>(
    graph: &mut ControlFlowGraph<I>,
    scratch: &mut Vec<BlockScratch>,
    traces: &mut Vec<Trace>,
    mut heap: SeedHeap,
    branch_th: i32,
    exec_th: i32,
    count_th: i64,
    round: usize,
    max_round: usize,
    config: &ReorderConfig,
) -> SeedHeap {
    let target = config.target();
    let mut next_heap = SeedHeap::new(HeapSlot::Next);

    while let Some((bb, _)) = heap.pop_min(scratch) {
        if graph.block(bb).rbi.visited != 0 {
            // Already swept into a trace via a direct walk from some other
            // seed earlier this round; the heap entry is stale.
            continue;
        }

        if round_is_not_last(round, max_round) && qualifies_for_deferral(graph, target, bb, exec_th, count_th) {
            let key = bb_to_key(graph, scratch, bb, target);
            next_heap.push(scratch, bb, key);
            continue;
        }

        let trace_id = traces.len() as TraceId + 1;
        debug!("round {round}: opening trace {trace_id} at block {bb}");
        graph.block_mut(bb).rbi.visited = trace_id;
        let mut trace = Trace { id: trace_id, first: bb, last: bb, round, length: 1 };
        let mut tail = bb;

        loop {
            let raw_best = find_best_successor_edge(
                graph, tail, trace_id, round, max_round, branch_th, exec_th, count_th,
                config.enable_partitioning, target,
            );
            let best = raw_best.map(|e| apply_triangle_rewrite(graph, tail, e, trace_id));

            defer_losers(graph, scratch, &mut heap, &mut next_heap, tail, best, exec_th, count_th, target);

            let Some(best_edge) = best else {
                graph.block_mut(tail).rbi.next = None;
                break;
            };
            let dest = graph.edge(best_edge).dst;

            if dest != EXIT_BLOCK && graph.block(dest).rbi.visited == trace_id {
                let back_freq = edge_frequency(graph, best_edge);
                let dest_freq = graph.block(dest).frequency;

                if dest == tail {
                    graph.block_mut(tail).rbi.next = None;
                    break;
                }

                if is_hot_enough_to_rotate(back_freq, dest_freq) && dest != graph.entry() {
                    graph.block_mut(tail).rbi.next = Some(dest);
                    log_trace!("rotating loop: back-edge {tail} -> {dest}");
                    let new_tail = rotate_loop(graph, scratch, &mut trace, dest, tail, target);
                    tail = new_tail;
                } else {
                    if graph.block(tail).successors.len() == 1 && copy_bb_p(graph, target, dest, !config.optimize_size) {
                        let new_block = graph.duplicate_block(dest, best_edge);
                        crate::cfg::block::grow_scratch(scratch, new_block);
                        graph.block_mut(new_block).rbi.visited = trace_id;
                        graph.block_mut(tail).rbi.next = Some(new_block);
                        trace.length += 1;
                        tail = new_block;
                    }
                    graph.block_mut(tail).rbi.next = None;
                }
                break;
            }

            graph.block_mut(tail).rbi.next = Some(dest);
            graph.block_mut(dest).rbi.visited = trace_id;
            tail = dest;
            trace.length += 1;
        }

        trace.last = tail;
        scratch[trace.first as usize].start_of_trace = Some(trace_id);
        scratch[tail as usize].end_of_trace = Some(trace_id);
        rekey_tail_successors(graph, scratch, &mut heap, &mut next_heap, tail, target);

        traces.push(trace);
    }

    next_heap
}

/// Runs all rounds of the trace builder, seeding the first round's heap
/// from the entry block's successors and every other block in index order
/// (matching the layout the distilled design's round loop assumes: blocks
/// not reachable from an already-placed trace still get a chance to seed).
pub fn find_traces<I: Instr + Clone>(graph: &mut ControlFlowGraph<I>, scratch: &mut Vec<BlockScratch>, config: &ReorderConfig) -> Vec<Trace> {
    let target = config.target();
    let mut traces = Vec::new();
    let max_round = N_ROUNDS - 1;

    let mut heap = SeedHeap::new(HeapSlot::Current);
    for b in graph.block_indices() {
        if graph.block(b).rbi.visited == 0 {
            let key = bb_to_key(graph, scratch, b, target);
            heap.push(scratch, b, key);
        }
    }

    for round in 0..N_ROUNDS {
        let branch_th = config.branch_threshold[round];
        let exec_th_pm = config.exec_threshold[round];
        let exec_th = scale_threshold(exec_th_pm, max_entry_value(graph));
        let count_th = scale_threshold_i64(exec_th_pm, max_entry_count(graph));

        log::info!("trace builder round {round}: branch_th={branch_th} exec_th={exec_th}");
        heap = find_traces_1_round(graph, scratch, &mut traces, heap, branch_th, exec_th, count_th, round, max_round, config);
    }

    traces
}

fn max_entry_value<I>(graph: &ControlFlowGraph<I>) -> i32 {
    graph
        .entry_edges()
        .iter()
        .map(|&e| edge_frequency(graph, e))
        .max()
        .unwrap_or(0)
}

fn max_entry_count<I>(graph: &ControlFlowGraph<I>) -> i64 {
    graph.entry_edges().iter().map(|&e| graph.edge(e).count).max().unwrap_or(0)
}

fn scale_threshold(per_mille: i32, max_value: i32) -> i32 {
    ((max_value as i64 * per_mille as i64) / 1000) as i32
}

fn scale_threshold_i64(per_mille: i32, max_value: i64) -> i64 {
    (max_value * per_mille as i64) / 1000
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cfg::EdgeFlags;
    use crate::target::{DemoInstr, DemoTarget};

    fn linear_chain() -> ControlFlowGraph<DemoInstr> {
        let mut g: ControlFlowGraph<DemoInstr> = ControlFlowGraph::new(0);
        let a = g.add_block(1000, 1000);
        let b = g.add_block(1000, 1000);
        let c = g.add_block(1000, 1000);
        g.add_edge(a, b, 10_000, 1000, EdgeFlags::CAN_FALLTHRU);
        g.add_edge(b, c, 10_000, 1000, EdgeFlags::CAN_FALLTHRU);
        g
    }

    #[test]
    fn linear_chain_forms_single_trace() {
        let mut g = linear_chain();
        let mut scratch = vec![BlockScratch::default(); g.len()];
        let config = ReorderConfig::new(Box::new(DemoTarget::default()));
        let traces = find_traces(&mut g, &mut scratch, &config);
        assert_eq!(traces.len(), 1);
        let t = traces[0];
        assert_eq!(t.first, 0);
        assert_eq!(t.last, 2);
        assert_eq!(g.block(0).rbi.next, Some(1));
        assert_eq!(g.block(1).rbi.next, Some(2));
        assert_eq!(g.block(2).rbi.next, None);
    }
}
