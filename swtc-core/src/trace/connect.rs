//! Trace connector (`connect_traces`, §4.5): stitches all traces into one
//! linear chain, maximising fall-through reuse and optionally duplicating a
//! single block to bridge two traces that don't already abut.

use log::{debug, warn};

use crate::cfg::block::EXIT_BLOCK;
use crate::cfg::graph::edge_frequency;
use crate::cfg::{BlockIndex, BlockScratch, ControlFlowGraph};
use crate::config::ReorderConfig;
use crate::target::Instr;

use super::duplicate::copy_bb_p;
use super::Trace;

fn trace_index_of(id: crate::cfg::TraceId) -> usize {
    id as usize - 1
}

struct BackwardStep {
    pred_trace: usize,
    pred_tail: BlockIndex,
}

fn find_backward_predecessor<I>(graph: &ControlFlowGraph<I>, scratch: &[BlockScratch], traces: &[Trace], connected: &[bool], head: BlockIndex) -> Option<BackwardStep> {
    let mut best: Option<(BackwardStep, i32, usize)> = None;
    for &e in &graph.block(head).predecessors {
        let edge = graph.edge(e);
        if !edge.can_fallthru() || edge.is_complex() {
            continue;
        }
        let Some(end_id) = scratch[edge.src as usize].end_of_trace else {
            continue;
        };
        let ti = trace_index_of(end_id);
        if connected[ti] {
            continue;
        }
        let len = traces[ti].length;
        let prob = edge.probability;
        let better = match &best {
            None => true,
            Some((_, best_prob, best_len)) => prob > *best_prob || (prob == *best_prob && len > *best_len),
        };
        if better {
            best = Some((BackwardStep { pred_trace: ti, pred_tail: edge.src }, prob, len));
        }
    }
    best.map(|(s, _, _)| s)
}

fn find_forward_successor<I>(graph: &ControlFlowGraph<I>, scratch: &[BlockScratch], traces: &[Trace], connected: &[bool], tail: BlockIndex) -> Option<usize> {
    let mut best: Option<(usize, i32, usize)> = None;
    for &e in &graph.block(tail).successors {
        let edge = graph.edge(e);
        if edge.dst == EXIT_BLOCK || !edge.can_fallthru() || edge.is_complex() {
            continue;
        }
        let Some(start_id) = scratch[edge.dst as usize].start_of_trace else {
            continue;
        };
        let ti = trace_index_of(start_id);
        if connected[ti] {
            continue;
        }
        let len = traces[ti].length;
        let prob = edge.probability;
        let better = match &best {
            None => true,
            Some((_, best_prob, best_len)) => prob > *best_prob || (prob == *best_prob && len > *best_len),
        };
        if better {
            best = Some((ti, prob, len));
        }
    }
    best.map(|(ti, _, _)| ti)
}

/// A candidate one-block bridge `t.last -> m -> n` used when no direct
/// fall-through successor connects `t` onward.
struct Bridge {
    m: BlockIndex,
    m_edge: crate::cfg::EdgeIndex,
    dest_trace: Option<usize>,
}

fn find_bridge<I>(graph: &ControlFlowGraph<I>, scratch: &[BlockScratch], traces: &[Trace], connected: &[bool], tail: BlockIndex) -> Option<(Bridge, i32, i32)> {
    let mut best: Option<(Bridge, i32, i32, usize)> = None;
    for &e in &graph.block(tail).successors {
        let edge = graph.edge(e);
        let m = edge.dst;
        if m == EXIT_BLOCK {
            continue;
        }
        for &e2 in &graph.block(m).successors {
            let edge2 = graph.edge(e2);
            if !edge2.can_fallthru() || edge2.is_complex() {
                continue;
            }
            let (dest_trace, len) = if edge2.dst == EXIT_BLOCK {
                (None, usize::MAX)
            } else {
                match scratch[edge2.dst as usize].start_of_trace {
                    Some(id) if !connected[trace_index_of(id)] => {
                        let ti = trace_index_of(id);
                        (Some(ti), traces[ti].length)
                    }
                    _ => continue,
                }
            };

            let prob1 = edge.probability;
            let prob2 = edge2.probability;
            let better = match &best {
                None => true,
                Some((_, bp1, bp2, blen)) => prob1 > *bp1 || (prob1 == *bp1 && (prob2 > *bp2 || (prob2 == *bp2 && len > *blen))),
            };
            if better {
                best = Some((Bridge { m, m_edge: e2, dest_trace }, prob1, prob2, len));
            }
        }
    }
    best.map(|(b, p1, p2, _)| (b, p1, p2))
}

/// Connects every trace into a single chain. Returns the head block of the
/// resulting chain.
pub fn connect_traces<I: Instr + Clone>(graph: &mut ControlFlowGraph<I>, scratch: &mut Vec<BlockScratch>, traces: &mut [Trace], config: &ReorderConfig) -> BlockIndex {
    let n = traces.len();
    let mut connected = vec![false; n];

    let max_entry_freq = graph.entry_edges().iter().map(|&e| edge_frequency(graph, e)).max().unwrap_or(1).max(1);
    let max_entry_count = graph.entry_edges().iter().map(|&e| graph.edge(e).count).max().unwrap_or(1).max(1);
    let freq_th = (max_entry_freq as i64 * config.duplication_threshold as i64 / 1000) as i32;
    let count_th = max_entry_count * config.duplication_threshold as i64 / 1000;

    let mut order: Vec<usize> = Vec::with_capacity(n);

    if config.enable_partitioning {
        for (i, t) in traces.iter().enumerate() {
            if graph.block(t.first).partition.is_cold() {
                connected[i] = true;
            }
        }
        connect_pass(graph, scratch, traces, &mut connected, &mut order, freq_th, count_th, config);
        for (i, t) in traces.iter().enumerate() {
            if graph.block(t.first).partition.is_cold() {
                connected[i] = false;
            }
        }
        connect_pass(graph, scratch, traces, &mut connected, &mut order, freq_th, count_th, config);
    } else {
        connect_pass(graph, scratch, traces, &mut connected, &mut order, freq_th, count_th, config);
    }

    debug_assert!(connected.iter().all(|&c| c), "every trace must end up connected");

    let head_trace = order.first().copied().unwrap_or(0);
    traces[head_trace].first
}

#[allow(clippy::too_many_arguments)]
fn connect_pass<I: Instr + Clone>(
    graph: &mut ControlFlowGraph<I>,
    scratch: &mut Vec<BlockScratch>,
    traces: &mut [Trace],
    connected: &mut [bool],
    order: &mut Vec<usize>,
    freq_th: i32,
    count_th: i64,
    config: &ReorderConfig,
) {
    let n = traces.len();
    let mut last_trace: Option<usize> = order.last().copied();

    for i in 0..n {
        if connected[i] {
            continue;
        }

        let mut ti = i;

        while let Some(step) = find_backward_predecessor(graph, scratch, traces, connected, traces[ti].first) {
            graph.block_mut(step.pred_tail).rbi.next = Some(traces[ti].first);
            connected[step.pred_trace] = true;
            traces[step.pred_trace].last = traces[ti].last;
            ti = step.pred_trace;
        }

        if let Some(lt) = last_trace {
            graph.block_mut(traces[lt].last).rbi.next = Some(traces[ti].first);
        }
        connected[ti] = true;
        order.push(ti);

        loop {
            if let Some(succ_ti) = find_forward_successor(graph, scratch, traces, connected, traces[ti].last) {
                graph.block_mut(traces[ti].last).rbi.next = Some(traces[succ_ti].first);
                connected[succ_ti] = true;
                traces[ti].last = traces[succ_ti].last;
                continue;
            }

            if config.enable_partitioning {
                break;
            }

            let Some((bridge, prob1, _prob2)) = find_bridge(graph, scratch, traces, connected, traces[ti].last) else {
                break;
            };
            let code_may_grow = !config.optimize_size && prob1 >= freq_th && graph.edge(bridge.m_edge).count >= count_th;
            if !copy_bb_p(graph, config.target(), bridge.m, code_may_grow) {
                warn!("connect: duplication gate rejected bridge block {}", bridge.m);
                break;
            }

            let new_block = graph.duplicate_block(bridge.m, bridge.m_edge);
            crate::cfg::block::grow_scratch(scratch, new_block);
            graph.block_mut(traces[ti].last).rbi.next = Some(new_block);
            traces[ti].last = new_block;

            match bridge.dest_trace {
                Some(dest_ti) => {
                    graph.block_mut(new_block).rbi.next = Some(traces[dest_ti].first);
                    connected[dest_ti] = true;
                    traces[ti].last = traces[dest_ti].last;
                }
                None => {
                    debug!("connect: bridged block {new_block} terminates the chain at EXIT");
                    break;
                }
            }
        }

        last_trace = Some(ti);
        graph.block_mut(traces[ti].last).rbi.next = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cfg::EdgeFlags;
    use crate::target::{DemoInstr, DemoTarget};

    #[test]
    fn two_traces_connect_via_direct_fallthrough() {
        let mut g: ControlFlowGraph<DemoInstr> = ControlFlowGraph::new(0);
        let a = g.add_block(1000, 1000);
        let b = g.add_block(800, 800);
        g.add_edge(a, b, 10_000, 800, EdgeFlags::CAN_FALLTHRU);
        g.block_mut(a).rbi.next = None;
        g.block_mut(b).rbi.next = None;

        let mut scratch = vec![BlockScratch::default(); g.len()];
        scratch[a as usize].start_of_trace = Some(1);
        scratch[a as usize].end_of_trace = Some(1);
        scratch[b as usize].start_of_trace = Some(2);
        scratch[b as usize].end_of_trace = Some(2);

        let mut traces = vec![
            Trace { id: 1, first: a, last: a, round: 0, length: 1 },
            Trace { id: 2, first: b, last: b, round: 0, length: 1 },
        ];
        let config = ReorderConfig::new(Box::new(DemoTarget::default()));
        let head = connect_traces(&mut g, &mut scratch, &mut traces, &config);
        assert_eq!(head, a);
        assert_eq!(g.block(a).rbi.next, Some(b));
        assert_eq!(g.block(b).rbi.next, None);
    }
}
