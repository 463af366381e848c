//! Loop rotation (`rotate_loop`, §4.4).

use crate::cfg::block::EXIT_BLOCK;
use crate::cfg::graph::edge_frequency;
use crate::cfg::{BlockIndex, BlockScratch, ControlFlowGraph};
use crate::target::{Instr, TargetCapabilities};

use super::duplicate::copy_bb_p;
use super::Trace;

/// Walks the trace from `head` to `back` (both inclusive) by following
/// `rbi.next`, returning the blocks in chain order.
fn collect_loop_blocks<I>(graph: &ControlFlowGraph<I>, head: BlockIndex, back: BlockIndex) -> Vec<BlockIndex> {
    let mut blocks = vec![head];
    let mut cur = head;
    while cur != back {
        cur = graph
            .block(cur)
            .rbi
            .next
            .expect("loop body must be a closed chain from head to back");
        blocks.push(cur);
    }
    blocks
}

/// Rotates the loop closed by the back-edge `back -> head` so that the
/// highest-value exit becomes the trace's new tail. Returns the new tail.
///
/// `trace` must currently end at `back`; on return, `trace.last` is the new
/// tail and, if `head` was `trace.first`, `trace.first` has been advanced to
/// the rotated order's new head.
pub fn rotate_loop<I: Instr + Clone>(
    graph: &mut ControlFlowGraph<I>,
    scratch: &mut Vec<BlockScratch>,
    trace: &mut Trace,
    head: BlockIndex,
    back: BlockIndex,
    target: &dyn TargetCapabilities,
) -> BlockIndex {
    let loop_blocks = collect_loop_blocks(graph, head, back);

    let mut preferred: Option<(BlockIndex, i32, i64)> = None;
    let mut fallback: Option<(BlockIndex, i32, i64)> = None;

    for &b in &loop_blocks {
        let successors = graph.block(b).successors.clone();
        for e in successors {
            let edge = graph.edge(e);
            if edge.dst == EXIT_BLOCK || loop_blocks.contains(&edge.dst) {
                continue;
            }
            if !edge.can_fallthru() || edge.is_complex() {
                continue;
            }
            let freq = edge_frequency(graph, e);
            let count = edge.count;
            let is_preferred =
                !scratch[edge.dst as usize].is_visited_flag() || scratch[edge.dst as usize].start_of_trace.is_some();

            let slot = if is_preferred { &mut preferred } else { &mut fallback };
            let better = match slot {
                None => true,
                Some((_, best_freq, best_count)) => freq > *best_freq || (freq == *best_freq && count > *best_count),
            };
            if better {
                *slot = Some((b, freq, count));
            }
        }
    }

    let chosen = preferred.or(fallback).map(|(b, _, _)| b);

    let Some(best_bb) = chosen else {
        graph.block_mut(back).rbi.next = None;
        trace.last = back;
        return back;
    };

    let idx = loop_blocks.iter().position(|&x| x == best_bb).unwrap();
    let rotated: Vec<BlockIndex> = loop_blocks[idx + 1..]
        .iter()
        .chain(loop_blocks[..=idx].iter())
        .copied()
        .collect();

    if head == trace.first {
        trace.first = rotated[0];
    }
    for w in rotated.windows(2) {
        graph.block_mut(w[0]).rbi.next = Some(w[1]);
    }
    graph.block_mut(best_bb).rbi.next = None;

    maybe_duplicate_rotation_header(graph, scratch, &rotated, target);

    trace.last = best_bb;
    best_bb
}

/// If the block spliced immediately before the rotated order's head is a
/// short conditional-jump block reachable only from that predecessor,
/// duplicate it inline rather than leaving an unconditional jump feeding
/// straight into a conditional one.
fn maybe_duplicate_rotation_header<I: Instr + Clone>(graph: &mut ControlFlowGraph<I>, scratch: &mut Vec<BlockScratch>, rotated: &[BlockIndex], target: &dyn TargetCapabilities) {
    if rotated.len() < 2 {
        return;
    }
    let spliced_pred = rotated[rotated.len() - 2];
    let Some(succ_edge) = graph.single_successor(spliced_pred) else {
        return;
    };
    let header = graph.edge(succ_edge).dst;
    if header == EXIT_BLOCK {
        return;
    }
    let is_short_condjump = graph.block(header).last_instr().map(Instr::is_cond_jump).unwrap_or(false);
    if is_short_condjump && copy_bb_p(graph, target, header, false) {
        let new_block = graph.duplicate_block(header, succ_edge);
        crate::cfg::block::grow_scratch(scratch, new_block);
    }
}

trait VisitedFlag {
    fn is_visited_flag(&self) -> bool;
}

impl VisitedFlag for BlockScratch {
    fn is_visited_flag(&self) -> bool {
        // A block is "visited" for rotation purposes once it belongs to
        // some trace at all -- start_of_trace/end_of_trace cover finished
        // traces, but a block mid-construction only has `visited` set on
        // the BasicBlock side; scratch alone can't see that, so treat
        // start_of_trace/end_of_trace as the visited signal here.
        self.start_of_trace.is_some() || self.end_of_trace.is_some()
    }
}
