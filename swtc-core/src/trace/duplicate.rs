//! Block duplication predicate (`copy_bb_p`, §4.6).

use crate::cfg::{BlockIndex, ControlFlowGraph};
use crate::config::{HOT_DUPLICATION_SIZE_MULTIPLIER, MAX_DUPLICATE_SUCCESSORS};
use crate::target::{Instr, TargetCapabilities};

/// Whether `block` may be duplicated. `code_may_grow` relaxes the size
/// bound by [`HOT_DUPLICATION_SIZE_MULTIPLIER`] when the block also
/// qualifies as "maybe hot".
pub fn copy_bb_p<I: Instr>(graph: &ControlFlowGraph<I>, target: &dyn TargetCapabilities, block: BlockIndex, code_may_grow: bool) -> bool {
    let b = graph.block(block);

    if b.frequency == 0 {
        return false;
    }
    if b.predecessors.len() < 2 {
        return false;
    }
    if !target.can_duplicate_block_p(block) {
        return false;
    }
    if b.successors.len() > MAX_DUPLICATE_SUCCESSORS {
        return false;
    }

    let size: u32 = b.instructions.iter().map(|i| i.length()).sum();
    let base_bound = target.uncond_jump_length();
    let bound = if code_may_grow && target.maybe_hot_bb_p(b.frequency, b.count) {
        base_bound.saturating_mul(HOT_DUPLICATION_SIZE_MULTIPLIER)
    } else {
        base_bound
    };

    size <= bound
}
