//! Collaborator traits standing in for the host compiler's instruction-level
//! representation and target-capability interface.
//!
//! The reordering/partitioning core never encodes a concrete instruction
//! set. It asks `TargetCapabilities` what the target can do and asks `Instr`
//! what an individual instruction looks like (its length, whether it is a
//! jump, etc). Production use supplies its own implementations backed by a
//! real instruction stream; [`DemoTarget`] and [`DemoInstr`] below are a
//! minimal in-memory stand-in used by tests and the CLI's synthetic-CFG
//! driver.

/// A single instruction as the pass needs to see it. Everything about the
/// instruction's actual encoding is opaque to the core.
pub trait Instr: std::fmt::Debug {
    /// Length in target-defined length units (the same units as
    /// `TargetCapabilities::uncond_jump_length`).
    fn length(&self) -> u32;

    /// Is this instruction some form of conditional jump?
    fn is_cond_jump(&self) -> bool;

    /// Is this instruction an unconditional direct jump?
    fn is_uncond_jump(&self) -> bool;

    /// Is this a computed (register-indirect) jump?
    fn is_computed_jump(&self) -> bool;

    /// Is this a jump-table dispatch? If so, the table's entry count.
    fn table_jump_len(&self) -> Option<usize>;

    /// Is this a plain `return`?
    fn is_return(&self) -> bool;

    /// Is this a label, barrier, or note (non-code bookkeeping)?
    fn is_meta(&self) -> bool;

    /// Synthesizes an unconditional direct jump of the given length. Used by
    /// partition surgery to patch a pure fall-through block that must now
    /// branch explicitly.
    fn synth_jump(length: u32) -> Self
    where
        Self: Sized;

    /// Synthesizes a `return`, used when a conditional-branch thunk can
    /// substitute a direct return for a jump to a block that only returns.
    fn synth_return(length: u32) -> Self
    where
        Self: Sized;

    /// Synthesizes a register-indirect jump, used when an unconditional
    /// direct jump must be widened to cross a partition on a target with no
    /// long unconditional branch.
    fn synth_computed_jump(length: u32) -> Self
    where
        Self: Sized;

    /// Synthesizes a label, barrier, or note — zero-length bookkeeping
    /// inserted by surgery (`emit_label_before`, `emit_barrier_after`, ...).
    fn synth_meta() -> Self
    where
        Self: Sized;

    /// Returns this conditional jump with its sense inverted (`invert_jump`).
    /// Only ever called on an instruction for which `is_cond_jump()` is true.
    fn inverted(&self) -> Self
    where
        Self: Sized;
}

/// The target-capability interface the core consumes from its host
/// compiler. Every method here corresponds to one bullet of the external
/// interface the distilled design calls out.
pub trait TargetCapabilities {
    /// If true, the pass must not touch any jump in the function; both
    /// entry points early-return.
    fn cannot_modify_jumps_p(&self) -> bool {
        false
    }

    /// Whether the target has a conditional branch that can span arbitrary
    /// distance (no thunking needed across partitions).
    fn has_long_cond_branch(&self) -> bool {
        false
    }

    /// Whether the target has an unconditional branch that can span
    /// arbitrary distance (no indirection needed across partitions).
    fn has_long_uncond_branch(&self) -> bool {
        false
    }

    /// Whether a block may be duplicated by the target at all (independent
    /// of the size/frequency gates in `copy_bb_p`).
    fn can_duplicate_block_p(&self, _block: u32) -> bool {
        true
    }

    /// The length, in the same units as `Instr::length`, of an
    /// unconditional jump on this target. Measured once per pass run.
    fn uncond_jump_length(&self) -> u32 {
        4
    }

    /// Whether a block is "maybe hot" for the purposes of the relaxed,
    /// `8x` duplication size bound.
    fn maybe_hot_bb_p(&self, frequency: i32, count: i64) -> bool {
        frequency > 0 || count > 0
    }

    /// Whether a block is predicted to never execute.
    fn probably_never_executed_bb_p(&self, frequency: i32, count: i64) -> bool {
        frequency == 0 && count == 0
    }
}

/// A minimal instruction used by tests and the CLI's demo driver. Carries
/// just enough information for the pass to reason about jumps and length.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DemoInstr {
    /// Ordinary non-control instruction of the given length.
    Plain(u32),
    CondJump(u32),
    UncondJump(u32),
    ComputedJump(u32),
    TableJump(u32, usize),
    Return(u32),
    /// Label, barrier, or note — zero-length bookkeeping.
    Meta,
}

impl Instr for DemoInstr {
    fn length(&self) -> u32 {
        match *self {
            DemoInstr::Plain(n)
            | DemoInstr::CondJump(n)
            | DemoInstr::UncondJump(n)
            | DemoInstr::ComputedJump(n)
            | DemoInstr::TableJump(n, _)
            | DemoInstr::Return(n) => n,
            DemoInstr::Meta => 0,
        }
    }

    fn is_cond_jump(&self) -> bool {
        matches!(self, DemoInstr::CondJump(_))
    }

    fn is_uncond_jump(&self) -> bool {
        matches!(self, DemoInstr::UncondJump(_))
    }

    fn is_computed_jump(&self) -> bool {
        matches!(self, DemoInstr::ComputedJump(_))
    }

    fn table_jump_len(&self) -> Option<usize> {
        match self {
            DemoInstr::TableJump(_, n) => Some(*n),
            _ => None,
        }
    }

    fn is_return(&self) -> bool {
        matches!(self, DemoInstr::Return(_))
    }

    fn is_meta(&self) -> bool {
        matches!(self, DemoInstr::Meta)
    }

    fn synth_jump(length: u32) -> Self {
        DemoInstr::UncondJump(length)
    }

    fn synth_return(length: u32) -> Self {
        DemoInstr::Return(length)
    }

    fn synth_computed_jump(length: u32) -> Self {
        DemoInstr::ComputedJump(length)
    }

    fn synth_meta() -> Self {
        DemoInstr::Meta
    }

    fn inverted(&self) -> Self {
        match *self {
            DemoInstr::CondJump(n) => DemoInstr::CondJump(n),
            other => other,
        }
    }
}

/// Default capability set used by tests and the CLI demo: short-range
/// branches only (so partitioning surgery's thunking/indirection paths are
/// exercised), jumps modifiable, all blocks duplicable.
pub struct DemoTarget {
    pub uncond_jump_length: u32,
    pub has_long_cond_branch: bool,
    pub has_long_uncond_branch: bool,
    pub cannot_modify_jumps: bool,
}

impl Default for DemoTarget {
    fn default() -> Self {
        DemoTarget {
            uncond_jump_length: 4,
            has_long_cond_branch: false,
            has_long_uncond_branch: false,
            cannot_modify_jumps: false,
        }
    }
}

impl TargetCapabilities for DemoTarget {
    fn cannot_modify_jumps_p(&self) -> bool {
        self.cannot_modify_jumps
    }

    fn has_long_cond_branch(&self) -> bool {
        self.has_long_cond_branch
    }

    fn has_long_uncond_branch(&self) -> bool {
        self.has_long_uncond_branch
    }

    fn uncond_jump_length(&self) -> u32 {
        self.uncond_jump_length
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn demo_instr_classification() {
        assert!(DemoInstr::CondJump(4).is_cond_jump());
        assert!(!DemoInstr::CondJump(4).is_uncond_jump());
        assert!(DemoInstr::TableJump(4, 3).table_jump_len().is_some());
        assert!(DemoInstr::Meta.is_meta());
        assert_eq!(DemoInstr::Meta.length(), 0);
    }

    #[test]
    fn demo_target_defaults_favor_short_branches() {
        let t = DemoTarget::default();
        assert!(!t.has_long_cond_branch());
        assert!(!t.has_long_uncond_branch());
        assert!(!t.cannot_modify_jumps_p());
    }
}
