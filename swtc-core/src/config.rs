//! Tunable constants and the pass-level configuration surface.

use crate::error::ReorderError;
use crate::target::TargetCapabilities;

/// Fixed-point denominator for edge probabilities and the duplication threshold.
pub const PROB_BASE: i32 = 10_000;

/// Sentinel "maximum frequency" value used to de-prioritise a seed in the
/// trace-builder heap (cold or never-executed blocks sort after everything
/// else no matter what else is in either heap).
pub const BB_FREQ_MAX: i32 = 10_000;

/// Number of trace-builder rounds. The last round is reserved for whatever
/// is left over (cold blocks, when partitioning is enabled).
pub const N_ROUNDS: usize = 5;

/// Per-round branch-probability floor, per-mille of `PROB_BASE`.
pub const BRANCH_THRESHOLD: [i32; N_ROUNDS] = [400, 200, 100, 0, 0];

/// Per-round successor-frequency floor, per-mille of entry frequency/count.
pub const EXEC_THRESHOLD: [i32; N_ROUNDS] = [500, 200, 50, 0, 0];

/// Per-mille threshold (of `max_entry_frequency`/`max_entry_count`) gating
/// block duplication during connection.
pub const DUPLICATION_THRESHOLD: i32 = 100;

/// Maximum number of successors a block may have and still be duplicable.
pub const MAX_DUPLICATE_SUCCESSORS: usize = 8;

/// Multiplier applied to `uncond_jump_length` for hot, size-growth-permitted
/// duplication.
pub const HOT_DUPLICATION_SIZE_MULTIPLIER: u32 = 8;

/// Iteration-count cutoff for loop rotation: rotate when the back-edge
/// frequency exceeds `4/5` of the header's frequency (roughly "at least
/// four iterations").
pub fn is_hot_enough_to_rotate(back_edge_freq: i32, header_freq: i32) -> bool {
    back_edge_freq as i64 * 5 > header_freq as i64 * 4
}

/// Growth factor applied to the `bbd` scratch array when a new block index
/// exceeds its current capacity: `ceil(n * 5 / 4)`.
pub fn grow_capacity(n: usize) -> usize {
    (n * 5 + 3) / 4
}

/// Pass-level configuration: every tunable named by the constants above,
/// the on/off switches for each phase, and the target-capability collaborator.
///
/// Mirrors the boolean-flag shape of this codebase's optimizer config: build
/// one with [`ReorderConfig::new`], flip only the switches that differ from
/// the defaults.
pub struct ReorderConfig {
    pub enable_reordering: bool,
    pub enable_partitioning: bool,
    pub optimize_size: bool,

    pub branch_threshold: [i32; N_ROUNDS],
    pub exec_threshold: [i32; N_ROUNDS],
    pub duplication_threshold: i32,

    target: Box<dyn TargetCapabilities>,
}

impl ReorderConfig {
    pub fn new(target: Box<dyn TargetCapabilities>) -> Self {
        ReorderConfig {
            enable_reordering: true,
            enable_partitioning: false,
            optimize_size: false,
            branch_threshold: BRANCH_THRESHOLD,
            exec_threshold: EXEC_THRESHOLD,
            duplication_threshold: DUPLICATION_THRESHOLD,
            target,
        }
    }

    pub fn target(&self) -> &dyn TargetCapabilities {
        self.target.as_ref()
    }

    /// Validates the shape of a caller-supplied configuration. The core
    /// itself never calls this (its own constants are known-good); it
    /// exists for boundary callers building a config from untrusted input,
    /// e.g. the CLI.
    pub fn validate(&self) -> Result<(), ReorderError> {
        if self.target.has_long_cond_branch() && self.target.cannot_modify_jumps_p() {
            return Err(ReorderError::InconsistentTargetCapabilities(
                "target claims long conditional branch support but also refuses all jump modification".into(),
            ));
        }
        if self.target.has_long_uncond_branch() && self.target.cannot_modify_jumps_p() {
            return Err(ReorderError::InconsistentTargetCapabilities(
                "target claims long unconditional branch support but also refuses all jump modification".into(),
            ));
        }
        Ok(())
    }
}
