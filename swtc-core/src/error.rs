//! Boundary error type.
//!
//! Internal contract violations (malformed heap state, an edge flagged `FAKE`
//! chosen as a best edge, a two-successor block with no jump) are never
//! represented here — those are `panic!`/`debug_assert!` per the pass's own
//! invariants. This type covers failures that originate outside the pass:
//! a malformed CFG description, an edge naming a block that doesn't exist,
//! an inconsistent target-capability configuration.

use thiserror::Error;

/// Errors surfaced at the boundary of the reordering/partitioning core.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ReorderError {
    /// A CFG description (e.g. loaded from the CLI's JSON input) could not be parsed.
    #[error("CFG description error: {0}")]
    CfgDescriptionError(String),

    /// An edge referenced a block index that does not exist in the graph.
    #[error("edge references unknown block index {0}")]
    UnknownBlockIndex(u32),

    /// A `TargetCapabilities` implementation reported mutually inconsistent
    /// answers (e.g. claims long conditional branches while also refusing
    /// all jump modification).
    #[error("inconsistent target capabilities: {0}")]
    InconsistentTargetCapabilities(String),
}

impl From<std::num::ParseIntError> for ReorderError {
    #[cold]
    fn from(err: std::num::ParseIntError) -> Self {
        ReorderError::CfgDescriptionError(format!("integer parse error: {}", err))
    }
}
