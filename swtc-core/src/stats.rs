//! Pass-level statistics, reported by both entry points for logging and for
//! the CLI's summary output.

use serde::Serialize;

#[derive(Debug, Clone, Default, Serialize)]
pub struct PassStats {
    pub blocks: usize,
    pub traces_formed: usize,
    pub blocks_duplicated: usize,
    pub crossing_edges: usize,
    pub crossing_jump_notes: usize,
}
