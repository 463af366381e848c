//! Lazy-deletion min-heap realizing the decrease-key-with-stable-handles
//! contract the trace builder needs.
//!
//! A block can migrate between heaps and its key can change while it is
//! resident. Rather than a custom pairing heap, each push records the
//! block's new key in its `BlockScratch` entry and pushes a fresh heap
//! entry; a pop is discarded if the popped key no longer matches the
//! block's recorded current key (the block was re-keyed or moved to the
//! other heap since). This gives the same externally visible "at most one
//! live entry per block" guarantee without custom handle bookkeeping.

use std::cmp::Reverse;
use std::collections::BinaryHeap;

use crate::cfg::{BlockIndex, BlockScratch, HeapSlot};

#[derive(Debug, Default)]
pub struct SeedHeap {
    slot: Option<HeapSlot>,
    heap: BinaryHeap<Reverse<(i64, BlockIndex)>>,
}

impl SeedHeap {
    pub fn new(slot: HeapSlot) -> Self {
        SeedHeap { slot: Some(slot), heap: BinaryHeap::new() }
    }

    pub fn is_empty(&self) -> bool {
        self.heap.is_empty()
    }

    /// Pushes `block` with `key`, recording the push in `scratch` so later
    /// pops (from either heap) can tell whether this entry is still live.
    pub fn push(&mut self, scratch: &mut [BlockScratch], block: BlockIndex, key: i64) {
        let slot = self.slot.expect("heap slot must be set before use");
        scratch[block as usize].heap_slot = Some(slot);
        scratch[block as usize].current_key = key;
        self.heap.push(Reverse((key, block)));
    }

    /// Pops the minimum-key live entry, discarding any number of stale
    /// entries ahead of it (entries whose recorded current key/slot no
    /// longer match, because the block was re-keyed or migrated heaps).
    pub fn pop_min(&mut self, scratch: &[BlockScratch]) -> Option<(BlockIndex, i64)> {
        let slot = self.slot?;
        while let Some(Reverse((key, block))) = self.heap.pop() {
            let entry = &scratch[block as usize];
            if entry.heap_slot == Some(slot) && entry.current_key == key {
                return Some((block, key));
            }
        }
        None
    }
}
