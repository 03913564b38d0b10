// This module manages the spill area of a function frame. Slots are carved
// downward from rbp in 8-byte-aligned steps; freed slots go to a
// size-bucketed free list and are reused before the frame grows, so two
// values with disjoint lifetimes can share an offset. Slots backing `alloc`
// instructions are pinned: their address may escape through loads and
// stores, so they never enter the free list. size() reports the final
// 8-aligned spill area the prologue must reserve.

//! Stack frame slot management.

use hashbrown::{HashMap, HashSet};
use log::trace;

use crate::ir::types::align_to;

#[derive(Debug, Default)]
pub struct StackFrame {
    size: u32,
    /// Freed slots bucketed by their (aligned) size.
    free: HashMap<u32, Vec<i32>>,
    pinned: HashSet<i32>,
}

impl StackFrame {
    pub fn new() -> StackFrame {
        StackFrame::default()
    }

    /// A reusable slot of at least `size` bytes; the free list is
    /// consulted before the frame grows.
    pub fn take_slot(&mut self, size: usize) -> i32 {
        let size = slot_size(size);
        if let Some(bucket) = self.free.get_mut(&size) {
            if let Some(offset) = bucket.pop() {
                trace!("reusing {size}-byte slot at rbp{offset}");
                return offset;
            }
        }
        self.carve(size)
    }

    /// A slot that is never reused, for storage whose address escapes.
    pub fn take_pinned_slot(&mut self, size: usize) -> i32 {
        let offset = self.carve(slot_size(size));
        self.pinned.insert(offset);
        offset
    }

    /// Returns a slot to the free list. Pinned slots stay taken.
    pub fn return_slot(&mut self, offset: i32, size: usize) {
        if self.pinned.contains(&offset) {
            return;
        }
        self.free.entry(slot_size(size)).or_default().push(offset);
    }

    /// Total spill area, rounded up to 8.
    pub fn size(&self) -> u32 {
        align_to(self.size as usize, 8) as u32
    }

    fn carve(&mut self, size: u32) -> i32 {
        self.size += size;
        -(self.size as i32)
    }
}

fn slot_size(size: usize) -> u32 {
    align_to(size.max(1), 8) as u32
}
