//! Per-thread nursery: bump-pointer young-generation allocation
//!
//! `spec.md` §4.2: "each mutator thread owns a bump-pointer region.
//! Allocation is `ptr += aligned_size` and, on overflow, a slow path that
//! either triggers a young collection or (for "unmovable" requests)
//! allocates directly in old-gen."
//!
//! We get the bump allocator itself from `bumpalo`, and get the
//! reset-the-whole-arena step of a young collection for free from
//! `bumpalo::Bump::reset` — this is the same shape as the teacher
//! runtime's per-strand arena, just driven by the collector instead of by
//! strand exit.

use alore_core::block::{round_block_size, BlockFlags, BlockHeader, BlockKind, ALLOC_UNIT};
use bumpalo::Bump;
use std::alloc::Layout;
use std::ptr::NonNull;

/// Default nursery size; overridable via `ALORE_NURSERY_SIZE`
/// (`SPEC_FULL.md` §A).
pub const DEFAULT_NURSERY_SIZE: usize = 1 << 20;

pub struct Nursery {
    arena: Bump,
}

impl Nursery {
    pub fn new(size: usize) -> Nursery {
        Nursery {
            arena: Bump::with_capacity(size),
        }
    }

    pub fn with_env_size() -> Nursery {
        let size = std::env::var("ALORE_NURSERY_SIZE")
            .ok()
            .and_then(|s| s.parse::<usize>().ok())
            .filter(|&n| n > 0)
            .unwrap_or(DEFAULT_NURSERY_SIZE);
        Nursery::new(size)
    }

    /// Bump-allocate a block of `kind` with `payload_size` bytes beyond the
    /// header. Returns `None` on overflow, signaling the slow path
    /// (`gc::young_collect`, or a direct old-gen allocation for unmovable
    /// requests).
    pub fn try_allocate(&self, kind: BlockKind, payload_size: usize) -> Option<NonNull<BlockHeader>> {
        let size = round_block_size(std::mem::size_of::<BlockHeader>() + payload_size);
        let layout = Layout::from_size_align(size, ALLOC_UNIT).ok()?;
        let raw = self.arena.try_alloc_layout(layout).ok()?;
        let block = raw.cast::<BlockHeader>();
        unsafe {
            std::ptr::write(block.as_ptr(), BlockHeader::new(kind, size));
            (*block.as_ptr()).set_flags(BlockFlags::NONE);
        }
        Some(block)
    }

    pub fn bytes_allocated(&self) -> usize {
        self.arena.allocated_bytes()
    }

    /// Reset the bump pointer to the start of the arena. Valid only after a
    /// young collection has forwarded every live object out of the
    /// nursery — anything still pointing in here afterward is garbage.
    pub fn reset(&mut self) {
        self.arena.reset();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn allocation_within_capacity_succeeds() {
        let nursery = Nursery::new(4096);
        let block = nursery.try_allocate(BlockKind::Instance, 32);
        assert!(block.is_some());
    }

    #[test]
    fn allocation_beyond_capacity_fails() {
        let nursery = Nursery::new(64);
        let mut last = None;
        for _ in 0..100 {
            last = nursery.try_allocate(BlockKind::FixArray, 256);
            if last.is_none() {
                break;
            }
        }
        assert!(last.is_none(), "nursery should eventually overflow");
    }

    #[test]
    fn reset_reclaims_capacity() {
        let mut nursery = Nursery::new(256);
        while nursery.try_allocate(BlockKind::Instance, 16).is_some() {}
        nursery.reset();
        assert!(nursery.try_allocate(BlockKind::Instance, 16).is_some());
    }
}
