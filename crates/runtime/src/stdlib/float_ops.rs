//! Float boxing
//!
//! `spec.md` §2 puts `Float` behind the `TAG_FLOAT` heap tag rather than
//! inline in the Value word — an f64 doesn't fit the 60-bit short-int
//! payload alongside a 4-bit tag, so every Float is a one-`f64`-payload
//! heap block, mirroring how the teacher's `nanbox.rs` boxes doubles that
//! don't fit its NaN-boxing scheme.

use alore_core::block::BlockKind;
use alore_core::value::TAG_FLOAT;
use alore_core::Value;
use std::sync::OnceLock;

thread_local! {
    /// A thread-local scratch heap used only when no `RuntimeContext` is
    /// reachable from the call site (pure numeric helpers called from
    /// contexts that don't thread a `&Heap` through, e.g. formatting code).
    /// Ordinary opcode execution always goes through `from_f64_in`.
    static SCRATCH: OnceLock<crate::heap::Heap> = OnceLock::new();
}

pub fn from_f64_in(heap: &crate::heap::Heap, value: f64) -> Value {
    let block = heap.allocate_old(BlockKind::Float, std::mem::size_of::<f64>());
    unsafe {
        std::ptr::write(block.as_ptr().add(1) as *mut f64, value);
    }
    unsafe { Value::from_heap_ptr(TAG_FLOAT, block) }
}

/// Convenience wrapper for call sites without a heap reference at hand.
/// Allocates against a thread-local scratch heap; values produced this way
/// are never promoted into the shared old generation and exist only for
/// unit tests and standalone numeric formatting.
pub fn from_f64(value: f64) -> Value {
    SCRATCH.with(|cell| {
        let heap = cell.get_or_init(crate::heap::Heap::new);
        from_f64_in(heap, value)
    })
}

/// Read the payload back out of a Float-tagged Value. Caller must have
/// already checked `v.has_tag(TAG_FLOAT)`.
///
/// # Safety
/// `v` must be a live, currently-valid `Float` block.
pub unsafe fn read(v: Value) -> f64 {
    let (_, ptr) = v.as_heap_ptr().expect("Float value must be a heap reference");
    unsafe { std::ptr::read(ptr.as_ptr().add(1) as *const f64) }
}
