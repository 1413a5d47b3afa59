//! The old→young write barrier
//!
//! `spec.md` §4.2: "every store into a potentially-old-gen pointer slot...
//! must either (a) funnel through the barrier routine that enqueues the
//! source slot and target value, or (b) target an object known to be in the
//! young generation (the fast path used during fresh allocation)."
//!
//! This module is the barrier routine itself; the mutator's new-reference
//! list lives on `concurrency::ThreadState` (it's per-thread, like the
//! nursery), so [`record_store`] takes the list to append to rather than
//! owning it.

use alore_core::Value;

/// Call after writing `new_value` into `*slot`, where `slot` lives inside a
/// block that may be in the old generation. If `new_value` is a young
/// reference, records `slot`'s address on `new_reference_list` so the next
/// young collection finds it as a root without having to re-scan every
/// old-gen object.
///
/// Does nothing for `new_value`s that aren't young heap references (short
/// ints, sentinels, or pointers already in the old generation) — the
/// common case, and why this check runs ahead of the list append rather
/// than unconditionally recording every store.
pub fn record_store(slot: *mut Value, new_value: Value, new_reference_list: &mut Vec<*mut Value>) {
    if is_young_reference(new_value) {
        new_reference_list.push(slot);
    }
}

/// Whether `v` is a heap reference into the nursery rather than the old
/// generation. Blocks carry their generation in
/// `alore_core::block::BlockFlags::is_old_gen`; anything that isn't a heap
/// reference at all (short ints, sentinels) is trivially not young.
pub fn is_young_reference(v: Value) -> bool {
    match v.as_heap_ptr() {
        Some((_, ptr)) => unsafe { !(*ptr.as_ptr()).flags().is_old_gen() },
        None => false,
    }
}

/// Store `new_value` into `*slot` through the barrier. This is the
/// "slow but always correct" path the interpreter's compiled `SET_MEMBER`
/// opcodes and friends use whenever they can't prove the target is young;
/// the allocator's own initialization of a freshly built object's slots
/// uses the fast path (case (b) above) instead, since a brand-new object is
/// young by construction.
pub fn barriered_store(
    slot: *mut Value,
    new_value: Value,
    new_reference_list: &mut Vec<*mut Value>,
) {
    unsafe {
        std::ptr::write(slot, new_value);
    }
    record_store(slot, new_value, new_reference_list);
}
