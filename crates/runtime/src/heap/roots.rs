//! The root set a collection scans
//!
//! `spec.md` §4.2 step 2: "Root set = each thread's Alore stack + temp stack
//! + exception instance + retained-young list; plus globals flagged as
//! containing young pointers (via the new-reference lists since the last
//! collection)."
//!
//! This module only defines the *shape* of that root set
//! ([`MutatorRoots`]) and a trait ([`RootProvider`]) the collector scans
//! through. `concurrency::ThreadRegistry` implements `RootProvider`; `gc`
//! depends only on the trait, not on `concurrency`, so the heap and
//! concurrency layers don't need to know about each other's internals.

use alore_core::Value;

/// Mutable access to one mutator's contribution to the root set, handed to
/// the collector for the duration of a collection (which already holds the
/// world frozen, so `&mut` aliasing across mutators is not a concern).
pub struct MutatorRoots<'a> {
    /// The interpreter's Alore-level value stack for every live frame,
    /// flattened.
    pub alore_stack: &'a mut [Value],
    /// Scratch space used for intermediate results mid-opcode.
    pub temp_stack: &'a mut [Value],
    /// The thread's currently-unwinding exception instance, if any.
    pub exception_slot: Option<&'a mut Value>,
    /// Young objects reachable only via an old-gen reference crossed during
    /// a previous collection (`spec.md` §4.2's old-gen write barrier
    /// "retained-young list").
    pub retained_young: &'a mut Vec<Value>,
    /// Addresses of old-gen slots recorded by the write barrier since the
    /// last collection (`spec.md` §4.2's "new-reference list").
    pub new_reference_slots: &'a mut Vec<*mut Value>,
    /// Nursery-allocated instances whose type has a finalizer
    /// (`spec.md` §4.2's "Finalization"): scanned once per young collection
    /// to tell which became garbage without ever being promoted.
    pub finalizable_candidates: &'a mut Vec<Value>,
}

/// Something that can enumerate every mutator currently registered with the
/// VM and hand the collector mutable access to each one's roots.
pub trait RootProvider {
    fn for_each_mutator(&self, f: &mut dyn FnMut(MutatorRoots<'_>));

    /// Global Values the loader/compiler have registered (module globals,
    /// constants) — scanned unconditionally, since they're comparatively
    /// few and scanning them is cheaper than maintaining a precise
    /// young-pointer flag per global.
    fn global_roots(&self, f: &mut dyn FnMut(&mut Value));

    /// Reset every mutator's nursery bump pointer. Called once all live
    /// young objects have been forwarded out, at the end of a young
    /// collection.
    fn reset_all_nurseries(&self);
}

/// Visit every `Value` reachable as a root, old-gen write-barrier entries
/// included, via the callback `visit`. Used by both young and old
/// collection as the entry point into the mutator-owned root set.
pub fn for_each_root(provider: &dyn RootProvider, mut visit: impl FnMut(&mut Value)) {
    provider.for_each_mutator(&mut |roots| {
        for v in roots.alore_stack.iter_mut() {
            visit(v);
        }
        for v in roots.temp_stack.iter_mut() {
            visit(v);
        }
        if let Some(exc) = roots.exception_slot {
            visit(exc);
        }
        for v in roots.retained_young.iter_mut() {
            visit(v);
        }
        for slot in roots.new_reference_slots.iter() {
            // SAFETY: the write barrier only ever records slots inside
            // live old-gen blocks, and the world is frozen for the
            // duration of a collection.
            unsafe {
                visit(&mut **slot);
            }
        }
    });
    provider.global_roots(&mut visit);
}
