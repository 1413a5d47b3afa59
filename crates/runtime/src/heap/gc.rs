//! Young (copying) and old (mark-sweep) collection
//!
//! Both entry points assume the caller has already brought every mutator to
//! a safepoint (`concurrency::freeze`) — neither function freezes anything
//! itself. That separation matches `spec.md` §4.2 step 1, "Request all
//! other mutators to reach a safepoint," as a precondition the scheduler
//! arranges rather than something the collector does inline, so the
//! collector can be exercised directly in tests without a thread registry.

use super::oldgen::OldGen;
use super::roots::{for_each_root, RootProvider};
use super::Heap;
use alore_core::block::{BlockHeader, BlockKind};
use alore_core::Value;
use std::collections::HashSet;
use std::ptr::NonNull;
use tracing::{debug, info};

/// Run one young (copying) collection: forward every reachable nursery
/// object into the old generation, fix up every reference that pointed at
/// its old nursery address, run finalizers for nursery objects that didn't
/// survive, and reset every mutator's nursery (`spec.md` §4.2).
pub fn young_collect(heap: &Heap, provider: &dyn RootProvider) {
    info!("young collection starting");
    let mut worklist: Vec<NonNull<BlockHeader>> = Vec::new();
    let mut dead_finalizable: Vec<Value> = Vec::new();

    for_each_root(provider, |v| {
        forward_if_young(heap, v, &mut worklist);
    });

    // Scan the frontier: freshly copied old-gen objects may themselves
    // hold young references (spec.md §4.2 step 4).
    while let Some(block) = worklist.pop() {
        scan_block_for_young_refs(heap, block, &mut worklist);
    }

    provider.for_each_mutator(&mut |roots| {
        for v in roots.finalizable_candidates.drain(..) {
            match v.as_heap_ptr() {
                Some((_, ptr)) => {
                    let header = unsafe { &*ptr.as_ptr() };
                    if header.forwarding_target().is_none() && !header.flags().is_old_gen() {
                        // Never forwarded during this collection: garbage.
                        dead_finalizable.push(v);
                    }
                }
                None => {}
            }
        }
    });

    if !dead_finalizable.is_empty() {
        debug!(count = dead_finalizable.len(), "queuing finalizers for unreachable young instances");
        let mut queue = heap.finalizer_queue.lock().unwrap();
        queue.extend(dead_finalizable);
    }

    provider.reset_all_nurseries();
    info!("young collection complete");
}

/// If `v` (a root slot) is a young reference, forward its block to old-gen
/// (copying it on first visit, reusing the forwarding pointer on repeat
/// visits of the same object) and rewrite `v` in place to the new address.
/// Non-young or non-heap Values are left untouched.
fn forward_if_young(heap: &Heap, v: &mut Value, worklist: &mut Vec<NonNull<BlockHeader>>) {
    let Some((tag, ptr)) = v.as_heap_ptr() else {
        return;
    };
    let header = unsafe { &mut *ptr.as_ptr() };
    if header.flags().is_old_gen() {
        return;
    }
    if let Some(target) = header.forwarding_target() {
        *v = unsafe { Value::from_heap_ptr(tag, NonNull::new_unchecked(target)) };
        return;
    }

    let new_block = copy_into_old_gen(heap, ptr);
    header.set_forwarding(new_block.as_ptr());
    *v = unsafe { Value::from_heap_ptr(tag, new_block) };
    worklist.push(new_block);
}

fn copy_into_old_gen(heap: &Heap, src: NonNull<BlockHeader>) -> NonNull<BlockHeader> {
    let kind = unsafe { (*src.as_ptr()).kind() };
    let size = unsafe { (*src.as_ptr()).size() };
    let mut old = heap.old_gen.lock().unwrap();
    let dst = old.allocate(kind, size);
    unsafe {
        std::ptr::copy_nonoverlapping(src.as_ptr() as *const u8, dst.as_ptr() as *mut u8, size);
        let mut flags = (*dst.as_ptr()).flags();
        flags.set_old_gen(true);
        flags.set_forwarded(false);
        (*dst.as_ptr()).set_flags(flags);
    }
    dst
}

fn scan_block_for_young_refs(heap: &Heap, block: NonNull<BlockHeader>, worklist: &mut Vec<NonNull<BlockHeader>>) {
    let header = unsafe { &*block.as_ptr() };
    let kind = header.kind();
    if !kind.has_value_fields() {
        return;
    }
    let prefix = std::mem::size_of::<BlockHeader>() + kind.value_slot_prefix_bytes();
    let payload_bytes = header.size().saturating_sub(prefix);
    let slot_count = payload_bytes / std::mem::size_of::<Value>();
    let slots = unsafe { (block.as_ptr() as *mut u8).add(prefix) as *mut Value };
    for i in 0..slot_count {
        let slot = unsafe { &mut *slots.add(i) };
        forward_if_young(heap, slot, worklist);
    }
}

/// Mark-sweep collection of the old generation, with the young generation's
/// current survivors also treated as roots (`spec.md` §4.2, "Old
/// collection"). Unlike young collection this never moves anything; it
/// only marks reachable blocks and sweeps the rest.
pub fn old_collect(heap: &Heap, provider: &dyn RootProvider) {
    info!("old collection starting");
    let mut marked: HashSet<usize> = HashSet::new();
    let mut worklist: Vec<NonNull<BlockHeader>> = Vec::new();

    for_each_root(provider, |v| {
        mark_if_old(v, &mut marked, &mut worklist);
    });

    while let Some(block) = worklist.pop() {
        mark_block_fields(block, &mut marked, &mut worklist);
    }

    let survivors = {
        let mut old = heap.old_gen.lock().unwrap();
        old.sweep(&marked)
    };
    heap.sweep_identity_hashes(&survivors);
    info!(live = survivors.len(), "old collection complete");
}

fn mark_if_old(v: &Value, marked: &mut HashSet<usize>, worklist: &mut Vec<NonNull<BlockHeader>>) {
    let Some((_, ptr)) = v.as_heap_ptr() else {
        return;
    };
    let header = unsafe { &*ptr.as_ptr() };
    if !header.flags().is_old_gen() {
        return;
    }
    let addr = ptr.as_ptr() as usize;
    if marked.insert(addr) {
        worklist.push(ptr);
    }
}

fn mark_block_fields(block: NonNull<BlockHeader>, marked: &mut HashSet<usize>, worklist: &mut Vec<NonNull<BlockHeader>>) {
    let header = unsafe { &*block.as_ptr() };
    let kind = header.kind();
    if !kind.has_value_fields() {
        return;
    }
    let prefix = std::mem::size_of::<BlockHeader>() + kind.value_slot_prefix_bytes();
    let payload_bytes = header.size().saturating_sub(prefix);
    let slot_count = payload_bytes / std::mem::size_of::<Value>();
    let slots = unsafe { (block.as_ptr() as *mut u8).add(prefix) as *mut Value };
    for i in 0..slot_count {
        let slot = unsafe { &*slots.add(i) };
        mark_if_old(slot, marked, worklist);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::heap::roots::MutatorRoots;

    struct SingleThreadHeap {
        stack: std::cell::RefCell<Vec<Value>>,
    }

    impl RootProvider for SingleThreadHeap {
        fn for_each_mutator(&self, f: &mut dyn FnMut(MutatorRoots<'_>)) {
            let mut stack = self.stack.borrow_mut();
            let mut temp = Vec::new();
            let mut retained = Vec::new();
            let mut new_refs = Vec::new();
            let mut finalizable = Vec::new();
            f(MutatorRoots {
                alore_stack: &mut stack,
                temp_stack: &mut temp,
                exception_slot: None,
                retained_young: &mut retained,
                new_reference_slots: &mut new_refs,
                finalizable_candidates: &mut finalizable,
            });
        }
        fn global_roots(&self, _f: &mut dyn FnMut(&mut Value)) {}
        fn reset_all_nurseries(&self) {}
    }

    fn alloc_young(nursery: &super::super::nursery::Nursery, kind: BlockKind, payload: usize) -> Value {
        let block = nursery.try_allocate(kind, payload).unwrap();
        unsafe { Value::from_heap_ptr(kind.value_tag(), block) }
    }

    #[test]
    fn young_collection_forwards_reachable_object_to_old_gen() {
        let heap = Heap::new();
        let nursery = super::super::nursery::Nursery::new(4096);
        let v = alloc_young(&nursery, BlockKind::Instance, 16);
        assert!(!matches!(v.as_heap_ptr(), None));

        let provider = SingleThreadHeap {
            stack: std::cell::RefCell::new(vec![v]),
        };
        young_collect(&heap, &provider);

        let forwarded = provider.stack.borrow()[0];
        let (_, ptr) = forwarded.as_heap_ptr().unwrap();
        assert!(unsafe { (*ptr.as_ptr()).flags().is_old_gen() });
    }

    #[test]
    fn old_collection_sweeps_unreachable_blocks() {
        let heap = Heap::new();
        let live = heap.allocate_old(BlockKind::Instance, 16);
        let _dead = heap.allocate_old(BlockKind::Instance, 16);
        let live_value = unsafe { Value::from_heap_ptr(alore_core::value::TAG_INSTANCE, live) };

        let provider = SingleThreadHeap {
            stack: std::cell::RefCell::new(vec![live_value]),
        };
        old_collect(&heap, &provider);
        let old = heap.old_gen.lock().unwrap();
        let remaining: Vec<usize> = old.live_block_addresses().collect();
        assert_eq!(remaining, vec![live.as_ptr() as usize]);
    }

    /// A 2-element `FixArray`'s length prefix is the byte pattern `0x2`,
    /// which happens to equal `TAG_FIX_ARRAY` in `Value`'s low 4 bits. If
    /// the tracer ever again treated that length word as a slot, it would
    /// try to follow it as a heap pointer and this collection would panic
    /// or corrupt the array's real elements.
    #[test]
    fn array_length_prefix_is_never_traced_as_a_value_slot() {
        let heap = Heap::new();
        let array = crate::stdlib::array::AloreArray::from_values(
            &heap,
            &[Value::int(10), Value::int(20)],
        );
        assert_eq!(crate::stdlib::array::AloreArray::len(array), 2);

        let provider = SingleThreadHeap {
            stack: std::cell::RefCell::new(vec![array]),
        };
        old_collect(&heap, &provider);

        let survivor = provider.stack.borrow()[0];
        assert_eq!(crate::stdlib::array::AloreArray::len(survivor), 2);
        assert_eq!(
            crate::stdlib::array::AloreArray::get(survivor, 0).unwrap(),
            Value::int(10)
        );
        assert_eq!(
            crate::stdlib::array::AloreArray::get(survivor, 1).unwrap(),
            Value::int(20)
        );
    }
}
