//! Set: the same open-addressed table as `Map`, one `Value` per slot
//!
//! `spec.md` §4.5: "same hash-table engine, single slot per entry." The
//! probe sequence, capacity bookkeeping, and empty/tombstone sentinel
//! convention are identical to `stdlib::map::AloreMap` (see that module's
//! doc comment) — the only difference is that each slot holds one member
//! `Value` instead of a `(key, value)` pair, and blocks carry their own
//! `BlockKind::Set`/`TAG_SET` tag rather than `Map`'s, so `is Set`/`is Map`
//! don't need a type-object consultation (matching how `Tuple` gets its own
//! tag instead of aliasing `FixArray`'s).

use crate::error::{ExceptionKind, RaisedException, VmResult};
use crate::heap::Heap;
use alore_core::block::BlockKind;
use alore_core::value::TAG_SET;
use alore_core::Value;
use std::mem::size_of;

const INITIAL_CAPACITY: usize = 8;
const PROBE_STEP: usize = 5;
const HEADER_WORDS: usize = 2; // capacity, live count

pub struct AloreSet;

impl AloreSet {
    pub fn new(heap: &Heap) -> Value {
        Self::with_capacity(heap, INITIAL_CAPACITY)
    }

    fn with_capacity(heap: &Heap, capacity: usize) -> Value {
        debug_assert!(capacity.is_power_of_two());
        let payload = HEADER_WORDS * size_of::<u64>() + capacity * size_of::<Value>();
        let block = heap.allocate_old(BlockKind::Set, payload);
        unsafe {
            let base = block.as_ptr().add(1) as *mut u8;
            std::ptr::write(base as *mut u64, capacity as u64);
            std::ptr::write(base.add(size_of::<u64>()) as *mut u64, 0);
            let slots = base.add(HEADER_WORDS * size_of::<u64>()) as *mut Value;
            for i in 0..capacity {
                std::ptr::write(slots.add(i), Value::ERROR);
            }
        }
        unsafe { Value::from_heap_ptr(TAG_SET, block) }
    }

    fn capacity(s: Value) -> usize {
        let (_, ptr) = s.as_heap_ptr().expect("Set value must be a heap reference");
        unsafe { std::ptr::read((ptr.as_ptr().add(1) as *const u8) as *const u64) as usize }
    }

    fn live_count(s: Value) -> usize {
        let (_, ptr) = s.as_heap_ptr().expect("Set value must be a heap reference");
        unsafe {
            std::ptr::read((ptr.as_ptr().add(1) as *const u8).add(size_of::<u64>()) as *const u64)
                as usize
        }
    }

    fn set_live_count(s: Value, n: usize) {
        let (_, ptr) = s.as_heap_ptr().expect("Set value must be a heap reference");
        unsafe {
            std::ptr::write(
                (ptr.as_ptr().add(1) as *mut u8).add(size_of::<u64>()) as *mut u64,
                n as u64,
            );
        }
    }

    fn slot(s: Value, i: usize) -> *mut Value {
        let (_, ptr) = s.as_heap_ptr().expect("Set value must be a heap reference");
        unsafe {
            (ptr.as_ptr().add(1) as *mut u8).add(HEADER_WORDS * size_of::<u64>()) as *mut Value
        }
        .wrapping_add(i)
    }

    fn is_empty_slot(v: Value) -> bool {
        v == Value::ERROR
    }
    fn is_tombstone_slot(v: Value) -> bool {
        v == Value::DEFAULT
    }

    pub fn len(s: Value) -> usize {
        Self::live_count(s)
    }

    fn probe(
        s: Value,
        member: Value,
        hash: &dyn Fn(Value) -> u64,
        eq: &dyn Fn(Value, Value) -> bool,
    ) -> ProbeResult {
        let capacity = Self::capacity(s);
        let mask = capacity - 1;
        let mut idx = (hash(member) as usize) & mask;
        let mut i: usize = 0;
        let mut first_tombstone: Option<usize> = None;
        loop {
            let m = unsafe { std::ptr::read(Self::slot(s, idx)) };
            if Self::is_empty_slot(m) {
                return ProbeResult::NotFound {
                    insert_at: first_tombstone.unwrap_or(idx),
                };
            }
            if Self::is_tombstone_slot(m) {
                if first_tombstone.is_none() {
                    first_tombstone = Some(idx);
                }
            } else if eq(m, member) {
                return ProbeResult::Found(idx);
            }
            i += 1;
            idx = (idx + i * PROBE_STEP + 1) & mask;
            debug_assert!(i <= capacity, "Set probe exceeded capacity; table invariant broken");
        }
    }

    pub fn contains(
        s: Value,
        member: Value,
        hash: &dyn Fn(Value) -> u64,
        eq: &dyn Fn(Value, Value) -> bool,
    ) -> bool {
        matches!(Self::probe(s, member, hash, eq), ProbeResult::Found(_))
    }

    pub fn add(
        s: &mut Value,
        member: Value,
        heap: &Heap,
        hash: &dyn Fn(Value) -> u64,
        eq: &dyn Fn(Value, Value) -> bool,
    ) {
        match Self::probe(*s, member, hash, eq) {
            ProbeResult::Found(_) => {}
            ProbeResult::NotFound { insert_at } => {
                unsafe {
                    std::ptr::write(Self::slot(*s, insert_at), member);
                }
                Self::set_live_count(*s, Self::live_count(*s) + 1);
                Self::maybe_grow(s, heap, hash, eq);
            }
        }
    }

    pub fn remove(
        s: &mut Value,
        member: Value,
        heap: &Heap,
        hash: &dyn Fn(Value) -> u64,
        eq: &dyn Fn(Value, Value) -> bool,
    ) -> VmResult<()> {
        match Self::probe(*s, member, hash, eq) {
            ProbeResult::Found(idx) => {
                unsafe {
                    std::ptr::write(Self::slot(*s, idx), Value::DEFAULT);
                }
                Self::set_live_count(*s, Self::live_count(*s) - 1);
                Self::maybe_shrink(s, heap, hash, eq);
                Ok(())
            }
            ProbeResult::NotFound { .. } => Err(RaisedException::new(
                ExceptionKind::KeyError,
                "member not found in set",
            )),
        }
    }

    pub fn members(s: Value) -> Vec<Value> {
        let capacity = Self::capacity(s);
        (0..capacity)
            .filter_map(|i| {
                let m = unsafe { std::ptr::read(Self::slot(s, i)) };
                if Self::is_empty_slot(m) || Self::is_tombstone_slot(m) {
                    None
                } else {
                    Some(m)
                }
            })
            .collect()
    }

    /// `_eq` over sets is set equality (`spec.md` §4.5): same cardinality,
    /// every member of one found in the other.
    pub fn set_eq(
        a: Value,
        b: Value,
        hash: &dyn Fn(Value) -> u64,
        eq: &dyn Fn(Value, Value) -> bool,
    ) -> bool {
        if Self::len(a) != Self::len(b) {
            return false;
        }
        Self::members(a).into_iter().all(|m| Self::contains(b, m, hash, eq))
    }

    fn maybe_grow(s: &mut Value, heap: &Heap, hash: &dyn Fn(Value) -> u64, eq: &dyn Fn(Value, Value) -> bool) {
        let capacity = Self::capacity(*s);
        if Self::live_count(*s) * 3 >= capacity * 2 {
            Self::resize(s, capacity * 2, heap, hash, eq);
        }
    }

    fn maybe_shrink(s: &mut Value, heap: &Heap, hash: &dyn Fn(Value) -> u64, eq: &dyn Fn(Value, Value) -> bool) {
        let capacity = Self::capacity(*s);
        if capacity > INITIAL_CAPACITY && Self::live_count(*s) * 6 <= capacity {
            Self::resize(s, (capacity / 2).max(INITIAL_CAPACITY), heap, hash, eq);
        }
    }

    fn resize(
        s: &mut Value,
        new_capacity: usize,
        heap: &Heap,
        hash: &dyn Fn(Value) -> u64,
        eq: &dyn Fn(Value, Value) -> bool,
    ) {
        let members = Self::members(*s);
        let live = members.len();
        let mut rebuilt = Self::with_capacity(heap, new_capacity);
        for m in &members {
            match Self::probe(rebuilt, *m, hash, eq) {
                ProbeResult::NotFound { insert_at } => unsafe {
                    std::ptr::write(Self::slot(rebuilt, insert_at), *m);
                },
                ProbeResult::Found(_) => unreachable!("rebuilding into a fresh table can't collide"),
            }
        }
        Self::set_live_count(rebuilt, live);
        *s = rebuilt;
    }
}

enum ProbeResult {
    Found(usize),
    NotFound { insert_at: usize },
}
