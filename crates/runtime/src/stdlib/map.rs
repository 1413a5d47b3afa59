//! Map: open-addressed hash table, `(key, value)` slot pairs
//!
//! `spec.md` §4.5: probe step `i*5+1`, capacity always a power of two,
//! growing when the fill ratio reaches 2/3 and shrinking (never below the
//! initial capacity) when live entries drop to 1/6, matching
//! `original_source/src/std_map.c` exactly (SPEC_FULL.md §C).
//!
//! The table distinguishes three slot states: **empty** (never occupied,
//! probing may stop here), **tombstone** (occupied once, now removed,
//! probing must continue past it), and **live**. `spec.md` doesn't name a
//! concrete encoding for the first two; we reuse two `Value` sentinels the
//! language itself can never legitimately store as a Map key — `Value::ERROR`
//! ("a non-direct exception is pending", §3.1) for empty and `Value::DEFAULT`
//! ("unbound optional argument", §3.1) for tombstone — rather than widening
//! every slot with an extra state byte.
//!
//! Hash and equality are injected as closures (same shape as
//! `stdlib::sort`'s optional comparator) rather than this module calling
//! `stdlib::hash` directly: a caller with a live interpreter can supply
//! dispatch-based `_hash`/`_eq` for user types, while tests and primitive-only
//! callers pass `stdlib::hash::default_hash`/`default_eq`.

use crate::error::{debug_repr, ExceptionKind, RaisedException, VmResult};
use crate::heap::Heap;
use alore_core::block::BlockKind;
use alore_core::value::TAG_MAP;
use alore_core::Value;
use std::mem::size_of;

const INITIAL_CAPACITY: usize = 8;
const PROBE_STEP: usize = 5;

/// Header fields at the front of a `Map` block's payload, before the
/// `capacity` `(key, value)` slot pairs.
const HEADER_WORDS: usize = 2; // capacity, live count

pub struct AloreMap;

impl AloreMap {
    pub fn new(heap: &Heap) -> Value {
        Self::with_capacity(heap, INITIAL_CAPACITY)
    }

    fn with_capacity(heap: &Heap, capacity: usize) -> Value {
        debug_assert!(capacity.is_power_of_two());
        let payload = HEADER_WORDS * size_of::<u64>() + capacity * 2 * size_of::<Value>();
        let block = heap.allocate_old(BlockKind::Map, payload);
        unsafe {
            let base = block.as_ptr().add(1) as *mut u8;
            std::ptr::write(base as *mut u64, capacity as u64);
            std::ptr::write(base.add(size_of::<u64>()) as *mut u64, 0);
            let slots = base.add(HEADER_WORDS * size_of::<u64>()) as *mut Value;
            for i in 0..capacity * 2 {
                std::ptr::write(slots.add(i), Value::ERROR);
            }
        }
        unsafe { Value::from_heap_ptr(TAG_MAP, block) }
    }

    fn capacity(m: Value) -> usize {
        let (_, ptr) = m.as_heap_ptr().expect("Map value must be a heap reference");
        unsafe { std::ptr::read((ptr.as_ptr().add(1) as *const u8) as *const u64) as usize }
    }

    fn live_count(m: Value) -> usize {
        let (_, ptr) = m.as_heap_ptr().expect("Map value must be a heap reference");
        unsafe {
            std::ptr::read((ptr.as_ptr().add(1) as *const u8).add(size_of::<u64>()) as *const u64)
                as usize
        }
    }

    fn set_live_count(m: Value, n: usize) {
        let (_, ptr) = m.as_heap_ptr().expect("Map value must be a heap reference");
        unsafe {
            std::ptr::write(
                (ptr.as_ptr().add(1) as *mut u8).add(size_of::<u64>()) as *mut u64,
                n as u64,
            );
        }
    }

    fn slot(m: Value, i: usize) -> *mut Value {
        let (_, ptr) = m.as_heap_ptr().expect("Map value must be a heap reference");
        unsafe {
            let base = (ptr.as_ptr().add(1) as *mut u8).add(HEADER_WORDS * size_of::<u64>())
                as *mut Value;
            base.add(i * 2)
        }
    }

    fn is_empty_slot(v: Value) -> bool {
        v == Value::ERROR
    }
    fn is_tombstone_slot(v: Value) -> bool {
        v == Value::DEFAULT
    }

    pub fn len(m: Value) -> usize {
        Self::live_count(m)
    }

    /// Probe sequence `i*5+1` over the table's power-of-two capacity
    /// (`spec.md` §4.5, `original_source/src/std_map.c`). Returns the index
    /// of a matching live key, or `None` if the key isn't present —
    /// distinguished from "found an insertion point" by the caller checking
    /// [`Self::is_empty_slot`]/[`Self::is_tombstone_slot`] at the returned
    /// index when inserting.
    fn probe(
        m: Value,
        key: Value,
        hash: &dyn Fn(Value) -> u64,
        eq: &dyn Fn(Value, Value) -> bool,
    ) -> ProbeResult {
        let capacity = Self::capacity(m);
        let mask = capacity - 1;
        let mut idx = (hash(key) as usize) & mask;
        let mut i: usize = 0;
        let mut first_tombstone: Option<usize> = None;
        loop {
            let k = unsafe { std::ptr::read(Self::slot(m, idx)) };
            if Self::is_empty_slot(k) {
                return ProbeResult::NotFound {
                    insert_at: first_tombstone.unwrap_or(idx),
                };
            }
            if Self::is_tombstone_slot(k) {
                if first_tombstone.is_none() {
                    first_tombstone = Some(idx);
                }
            } else if eq(k, key) {
                return ProbeResult::Found(idx);
            }
            i += 1;
            idx = (idx + i * PROBE_STEP + 1) & mask;
            debug_assert!(i <= capacity, "Map probe exceeded capacity; table invariant broken");
        }
    }

    pub fn get(
        m: Value,
        key: Value,
        hash: &dyn Fn(Value) -> u64,
        eq: &dyn Fn(Value, Value) -> bool,
    ) -> VmResult<Value> {
        match Self::probe(m, key, hash, eq) {
            ProbeResult::Found(idx) => Ok(unsafe { std::ptr::read(Self::slot(m, idx).add(1)) }),
            ProbeResult::NotFound { .. } => Err(RaisedException::new(
                ExceptionKind::KeyError,
                format!("key not found: {}", debug_repr(key)),
            )),
        }
    }

    pub fn has_key(
        m: Value,
        key: Value,
        hash: &dyn Fn(Value) -> u64,
        eq: &dyn Fn(Value, Value) -> bool,
    ) -> bool {
        matches!(Self::probe(m, key, hash, eq), ProbeResult::Found(_))
    }

    /// Insert or overwrite `key -> value`. Growing the table
    /// (`spec.md` §4.5: "capacity doubling when fill >= 2/3") reassigns
    /// `*m` via the caller's mutable binding, since growth allocates a new
    /// block — the old one becomes garbage for the next collection.
    pub fn set(
        m: &mut Value,
        key: Value,
        value: Value,
        heap: &Heap,
        hash: &dyn Fn(Value) -> u64,
        eq: &dyn Fn(Value, Value) -> bool,
    ) {
        match Self::probe(*m, key, hash, eq) {
            ProbeResult::Found(idx) => unsafe {
                std::ptr::write(Self::slot(*m, idx).add(1), value);
            },
            ProbeResult::NotFound { insert_at } => {
                unsafe {
                    std::ptr::write(Self::slot(*m, insert_at), key);
                    std::ptr::write(Self::slot(*m, insert_at).add(1), value);
                }
                Self::set_live_count(*m, Self::live_count(*m) + 1);
                Self::maybe_grow(m, heap, hash, eq);
            }
        }
    }

    /// `remove(k)` followed by `hasKey(k)` is `False` (`spec.md` §8). Writes
    /// a tombstone rather than an empty slot so later probes for
    /// colliding keys still walk past this index.
    pub fn remove(
        m: &mut Value,
        key: Value,
        heap: &Heap,
        hash: &dyn Fn(Value) -> u64,
        eq: &dyn Fn(Value, Value) -> bool,
    ) -> VmResult<()> {
        match Self::probe(*m, key, hash, eq) {
            ProbeResult::Found(idx) => {
                unsafe {
                    std::ptr::write(Self::slot(*m, idx), Value::DEFAULT);
                    std::ptr::write(Self::slot(*m, idx).add(1), Value::NIL);
                }
                Self::set_live_count(*m, Self::live_count(*m) - 1);
                Self::maybe_shrink(m, heap, hash, eq);
                Ok(())
            }
            ProbeResult::NotFound { .. } => Err(RaisedException::new(
                ExceptionKind::KeyError,
                format!("key not found: {}", debug_repr(key)),
            )),
        }
    }

    /// `keys()` as an Array, in whatever bucket order the table currently
    /// holds live entries (`spec.md` §4.5: "Iteration order is
    /// insertion-agnostic").
    pub fn keys(m: Value) -> Vec<Value> {
        Self::entries(m).into_iter().map(|(k, _)| k).collect()
    }

    pub fn entries(m: Value) -> Vec<(Value, Value)> {
        let capacity = Self::capacity(m);
        (0..capacity)
            .filter_map(|i| {
                let k = unsafe { std::ptr::read(Self::slot(m, i)) };
                if Self::is_empty_slot(k) || Self::is_tombstone_slot(k) {
                    None
                } else {
                    let v = unsafe { std::ptr::read(Self::slot(m, i).add(1)) };
                    Some((k, v))
                }
            })
            .collect()
    }

    fn maybe_grow(
        m: &mut Value,
        heap: &Heap,
        hash: &dyn Fn(Value) -> u64,
        eq: &dyn Fn(Value, Value) -> bool,
    ) {
        let capacity = Self::capacity(*m);
        if Self::live_count(*m) * 3 >= capacity * 2 {
            Self::resize(m, capacity * 2, heap, hash, eq);
        }
    }

    fn maybe_shrink(
        m: &mut Value,
        heap: &Heap,
        hash: &dyn Fn(Value) -> u64,
        eq: &dyn Fn(Value, Value) -> bool,
    ) {
        let capacity = Self::capacity(*m);
        if capacity > INITIAL_CAPACITY && Self::live_count(*m) * 6 <= capacity {
            Self::resize(m, (capacity / 2).max(INITIAL_CAPACITY), heap, hash, eq);
        }
    }

    fn resize(
        m: &mut Value,
        new_capacity: usize,
        heap: &Heap,
        hash: &dyn Fn(Value) -> u64,
        eq: &dyn Fn(Value, Value) -> bool,
    ) {
        let entries = Self::entries(*m);
        let live = entries.len();
        let mut rebuilt = Self::with_capacity(heap, new_capacity);
        for (k, v) in &entries {
            match Self::probe(rebuilt, *k, hash, eq) {
                ProbeResult::NotFound { insert_at } => unsafe {
                    std::ptr::write(Self::slot(rebuilt, insert_at), *k);
                    std::ptr::write(Self::slot(rebuilt, insert_at).add(1), *v);
                },
                ProbeResult::Found(_) => unreachable!("rebuilding into a fresh table can't collide"),
            }
        }
        Self::set_live_count(rebuilt, live);
        *m = rebuilt;
    }
}

enum ProbeResult {
    Found(usize),
    NotFound { insert_at: usize },
}
