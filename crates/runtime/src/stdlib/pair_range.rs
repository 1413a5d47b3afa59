//! Pair and Range: the two `Mixed`-block value kinds besides bound methods
//!
//! `spec.md` §3.1: "Pairs and ranges share one discriminated 'mixed' block
//! layout." Both are two-slot blocks under the `Mixed` pointer tag,
//! disambiguated by `BlockKind` the same way `dispatch::make_bound_method`
//! disambiguates its own two-slot shape. `spec.md` §4.4's `Slice` opcode
//! ("slice construction for pair index") constructs a `Pair` from a start
//! and stop index; `FOR_LOOP`'s range specialization (`spec.md` §4.4) walks
//! a `Range`'s `(start, stop)` short-int bounds directly, no allocation per
//! step.

use crate::error::{ExceptionKind, RaisedException, VmResult};
use crate::heap::Heap;
use alore_core::block::BlockKind;
use alore_core::value::TAG_MIXED;
use alore_core::Value;

fn alloc_two_slot(heap: &Heap, kind: BlockKind, a: Value, b: Value) -> Value {
    let payload = 2 * std::mem::size_of::<Value>();
    let block = heap.allocate_old(kind, payload);
    unsafe {
        let slots = block.as_ptr().add(1) as *mut Value;
        std::ptr::write(slots, a);
        std::ptr::write(slots.add(1), b);
    }
    unsafe { Value::from_heap_ptr(TAG_MIXED, block) }
}

fn read_two_slot(v: Value, expect: BlockKind) -> Option<(Value, Value)> {
    let (tag, ptr) = v.as_heap_ptr()?;
    if tag != TAG_MIXED || unsafe { (*ptr.as_ptr()).kind() } != expect {
        return None;
    }
    unsafe {
        let slots = ptr.as_ptr().add(1) as *const Value;
        Some((std::ptr::read(slots), std::ptr::read(slots.add(1))))
    }
}

pub struct AlorePair;

impl AlorePair {
    pub fn make(heap: &Heap, left: Value, right: Value) -> Value {
        alloc_two_slot(heap, BlockKind::MixedPair, left, right)
    }

    pub fn parts(v: Value) -> Option<(Value, Value)> {
        read_two_slot(v, BlockKind::MixedPair)
    }
}

pub struct AloreRange;

impl AloreRange {
    pub fn make(heap: &Heap, start: Value, stop: Value) -> Value {
        alloc_two_slot(heap, BlockKind::MixedRange, start, stop)
    }

    pub fn parts(v: Value) -> Option<(Value, Value)> {
        read_two_slot(v, BlockKind::MixedRange)
    }

    /// `spec.md` §4.4 "FOR_LOOP (with specialization for... range over
    /// short ints)": both bounds must be short ints, start inclusive, stop
    /// exclusive.
    pub fn short_int_bounds(v: Value) -> VmResult<(i64, i64)> {
        let (start, stop) = Self::parts(v).ok_or_else(|| {
            RaisedException::new(ExceptionKind::TypeError, "expected a Range")
        })?;
        match (start.as_short_int(), stop.as_short_int()) {
            (Some(a), Some(b)) => Ok((a, b)),
            _ => Err(RaisedException::new(
                ExceptionKind::ValueError,
                "Range bounds must be integers",
            )),
        }
    }
}
