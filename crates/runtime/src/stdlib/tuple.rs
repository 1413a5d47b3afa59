//! Tuple: a fixed-length, immutable sequence of `Value`s
//!
//! Same payload layout as [`super::array::AloreArray`] — an 8-byte length
//! prefix followed by that many `Value` slots — but allocated under
//! `BlockKind::Tuple`/`TAG_TUPLE` instead of `FixArray`/`TAG_FIX_ARRAY`, so
//! `is Tuple` and `is Array` checks don't need to consult a type object.
//! There is no `set`: Tuple has no mutator in `spec.md`'s container
//! operations.

use crate::error::{ExceptionKind, RaisedException, VmResult};
use crate::heap::Heap;
use alore_core::block::BlockKind;
use alore_core::value::TAG_TUPLE;
use alore_core::Value;
use std::mem::size_of;

const LEN_PREFIX_BYTES: usize = size_of::<u64>();

pub struct AloreTuple;

impl AloreTuple {
    pub fn from_values(heap: &Heap, values: &[Value]) -> Value {
        let payload = LEN_PREFIX_BYTES + values.len() * size_of::<Value>();
        let block = heap.allocate_old(BlockKind::Tuple, payload);
        unsafe {
            let base = block.as_ptr().add(1) as *mut u8;
            std::ptr::write(base as *mut u64, values.len() as u64);
            let slots = base.add(LEN_PREFIX_BYTES) as *mut Value;
            for (i, v) in values.iter().enumerate() {
                std::ptr::write(slots.add(i), *v);
            }
        }
        unsafe { Value::from_heap_ptr(TAG_TUPLE, block) }
    }

    pub fn len(tuple: Value) -> usize {
        let (_, ptr) = tuple
            .as_heap_ptr()
            .expect("Tuple value must be a heap reference");
        unsafe {
            let base = ptr.as_ptr().add(1) as *const u8;
            std::ptr::read(base as *const u64) as usize
        }
    }

    pub fn get(tuple: Value, index: i64) -> VmResult<Value> {
        let len = Self::len(tuple) as i64;
        let idx = if index < 0 { index + len } else { index };
        if idx < 0 || idx >= len {
            return Err(RaisedException::new(
                ExceptionKind::IndexError,
                format!("tuple index {index} out of range for length {len}"),
            ));
        }
        let (_, ptr) = tuple.as_heap_ptr().unwrap();
        let slots = unsafe { (ptr.as_ptr().add(1) as *mut u8).add(LEN_PREFIX_BYTES) as *mut Value };
        Ok(unsafe { std::ptr::read(slots.add(idx as usize)) })
    }
}
