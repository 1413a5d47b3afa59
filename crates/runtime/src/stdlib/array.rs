//! Array: a fixed-length, mutable, zero-based sequence of `Value`s
//!
//! `spec.md` §4.4/§4.6 calls into this for `CREATE_ARRAY`, `ARRAY_GET`,
//! `ARRAY_SET`, and the varargs-gathering step of the call convention. The
//! block layout is `BlockKind::FixArray`'s payload: an 8-byte length prefix
//! followed by that many contiguous `Value` slots, the same "flat Value
//! array after the header" convention `heap::gc` assumes for every
//! `has_value_fields` block kind.

use crate::error::{ExceptionKind, RaisedException, VmResult};
use crate::heap::Heap;
use alore_core::block::BlockKind;
use alore_core::value::TAG_FIX_ARRAY;
use alore_core::Value;
use std::mem::size_of;

const LEN_PREFIX_BYTES: usize = size_of::<u64>();

pub struct AloreArray;

impl AloreArray {
    pub fn from_values(heap: &Heap, values: &[Value]) -> Value {
        let payload = LEN_PREFIX_BYTES + values.len() * size_of::<Value>();
        let block = heap.allocate_old(BlockKind::FixArray, payload);
        unsafe {
            let base = block.as_ptr().add(1) as *mut u8;
            std::ptr::write(base as *mut u64, values.len() as u64);
            let slots = base.add(LEN_PREFIX_BYTES) as *mut Value;
            for (i, v) in values.iter().enumerate() {
                std::ptr::write(slots.add(i), *v);
            }
        }
        unsafe { Value::from_heap_ptr(TAG_FIX_ARRAY, block) }
    }

    pub fn len(array: Value) -> usize {
        let (_, ptr) = array
            .as_heap_ptr()
            .expect("Array value must be a heap reference");
        unsafe {
            let base = ptr.as_ptr().add(1) as *const u8;
            std::ptr::read(base as *const u64) as usize
        }
    }

    fn slots(array: Value) -> *mut Value {
        let (_, ptr) = array
            .as_heap_ptr()
            .expect("Array value must be a heap reference");
        unsafe { (ptr.as_ptr().add(1) as *mut u8).add(LEN_PREFIX_BYTES) as *mut Value }
    }

    /// `spec.md`'s negative-index convention: `-1` addresses the last
    /// element. Raises `IndexError` if the result still falls outside
    /// `[0, len)`.
    fn normalize_index(array: Value, index: i64) -> VmResult<usize> {
        let len = Self::len(array) as i64;
        let idx = if index < 0 { index + len } else { index };
        if idx < 0 || idx >= len {
            return Err(RaisedException::new(
                ExceptionKind::IndexError,
                format!("array index {index} out of range for length {len}"),
            ));
        }
        Ok(idx as usize)
    }

    pub fn get(array: Value, index: i64) -> VmResult<Value> {
        let idx = Self::normalize_index(array, index)?;
        Ok(unsafe { std::ptr::read(Self::slots(array).add(idx)) })
    }

    /// `spec.md` §4.2 "write barrier": every store of a heap Value into an
    /// already-old-gen block must record a remembered-set entry if the
    /// stored value is young, so the barrier runs here rather than being
    /// left to the caller. `new_reference_list` is the calling thread's
    /// remembered-set buffer (`concurrency::thread::ThreadState`).
    pub fn set(
        array: Value,
        index: i64,
        value: Value,
        new_reference_list: &mut Vec<*mut Value>,
    ) -> VmResult<()> {
        let idx = Self::normalize_index(array, index)?;
        let slot = unsafe { Self::slots(array).add(idx) };
        crate::heap::barrier::barriered_store(slot, value, new_reference_list);
        Ok(())
    }
}
