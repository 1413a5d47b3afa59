//! `Type` values
//!
//! `spec.md` §3.1 lists `Type` among the heap-ref value kinds; `spec.md`
//! §4.4 "Calls" describes calling one: "Type-constructor calls allocate an
//! instance block... prepend the instance as receiver, then invoke the
//! constructor." A `Type` value is a single-slot block wrapping the type's
//! index into `Interpreter`'s `types` table — the same index an instance
//! stashes in its own slot 0 (`types::instance::AloreInstance`).

use crate::heap::Heap;
use alore_core::block::BlockKind;
use alore_core::value::TAG_TYPE;
use alore_core::Value;

pub struct AloreType;

impl AloreType {
    pub fn make(heap: &Heap, type_index: u32) -> Value {
        let payload = std::mem::size_of::<Value>();
        let block = heap.allocate_old(BlockKind::Type, payload);
        unsafe {
            let slot = block.as_ptr().add(1) as *mut Value;
            std::ptr::write(slot, Value::int(type_index as i64));
        }
        unsafe { Value::from_heap_ptr(TAG_TYPE, block) }
    }

    pub fn type_index(v: Value) -> Option<u32> {
        let (tag, ptr) = v.as_heap_ptr()?;
        if tag != TAG_TYPE {
            return None;
        }
        unsafe {
            let slot = ptr.as_ptr().add(1) as *const Value;
            std::ptr::read(slot).as_short_int().map(|i| i as u32)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn type_value_round_trips_index() {
        let heap = Heap::new();
        let v = AloreType::make(&heap, 3);
        assert_eq!(AloreType::type_index(v), Some(3));
    }

    #[test]
    fn non_type_value_is_not_mistaken_for_a_type() {
        let heap = Heap::new();
        let arr = crate::stdlib::array::AloreArray::from_values(&heap, &[Value::int(1)]);
        assert_eq!(AloreType::type_index(arr), None);
    }
}
