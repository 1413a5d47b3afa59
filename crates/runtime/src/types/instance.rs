//! Instance blocks
//!
//! `spec.md` §3.3: "instance size... number of Value slots... come from the
//! type." `spec.md` §4.4 "Calls": "Type-constructor calls allocate an
//! instance block, initialize all slots to Nil... prepend the instance as
//! receiver, then invoke the constructor."
//!
//! A concrete instance needs some way back to its `TypeInfo` for dispatch
//! (`spec.md` §4.3 "Start at the receiver's concrete TypeInfo"). We reserve
//! slot 0 for the owning type's index into the interpreter's type table
//! (`interp::interpreter::Interpreter`'s `types` vector — the same
//! "global index" convention `spec.md` §3.3 uses for a type's constructor
//! global and `spec.md` §4.3 uses for a member item's global function
//! index) and number declared fields from slot 1, so `MemberItem::InstanceSlot(n)`
//! (`spec.md` §4.3, "values < METHOD_SENTINEL are direct slot indices")
//! reads raw slot `n + 1`.

use crate::heap::Heap;
use alore_core::block::BlockKind;
use alore_core::value::TAG_INSTANCE;
use alore_core::Value;

pub struct AloreInstance;

impl AloreInstance {
    /// Allocate a fresh instance of the type at `type_index`, `field_count`
    /// declared Value slots, all initialized to Nil
    /// (`spec.md` §4.4, "initialize all slots to Nil").
    pub fn allocate(heap: &Heap, type_index: u32, field_count: u32) -> Value {
        let total_slots = field_count as usize + 1;
        let payload = total_slots * std::mem::size_of::<Value>();
        let block = heap.allocate_old(BlockKind::Instance, payload);
        unsafe {
            let slots = block.as_ptr().add(1) as *mut Value;
            std::ptr::write(slots, Value::int(type_index as i64));
            for i in 0..field_count as usize {
                std::ptr::write(slots.add(1 + i), Value::NIL);
            }
        }
        unsafe { Value::from_heap_ptr(TAG_INSTANCE, block) }
    }

    fn slots(v: Value) -> Option<*mut Value> {
        let (tag, ptr) = v.as_heap_ptr()?;
        if tag != TAG_INSTANCE {
            return None;
        }
        Some(unsafe { ptr.as_ptr().add(1) as *mut Value })
    }

    /// The type index stashed in slot 0 at construction
    /// (`spec.md` §4.3's dispatch chain starts here).
    pub fn type_index(v: Value) -> Option<u32> {
        let slots = Self::slots(v)?;
        unsafe { std::ptr::read(slots) }.as_short_int().map(|i| i as u32)
    }

    pub fn get_field(v: Value, field: u32) -> Option<Value> {
        let slots = Self::slots(v)?;
        Some(unsafe { std::ptr::read(slots.add(1 + field as usize)) })
    }

    /// Writes go through the write barrier (`spec.md` §4.2) since an
    /// instance block is always allocated old-gen-resident in this
    /// realization.
    pub fn set_field(v: Value, field: u32, value: Value, new_reference_list: &mut Vec<*mut Value>) -> bool {
        let Some(slots) = Self::slots(v) else {
            return false;
        };
        let slot = unsafe { slots.add(1 + field as usize) };
        crate::heap::barrier::barriered_store(slot, value, new_reference_list);
        true
    }
}
