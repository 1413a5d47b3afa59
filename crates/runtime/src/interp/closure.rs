//! Exposed-variable cells and closures
//!
//! `spec.md` §9 "Cyclic reference graphs (closures over mutable locals)":
//! "the 'exposed variable' pattern replaces direct capture with a one-slot
//! cell (a length-1 fix-array). An anonymous function holds a fix-array of
//! these cells; reads and writes on the captured variable indirect through
//! the cell." `spec.md` §4.4 "Closures": `CREATE_EXPOSED` builds the cell;
//! `CREATE_ANON` builds the closure value itself.

use crate::heap::Heap;
use crate::stdlib::array::AloreArray;
use alore_core::block::BlockKind;
use alore_core::value::{TAG_FUNCTION, TAG_MIXED};
use alore_core::Value;

/// `CREATE_EXPOSED`: wrap `initial` in a one-element `FixArray` cell.
pub fn make_cell(heap: &Heap, initial: Value) -> Value {
    AloreArray::from_values(heap, &[initial])
}

pub fn cell_get(cell: Value) -> Value {
    AloreArray::get(cell, 0).expect("an exposed-variable cell is always a 1-element FixArray")
}

pub fn cell_set(cell: Value, value: Value, new_reference_list: &mut Vec<*mut Value>) {
    AloreArray::set(cell, 0, value, new_reference_list)
        .expect("an exposed-variable cell is always a 1-element FixArray");
}

/// `CREATE_ANON`: `(function_global_index, captured_cells: FixArray)`.
/// Calling a closure prepends its cells to the user's call arguments before
/// invoking `function_global_index` (`spec.md` §4.4: "whose `_call`
/// prepends the cells to user arguments").
pub fn make_closure(heap: &Heap, function_global_index: u32, captured_cells: &[Value]) -> Value {
    let cells = AloreArray::from_values(heap, captured_cells);
    let payload = 2 * std::mem::size_of::<Value>();
    let block = heap.allocate_old(BlockKind::MixedClosure, payload);
    unsafe {
        let slots = block.as_ptr().add(1) as *mut Value;
        std::ptr::write(slots, Value::int(function_global_index as i64));
        std::ptr::write(slots.add(1), cells);
    }
    unsafe { Value::from_heap_ptr(TAG_MIXED, block) }
}

/// Unpack a closure back into `(function_global_index, prepended_cell_args)`.
pub fn closure_parts(v: Value) -> Option<(u32, Vec<Value>)> {
    let (tag, ptr) = v.as_heap_ptr()?;
    if tag != TAG_MIXED || unsafe { (*ptr.as_ptr()).kind() } != BlockKind::MixedClosure {
        return None;
    }
    unsafe {
        let slots = ptr.as_ptr().add(1) as *const Value;
        let idx = std::ptr::read(slots).as_short_int()? as u32;
        let cells = std::ptr::read(slots.add(1));
        let n = AloreArray::len(cells);
        let args = (0..n).map(|i| AloreArray::get(cells, i as i64).unwrap()).collect();
        Some((idx, args))
    }
}

/// A first-class `Function` value: a single-slot block wrapping the global
/// function index it names, for `CALL_L`/`CALL_G` callee positions that
/// hold a plain function reference rather than a bound method or closure
/// (`spec.md` §3.1's `Function` heap-ref kind).
pub fn make_function_value(heap: &Heap, function_global_index: u32) -> Value {
    let payload = std::mem::size_of::<Value>();
    let block = heap.allocate_old(BlockKind::Function, payload);
    unsafe {
        let slot = block.as_ptr().add(1) as *mut Value;
        std::ptr::write(slot, Value::int(function_global_index as i64));
    }
    unsafe { Value::from_heap_ptr(TAG_FUNCTION, block) }
}

pub fn function_value_index(v: Value) -> Option<u32> {
    let (tag, ptr) = v.as_heap_ptr()?;
    if tag != TAG_FUNCTION {
        return None;
    }
    unsafe {
        let slot = ptr.as_ptr().add(1) as *const Value;
        std::ptr::read(slot).as_short_int().map(|i| i as u32)
    }
}
