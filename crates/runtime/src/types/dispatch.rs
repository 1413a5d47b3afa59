//! Member dispatch entry points
//!
//! Wraps `typeinfo::TypeInfo::resolve` with the parts of `spec.md` §4.3 that
//! aren't about the tables themselves: raising `MemberError` on a full miss,
//! wrapping primitive receivers in their internal wrapper instance before
//! dispatch, and constructing bound methods.

use crate::error::{ExceptionKind, RaisedException, VmResult};
use crate::types::typeinfo::{MemberId, MemberItem, Role, TypeInfo};
use alore_core::block::BlockKind;
use alore_core::value::{
    TAG_CONSTANT, TAG_FLOAT, TAG_FUNCTION, TAG_LONG_INT, TAG_MIXED, TAG_NARROW_STR, TAG_SUBSTR,
    TAG_WIDE_STR,
};
use alore_core::Value;
use std::sync::Arc;

/// `spec.md` §4.3: "Primitive values (Int, Str, Float, Pair, Range,
/// Constant, Function, Type, plain-globalfunction)... are first wrapped
/// into a single-slot instance of the matching internal wrapper type."
///
/// We don't need to actually allocate that wrapper to resolve a member —
/// only to know *which* internal `TypeInfo` a bare primitive `Value`
/// dispatches through. `PrimitiveKind` is that lookup key;
/// `Interpreter::register_wrapper_type`/`type_of` is where it's consumed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PrimitiveKind {
    Int,
    Float,
    Str,
    LongInt,
    Constant,
    Function,
    Pair,
    Range,
}

/// Classify a bare `Value` for primitive member dispatch, or `None` if it's
/// an `Instance`/`Type`/`Tuple`/`Map`/`Set`/`FixArray` — kinds that either
/// already carry their own `TypeInfo` (`Instance`) or aren't dispatched
/// through this path in this build.
pub fn primitive_kind_of(v: Value) -> Option<PrimitiveKind> {
    if v.is_short_int() {
        return Some(PrimitiveKind::Int);
    }
    let (tag, ptr) = v.as_heap_ptr()?;
    match tag {
        TAG_FLOAT => Some(PrimitiveKind::Float),
        TAG_NARROW_STR | TAG_WIDE_STR | TAG_SUBSTR => Some(PrimitiveKind::Str),
        TAG_LONG_INT => Some(PrimitiveKind::LongInt),
        TAG_CONSTANT => Some(PrimitiveKind::Constant),
        TAG_FUNCTION => Some(PrimitiveKind::Function),
        TAG_MIXED => match unsafe { (*ptr.as_ptr()).kind() } {
            BlockKind::MixedPair => Some(PrimitiveKind::Pair),
            BlockKind::MixedRange => Some(PrimitiveKind::Range),
            _ => None,
        },
        _ => None,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MemberRole {
    Get,
    Set,
    Method,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Visibility {
    Public,
    Private,
}

fn to_typeinfo_role(r: MemberRole) -> Role {
    match r {
        MemberRole::Get => Role::Getter,
        MemberRole::Set => Role::Setter,
        MemberRole::Method => Role::Method,
    }
}

fn to_typeinfo_visibility(v: Visibility) -> crate::types::typeinfo::Visibility {
    match v {
        Visibility::Public => crate::types::typeinfo::Visibility::Public,
        Visibility::Private => crate::types::typeinfo::Visibility::Private,
    }
}

/// `spec.md` §4.3 steps 1-5 for a getter or method access: resolve, or
/// raise `MemberError`.
pub fn dispatch_get(
    receiver_type: &TypeInfo,
    role: MemberRole,
    visibility: Visibility,
    id: MemberId,
) -> VmResult<MemberItem> {
    receiver_type
        .resolve(to_typeinfo_role(role), to_typeinfo_visibility(visibility), id)
        .ok_or_else(|| {
            RaisedException::new(
                ExceptionKind::MemberError,
                format!(
                    "'{}' object has no member with id {id}",
                    receiver_type.name
                ),
            )
        })
}

pub fn dispatch_method(receiver_type: &TypeInfo, visibility: Visibility, id: MemberId) -> VmResult<MemberItem> {
    dispatch_get(receiver_type, MemberRole::Method, visibility, id)
}

pub fn dispatch_set(receiver_type: &TypeInfo, visibility: Visibility, id: MemberId) -> VmResult<MemberItem> {
    receiver_type
        .resolve(Role::Setter, to_typeinfo_visibility(visibility), id)
        .ok_or_else(|| {
            RaisedException::new(
                ExceptionKind::MemberError,
                format!(
                    "'{}' object has no settable member with id {id}",
                    receiver_type.name
                ),
            )
        })
}

/// `spec.md` §4.3: "Primitive values... that reach the dispatch machinery
/// are first wrapped into a single-slot instance of the matching internal
/// wrapper type. Wrappers are discarded when the operation returns."
///
/// Heap references (Instance, Type, and the rest) are already dispatchable
/// and pass through unchanged; only the value kinds with no instance
/// layout of their own (short ints, Float, strings, Mixed's Pair/Range,
/// Type, Function, LongInt, Constant) get wrapped.
pub fn wrap_for_dispatch(heap: &crate::heap::Heap, v: Value, wrapper_type: &Arc<TypeInfo>) -> Value {
    let _ = wrapper_type; // concrete TypeInfo association lives in the instance's class pointer slot, set by the caller after allocation.
    let block = heap.allocate_old(BlockKind::Instance, std::mem::size_of::<Value>());
    unsafe {
        let slot = block.as_ptr().add(1) as *mut Value;
        std::ptr::write(slot, v);
    }
    unsafe { Value::from_heap_ptr(alore_core::value::TAG_INSTANCE, block) }
}

/// A bound method: `(receiver, function_global_index)`, allocated as a
/// single `Mixed` block (`spec.md` §4.3: "Constructing a bound method is
/// one allocation; calling it prepends the receiver as `self`.").
pub fn make_bound_method(heap: &crate::heap::Heap, receiver: Value, function_global_index: u32) -> Value {
    let payload = 2 * std::mem::size_of::<Value>();
    let block = heap.allocate_old(BlockKind::MixedBoundMethod, payload);
    unsafe {
        let slots = block.as_ptr().add(1) as *mut Value;
        std::ptr::write(slots, receiver);
        std::ptr::write(
            slots.add(1),
            Value::int(function_global_index as i64),
        );
    }
    unsafe { Value::from_heap_ptr(TAG_MIXED, block) }
}

/// Unpack a bound-method `Value` back into `(receiver, function_global_index)`.
pub fn bound_method_parts(v: Value) -> Option<(Value, u32)> {
    let (tag, ptr) = v.as_heap_ptr()?;
    if tag != TAG_MIXED {
        return None;
    }
    if unsafe { (*ptr.as_ptr()).kind() } != BlockKind::MixedBoundMethod {
        return None;
    }
    unsafe {
        let slots = ptr.as_ptr().add(1) as *const Value;
        let receiver = std::ptr::read(slots);
        let func_idx = std::ptr::read(slots.add(1)).as_short_int()? as u32;
        Some((receiver, func_idx))
    }
}
