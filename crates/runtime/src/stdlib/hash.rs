//! Default hash and equality for primitive `Value`s
//!
//! `spec.md` §4.5: "Lookup hashes the key via `Hash`, which dispatches to
//! `_hash` for user types; key equality uses `==` (possibly overloaded via
//! `_eq`)." The dispatch-based half of that (calling a user type's `_hash`/
//! `_eq` methods through `types::dispatch`) belongs to the interpreter layer
//! once it can drive a call; this module only supplies the default behavior
//! for the primitive kinds `Map`/`Set` must support with no type-object
//! involved at all (Int, Float, Str, Bool, Nil), matching
//! `original_source/src/std_map.c`'s `std_Hash` fallback for the built-in
//! types before it consults a type's member table.
//!
//! `stdlib::map`/`stdlib::set` take hash/eq as injected closures rather than
//! calling into this module directly, the same way `stdlib::sort` takes an
//! optional comparator (`spec.md` §4.5) instead of hard-wiring `<`. This
//! keeps the table engine a pure data structure; callers that need
//! dispatch-based `_hash`/`_eq` for non-primitive keys pass their own
//! closures built on `types::dispatch` instead of these defaults.

use crate::stdlib::float_ops;
use crate::stdlib::str::AloreStr;
use alore_core::value::{TAG_LONG_INT, TAG_NARROW_STR, TAG_SUBSTR, TAG_WIDE_STR};
use alore_core::Value;

/// Hash `v`, following `spec.md` §4.5's "hash value... reduced to a machine
/// int for bucket selection by sign/digit accumulation for long ints."
/// Equal `Value`s (by [`default_eq`]) always hash equal.
pub fn default_hash(v: Value) -> u64 {
    if let Some(i) = v.as_short_int() {
        return (i as u64).wrapping_mul(0x9E3779B97F4A7C15);
    }
    if v.has_tag(TAG_LONG_INT) {
        return hash_long_int(v);
    }
    if v.has_tag(TAG_NARROW_STR) || v.has_tag(TAG_WIDE_STR) || v.has_tag(TAG_SUBSTR) {
        return hash_str(v);
    }
    if let Some(f) = try_read_float(v) {
        return f.to_bits().wrapping_mul(0x9E3779B97F4A7C15);
    }
    match v {
        Value::NIL => 0x9E3779B97F4A7C15,
        Value::TRUE => 1,
        Value::FALSE => 0,
        other => other.raw_bits(),
    }
}

/// `spec.md` §4.5's key equality: `==`, falling back here to identity plus
/// the primitive value comparisons `Map`/`Set` need with no type object in
/// the loop. Non-primitive heap values compare by pointer identity, which
/// is the correct default when no `_eq` override is supplied.
pub fn default_eq(a: Value, b: Value) -> bool {
    if a == b {
        return true;
    }
    if let (Some(x), Some(y)) = (try_read_float(a), try_read_float(b)) {
        return x == y;
    }
    if is_string(a) && is_string(b) {
        return AloreStr::code_points(a) == AloreStr::code_points(b);
    }
    false
}

fn is_string(v: Value) -> bool {
    v.has_tag(TAG_NARROW_STR) || v.has_tag(TAG_WIDE_STR) || v.has_tag(TAG_SUBSTR)
}

fn try_read_float(v: Value) -> Option<f64> {
    v.has_tag(alore_core::value::TAG_FLOAT).then(|| unsafe { float_ops::read(v) })
}

fn hash_str(v: Value) -> u64 {
    let mut h: u64 = 0xcbf29ce484222325;
    for cp in AloreStr::code_points(v) {
        h ^= cp as u64;
        h = h.wrapping_mul(0x100000001b3);
    }
    h
}

fn hash_long_int(v: Value) -> u64 {
    let (_, ptr) = v.as_heap_ptr().expect("LongInt value must be a heap reference");
    unsafe {
        let base = ptr.as_ptr().add(1) as *const u8;
        let negative = std::ptr::read(base) != 0;
        let header = &*ptr.as_ptr();
        let payload = header.size() - std::mem::size_of::<alore_core::block::BlockHeader>();
        let digit_count = (payload - 1) / std::mem::size_of::<u32>();
        let digit_base = base.add(1) as *const u32;
        let mut h: u64 = if negative { 1 } else { 0 };
        for i in 0..digit_count {
            let d = std::ptr::read(digit_base.add(i));
            h = h.wrapping_mul(0x100000001b3) ^ d as u64;
        }
        h
    }
}
