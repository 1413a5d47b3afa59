//! Call argument binding
//!
//! `spec.md` §4.4 "Call convention detail": fills a callee's frame from the
//! caller's argument values according to the callee's declared
//! `(min, max, varargs)` arity.

use crate::error::{ExceptionKind, RaisedException, VmResult};
use crate::stdlib::array::AloreArray;
use alore_core::Value;

/// Bind `args` (already including any `*expansion` elements flattened in by
/// the caller) into `callee_frame`, which must be exactly `max + 1` slots if
/// `has_varargs` (the extra slot holding the gathered Array) or `max` slots
/// otherwise, following the convention's four rules:
///
/// - Fixed positional args fill `[0..min-1]`.
/// - Optional positional slots in `[min..max-1]` receive `Default` where
///   the caller supplied none.
/// - A callee with a varargs tail gathers all leftover args into a freshly
///   allocated Array in its last slot.
/// - Shortfall below `min` or overflow above `max` without varargs raises
///   `ValueError`.
pub fn bind_arguments(
    callee_frame: &mut [Value],
    args: &[Value],
    min: u32,
    max: u32,
    has_varargs: bool,
    function_name: &str,
    array_alloc: impl FnOnce(&[Value]) -> Value,
) -> VmResult<()> {
    let min = min as usize;
    let max = max as usize;
    debug_assert_eq!(callee_frame.len(), if has_varargs { max + 1 } else { max });

    if args.len() < min || (!has_varargs && args.len() > max) {
        return Err(RaisedException::new(
            ExceptionKind::ValueError,
            format!(
                "{function_name}: wrong number of arguments (got {}, expected {}{})",
                args.len(),
                min,
                if has_varargs {
                    format!("+", )
                } else if max != min {
                    format!("..{max}")
                } else {
                    String::new()
                }
            ),
        ));
    }

    let fixed_and_optional = args.len().min(max);
    for i in 0..max {
        callee_frame[i] = if i < fixed_and_optional {
            args[i]
        } else {
            Value::DEFAULT
        };
    }

    if has_varargs {
        let rest = if args.len() > max { &args[max..] } else { &[] };
        callee_frame[max] = array_alloc(rest);
    }

    Ok(())
}

/// Convenience binder that allocates the varargs tail as an
/// `stdlib::array::AloreArray` through `heap`, matching the "freshly
/// allocated Array" language in `spec.md` §4.4.
pub fn bind_arguments_with_heap(
    heap: &crate::heap::Heap,
    callee_frame: &mut [Value],
    args: &[Value],
    min: u32,
    max: u32,
    has_varargs: bool,
    function_name: &str,
) -> VmResult<()> {
    bind_arguments(callee_frame, args, min, max, has_varargs, function_name, |rest| {
        AloreArray::from_values(heap, rest)
    })
}
