//! Thread-local pending-exception state
//!
//! The interpreter's "direct exception" fast path (`spec.md` §4.4/§7) needs
//! somewhere to stash the exception `Value` when it returns the `Error`
//! sentinel up through ordinary call frames instead of building an
//! exception-table unwind at every frame. Every OS thread running Alore code
//! gets its own slot, mirroring the teacher runtime's `LAST_ERROR` /
//! `ERROR_CSTRING` thread-local pattern, adapted here to carry a `Value`
//! rather than a string.
//!
//! This module only manages the slot itself; `alore-rt` is responsible for
//! actually constructing exception instances and deciding when to consult
//! or clear this state.

use crate::value::Value;
use std::cell::Cell;

thread_local! {
    static PENDING: Cell<Option<Value>> = const { Cell::new(None) };
}

/// Record `exc` as the current thread's pending exception.
///
/// Overwrites any exception already pending — callers that need to chain or
/// preserve a prior exception must read it first with [`take_pending`].
pub fn set_pending(exc: Value) {
    PENDING.with(|p| p.set(Some(exc)));
}

/// Remove and return the current thread's pending exception, if any.
pub fn take_pending() -> Option<Value> {
    PENDING.with(|p| p.take())
}

/// Whether this thread currently has a pending exception, without
/// consuming it.
pub fn has_pending() -> bool {
    PENDING.with(|p| p.get().is_some())
}

/// Discard the current thread's pending exception, if any.
pub fn clear_pending() {
    PENDING.with(|p| p.set(None));
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn set_take_round_trip() {
        clear_pending();
        assert!(!has_pending());
        set_pending(Value::int(7));
        assert!(has_pending());
        let got = take_pending().unwrap();
        assert_eq!(got.as_short_int(), Some(7));
        assert!(!has_pending());
    }

    #[test]
    fn take_without_set_is_none() {
        clear_pending();
        assert!(take_pending().is_none());
    }

    #[test]
    fn set_overwrites() {
        clear_pending();
        set_pending(Value::int(1));
        set_pending(Value::int(2));
        assert_eq!(take_pending().unwrap().as_short_int(), Some(2));
    }
}
