//! Per-thread mutator state
//!
//! `spec.md` §5 models each Alore thread as exactly one OS thread, owning
//! its own nursery, Alore-level value stack, and write-barrier bookkeeping.
//! [`ThreadState`] is that bundle; [`super::ThreadRegistry`] is the
//! process-wide list of them the collector walks through
//! `heap::roots::RootProvider`.

use crate::error::{ExceptionKind, RaisedException, VmResult};
use crate::heap::nursery::Nursery;
use alore_core::Value;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

static NEXT_THREAD_ID: AtomicU64 = AtomicU64::new(1);

/// One Alore thread's mutator-local state: its nursery, its contribution to
/// the GC root set (`spec.md` §4.2 step 2), and the two flags a running
/// interpreter polls at safepoints (`spec.md` §4.4 "Safepoint", §5
/// "Interrupt delivery").
pub struct ThreadState {
    pub id: u64,
    pub nursery: Nursery,
    alore_stack: Vec<Value>,
    temp_stack: Vec<Value>,
    exception_slot: Option<Value>,
    retained_young: Vec<Value>,
    new_reference_list: Vec<*mut Value>,
    finalizable_candidates: Vec<Value>,
    interrupted: AtomicBool,
    /// The exception a `Try` handler just caught, stashed here so the
    /// interpreter's member-binding step (`except e is ...`) can read it
    /// back before the next raise overwrites it.
    last_exception: Option<RaisedException>,
}

// `new_reference_list` holds raw pointers into old-gen blocks this thread
// owns exclusively except during a frozen collection, at which point every
// other thread is parked — the same invariant `heap::gc` already documents
// for its root-scanning unsafe blocks.
unsafe impl Send for ThreadState {}

impl ThreadState {
    pub fn new() -> ThreadState {
        ThreadState {
            id: NEXT_THREAD_ID.fetch_add(1, Ordering::Relaxed),
            nursery: Nursery::with_env_size(),
            alore_stack: Vec::new(),
            temp_stack: Vec::new(),
            exception_slot: None,
            retained_young: Vec::new(),
            new_reference_list: Vec::new(),
            finalizable_candidates: Vec::new(),
            interrupted: AtomicBool::new(false),
            last_exception: None,
        }
    }

    /// Construct a `ThreadState` for use outside the normal registry
    /// lifecycle (unit tests, a one-off `Interpreter` in an embedding
    /// harness that doesn't need GC root visibility).
    pub fn new_for_test() -> ThreadState {
        ThreadState::new()
    }

    pub fn new_reference_list(&mut self) -> &mut Vec<*mut Value> {
        &mut self.new_reference_list
    }

    pub fn finalizable_candidates(&mut self) -> &mut Vec<Value> {
        &mut self.finalizable_candidates
    }

    pub fn push_retained_young(&mut self, v: Value) {
        self.retained_young.push(v);
    }

    /// `spec.md` §5, "interrupt delivery": a keyboard interrupt sets a flag
    /// the interpreter observes at its next safepoint rather than
    /// asynchronously unwinding the thread mid-instruction.
    pub fn request_interrupt(&self) {
        self.interrupted.store(true, Ordering::SeqCst);
    }

    fn take_interrupt(&self) -> bool {
        self.interrupted.swap(false, Ordering::SeqCst)
    }

    /// Called by the interpreter at every backward branch and non-trivial
    /// call site (`spec.md` §4.4 "Safepoint"): park if a freeze is
    /// requested, then raise `InterruptException` if one arrived while
    /// running or while parked.
    pub fn poll_safepoint(&self) -> VmResult<()> {
        super::freeze::park_if_frozen(self.id);
        if self.take_interrupt() {
            return Err(RaisedException::new(
                ExceptionKind::InterruptException,
                "keyboard interrupt",
            ));
        }
        Ok(())
    }

    pub fn set_unwinding_exception(&mut self, exc: RaisedException) {
        self.last_exception = Some(exc);
    }

    pub fn take_last_exception(&mut self) -> Option<RaisedException> {
        self.last_exception.take()
    }
}

impl Default for ThreadState {
    fn default() -> ThreadState {
        ThreadState::new()
    }
}

/// Borrow this thread's contribution to a collection's root set
/// (`heap::roots::MutatorRoots`). Only safe to call while the world is
/// frozen for every *other* thread — `ThreadRegistry::for_each_mutator`
/// is the only caller.
pub(super) fn as_mutator_roots(state: &mut ThreadState) -> crate::heap::roots::MutatorRoots<'_> {
    crate::heap::roots::MutatorRoots {
        alore_stack: &mut state.alore_stack,
        temp_stack: &mut state.temp_stack,
        exception_slot: state.exception_slot.as_mut(),
        retained_young: &mut state.retained_young,
        new_reference_slots: &mut state.new_reference_list,
        finalizable_candidates: &mut state.finalizable_candidates,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_thread_has_no_pending_interrupt() {
        let t = ThreadState::new();
        assert!(t.poll_safepoint().is_ok());
    }

    #[test]
    fn requested_interrupt_is_observed_once() {
        let t = ThreadState::new();
        t.request_interrupt();
        let err = t.poll_safepoint().unwrap_err();
        assert_eq!(err.kind, ExceptionKind::InterruptException);
        assert!(t.poll_safepoint().is_ok());
    }

    #[test]
    fn caught_exception_round_trips() {
        let mut t = ThreadState::new();
        t.set_unwinding_exception(RaisedException::new(ExceptionKind::ValueError, "bad"));
        let caught = t.take_last_exception().unwrap();
        assert_eq!(caught.kind, ExceptionKind::ValueError);
        assert!(t.take_last_exception().is_none());
    }
}
