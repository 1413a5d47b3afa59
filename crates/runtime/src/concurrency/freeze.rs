//! Stop-the-world freeze/wake protocol
//!
//! `spec.md` §5: a collection or a diagnostic dump needs every mutator
//! parked at a safepoint before it can safely walk the heap. The protocol
//! is the freezer's side of the handshake whose other half is
//! `thread::ThreadState::poll_safepoint`; the counter-plus-condvar shape
//! mirrors the teacher runtime's `scheduler.rs` shutdown wait (an atomic
//! hot-path counter for the common case, a condvar only for the cold path
//! of waiting on it).
//!
//! Reentrancy matters here: a thread already holding the freeze (e.g. a GC
//! triggered from inside a `begin_disallow_gc` critical region that itself
//! needed to allocate) must not deadlock waiting on its own request, so
//! [`FreezeController::request`] tracks the owning thread and treats a
//! second request from that same thread as a no-op.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Condvar, Mutex};

static FREEZE_REQUESTED: AtomicBool = AtomicBool::new(false);
static FROZEN_COUNT: AtomicUsize = AtomicUsize::new(0);
static REGISTERED_COUNT: AtomicUsize = AtomicUsize::new(0);
static FREEZE_OWNER: AtomicUsize = AtomicUsize::new(0);

static FROZEN_CONDVAR: Condvar = Condvar::new();
static FROZEN_MUTEX: Mutex<()> = Mutex::new(());
static WAKE_CONDVAR: Condvar = Condvar::new();
static WAKE_MUTEX: Mutex<()> = Mutex::new(());

/// Called once per thread as it joins the VM, so the freezer knows how many
/// `FROZEN_COUNT` increments to wait for.
pub fn register_thread() {
    REGISTERED_COUNT.fetch_add(1, Ordering::SeqCst);
}

pub fn unregister_thread() {
    REGISTERED_COUNT.fetch_sub(1, Ordering::SeqCst);
}

/// A live freeze request; dropping it releases every parked thread.
pub struct FreezeGuard {
    reentrant: bool,
}

impl Drop for FreezeGuard {
    fn drop(&mut self) {
        if self.reentrant {
            return;
        }
        FREEZE_OWNER.store(0, Ordering::SeqCst);
        FREEZE_REQUESTED.store(false, Ordering::SeqCst);
        let _guard = WAKE_MUTEX.lock().unwrap();
        WAKE_CONDVAR.notify_all();
    }
}

/// Request every other registered thread park at its next safepoint, and
/// block until they have (`requesting_thread_id` itself is exempt — the
/// calling thread is, by definition, not going to reach its own
/// safepoint). Reentrant: a second call from the same thread id while its
/// first request is still outstanding returns immediately without waiting.
pub fn request_freeze_and_wait(requesting_thread_id: u64) -> FreezeGuard {
    let owner = requesting_thread_id as usize;
    if FREEZE_OWNER.load(Ordering::SeqCst) == owner && FREEZE_REQUESTED.load(Ordering::SeqCst) {
        return FreezeGuard { reentrant: true };
    }

    FREEZE_OWNER.store(owner, Ordering::SeqCst);
    FREEZE_REQUESTED.store(true, Ordering::SeqCst);

    let target = REGISTERED_COUNT.load(Ordering::SeqCst).saturating_sub(1);
    let mut guard = FROZEN_MUTEX.lock().unwrap();
    while FROZEN_COUNT.load(Ordering::SeqCst) < target {
        guard = FROZEN_CONDVAR.wait(guard).unwrap();
    }
    FreezeGuard { reentrant: false }
}

/// The mutator side of the handshake: if a freeze is outstanding, mark this
/// thread as parked and wait for the freezer to release it.
/// `calling_thread_id` is compared against the freeze owner so the
/// requesting thread itself never blocks on its own request.
pub fn park_if_frozen(calling_thread_id: u64) {
    if !FREEZE_REQUESTED.load(Ordering::SeqCst) {
        return;
    }
    if FREEZE_OWNER.load(Ordering::SeqCst) == calling_thread_id as usize {
        return;
    }

    FROZEN_COUNT.fetch_add(1, Ordering::SeqCst);
    {
        let _guard = FROZEN_MUTEX.lock().unwrap();
        FROZEN_CONDVAR.notify_all();
    }

    let mut guard = WAKE_MUTEX.lock().unwrap();
    while FREEZE_REQUESTED.load(Ordering::SeqCst) {
        guard = WAKE_CONDVAR.wait(guard).unwrap();
    }
    FROZEN_COUNT.fetch_sub(1, Ordering::SeqCst);
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Once;

    // These tests share the module's process-wide statics, so they run
    // against a carefully reset baseline rather than in true isolation;
    // `serial_test` would be the natural fix if this module grows more
    // tests that touch the freeze counters concurrently.
    static INIT: Once = Once::new();

    fn reset() {
        INIT.call_once(|| {});
        FREEZE_REQUESTED.store(false, Ordering::SeqCst);
        FROZEN_COUNT.store(0, Ordering::SeqCst);
        REGISTERED_COUNT.store(0, Ordering::SeqCst);
        FREEZE_OWNER.store(0, Ordering::SeqCst);
    }

    #[test]
    fn freeze_with_no_other_threads_returns_immediately() {
        reset();
        register_thread();
        let guard = request_freeze_and_wait(1);
        drop(guard);
        assert!(!FREEZE_REQUESTED.load(Ordering::SeqCst));
    }

    #[test]
    fn reentrant_request_from_owner_does_not_deadlock() {
        reset();
        register_thread();
        let _first = request_freeze_and_wait(7);
        let _second = request_freeze_and_wait(7);
    }

    #[test]
    fn owning_thread_never_parks_on_its_own_request() {
        reset();
        register_thread();
        let _guard = request_freeze_and_wait(3);
        park_if_frozen(3);
    }
}
