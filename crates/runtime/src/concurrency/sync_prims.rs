//! User-facing Mutex and condition-variable primitives
//!
//! `spec.md` §5: Alore-level `Mutex`/`Condition` objects must bracket any
//! wait that could block the OS thread with "allow blocking"/"end
//! blocking" calls, so a GC freeze request doesn't have to wait on a
//! mutator that's merely parked on a lock rather than running Alore code.
//! A thread inside an allow-blocking region counts as already at a
//! safepoint.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Condvar, Mutex, MutexGuard};
use std::time::Duration;

/// Mark this thread as blocked (hence safe to collect around) for the
/// duration of `f`, matching `spec.md`'s allow-blocking/end-blocking
/// bracket. Call sites: `AloreMutex::lock`, `AloreCondition::wait`, blocking
/// I/O.
pub fn allow_blocking<T>(thread_id: u64, f: impl FnOnce() -> T) -> T {
    super::freeze::register_thread();
    let result = f();
    super::freeze::unregister_thread();
    let _ = thread_id;
    result
}

/// A user-visible mutex (`spec.md`'s `Mutex` type). Wraps `std::sync::Mutex`
/// and brackets the blocking acquire with the allow/end-blocking protocol.
pub struct AloreMutex {
    inner: Mutex<()>,
}

impl AloreMutex {
    pub fn new() -> AloreMutex {
        AloreMutex { inner: Mutex::new(()) }
    }

    pub fn lock(&self, thread_id: u64) -> MutexGuard<'_, ()> {
        allow_blocking(thread_id, || self.inner.lock().unwrap())
    }

    pub fn try_lock(&self) -> Option<MutexGuard<'_, ()>> {
        self.inner.try_lock().ok()
    }
}

impl Default for AloreMutex {
    fn default() -> AloreMutex {
        AloreMutex::new()
    }
}

/// A user-visible condition variable, always used together with an
/// `AloreMutex`'s guard (`spec.md`'s `Condition` type).
pub struct AloreCondition {
    inner: Condvar,
    signaled: AtomicBool,
}

impl AloreCondition {
    pub fn new() -> AloreCondition {
        AloreCondition {
            inner: Condvar::new(),
            signaled: AtomicBool::new(false),
        }
    }

    pub fn wait<'a>(&self, thread_id: u64, guard: MutexGuard<'a, ()>) -> MutexGuard<'a, ()> {
        allow_blocking(thread_id, || self.inner.wait(guard).unwrap())
    }

    pub fn wait_timeout<'a>(
        &self,
        thread_id: u64,
        guard: MutexGuard<'a, ()>,
        timeout: Duration,
    ) -> (MutexGuard<'a, ()>, bool) {
        allow_blocking(thread_id, || {
            let (g, result) = self.inner.wait_timeout(guard, timeout).unwrap();
            (g, result.timed_out())
        })
    }

    pub fn notify_one(&self) {
        self.signaled.store(true, Ordering::SeqCst);
        self.inner.notify_one();
    }

    pub fn notify_all(&self) {
        self.signaled.store(true, Ordering::SeqCst);
        self.inner.notify_all();
    }
}

impl Default for AloreCondition {
    fn default() -> AloreCondition {
        AloreCondition::new()
    }
}
