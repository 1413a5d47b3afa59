//! Cooperative multithreading: per-thread state, the freeze protocol, and
//! the named locks that order access to shared VM structures
//! (`spec.md` §5).

pub mod freeze;
pub mod locks;
pub mod sync_prims;
pub mod thread;

use crate::heap::roots::{MutatorRoots, RootProvider};
use alore_core::Value;
use std::sync::Mutex;
use thread::ThreadState;

/// The process-wide list of live mutator threads. Implements
/// `heap::roots::RootProvider` so `heap::gc` can walk every thread's roots
/// without depending on this module's concrete types.
pub struct ThreadRegistry {
    threads: Mutex<Vec<Box<ThreadState>>>,
    globals: Mutex<Vec<*mut Value>>,
    locks: locks::NamedLocks,
}

// `globals` holds raw slot addresses into `globals::ModuleTable::globals`,
// valid for the process lifetime of that table; scanned only while the
// world is frozen, matching every other raw-pointer root in this crate.
unsafe impl Send for ThreadRegistry {}
unsafe impl Sync for ThreadRegistry {}

impl ThreadRegistry {
    pub fn new() -> ThreadRegistry {
        ThreadRegistry {
            threads: Mutex::new(Vec::new()),
            globals: Mutex::new(Vec::new()),
            locks: locks::NamedLocks::new(),
        }
    }

    pub fn locks(&self) -> &locks::NamedLocks {
        &self.locks
    }

    /// Register a freshly spawned thread's state and return its id.
    pub fn spawn(&self) -> u64 {
        let _guard = self.locks.thread.lock().unwrap();
        let state = Box::new(ThreadState::new());
        let id = state.id;
        freeze::register_thread();
        self.threads.lock().unwrap().push(state);
        id
    }

    pub fn exit(&self, id: u64) {
        let _guard = self.locks.thread.lock().unwrap();
        self.threads.lock().unwrap().retain(|t| t.id != id);
        freeze::unregister_thread();
    }

    /// Register a module-global slot address so it's scanned as a root
    /// (`spec.md` §4.2's "globals flagged as containing young pointers").
    pub fn register_global_slot(&self, slot: *mut Value) {
        self.globals.lock().unwrap().push(slot);
    }

    /// Stop every thread but the caller at a safepoint for the duration of
    /// `f`, then resume them. `caller_thread_id` identifies the thread
    /// driving the collection (it never parks on its own request).
    pub fn with_world_frozen<R>(&self, caller_thread_id: u64, f: impl FnOnce() -> R) -> R {
        let _guard = freeze::request_freeze_and_wait(caller_thread_id);
        f()
    }
}

impl Default for ThreadRegistry {
    fn default() -> ThreadRegistry {
        ThreadRegistry::new()
    }
}

impl RootProvider for ThreadRegistry {
    fn for_each_mutator(&self, f: &mut dyn FnMut(MutatorRoots<'_>)) {
        let mut threads = self.threads.lock().unwrap();
        for state in threads.iter_mut() {
            f(thread::as_mutator_roots(state));
        }
    }

    fn global_roots(&self, f: &mut dyn FnMut(&mut Value)) {
        let globals = self.globals.lock().unwrap();
        for &slot in globals.iter() {
            // SAFETY: only scanned while the world is frozen.
            unsafe {
                f(&mut *slot);
            }
        }
    }

    fn reset_all_nurseries(&self) {
        let mut threads = self.threads.lock().unwrap();
        for state in threads.iter_mut() {
            state.nursery.reset();
        }
    }
}
