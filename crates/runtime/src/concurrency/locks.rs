//! The VM's six named locks
//!
//! `spec.md` §5 enumerates a fixed set of global locks acquired in a
//! defined order to avoid deadlock: heap, thread (registry), interpreter
//! (bytecode-loading), hash (identity-hash side table), stream (buffered
//! I/O), and finalizer (finalizer queue). Most of these locks already live
//! next to the data they protect (`Heap::old_gen`, `Heap::identity_hash`,
//! `Heap::finalizer_queue`); [`NamedLocks`] covers the two that don't have
//! an obvious home elsewhere — the thread registry and the interpreter's
//! module-loading critical section — and documents the acquisition order
//! for the rest.
//!
//! Acquisition order, outermost first: thread, heap, interpreter, hash,
//! stream, finalizer. Code that needs more than one of these locks at once
//! must take them in this order.

use std::sync::Mutex;

pub struct NamedLocks {
    /// Guards `ThreadRegistry`'s membership list during thread spawn/exit.
    pub thread: Mutex<()>,
    /// Guards module loading (`spec.md` §4.6): a module must finish
    /// allocating its globals and registering its public symbols as one
    /// atomic step from the perspective of any other thread importing it
    /// concurrently.
    pub interpreter: Mutex<()>,
}

impl NamedLocks {
    pub fn new() -> NamedLocks {
        NamedLocks {
            thread: Mutex::new(()),
            interpreter: Mutex::new(()),
        }
    }
}

impl Default for NamedLocks {
    fn default() -> NamedLocks {
        NamedLocks::new()
    }
}
