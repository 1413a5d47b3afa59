//! Runtime diagnostics for production debugging
//!
//! Provides a SIGQUIT (`kill -3`) handler that dumps runtime statistics to
//! stderr, the same JVM-style thread-dump idiom the teacher runtime uses,
//! adapted from its strand/channel counters to Alore's thread registry and
//! heap.

use crate::concurrency::ThreadRegistry;
use crate::heap::roots::RootProvider;
use crate::heap::Heap;
use std::sync::{Once, OnceLock};

static SIGNAL_HANDLER_INIT: Once = Once::new();

/// The registry and heap a SIGQUIT-triggered dump reports on. Set once at
/// VM start by whoever calls [`install_signal_handler`]; a dump before
/// that point is a no-op rather than a panic, since a signal can arrive
/// before startup finishes.
static DIAGNOSTIC_TARGET: OnceLock<DiagnosticTarget> = OnceLock::new();

struct DiagnosticTarget {
    registry: &'static ThreadRegistry,
    heap: &'static Heap,
}

/// Install the SIGQUIT signal handler for diagnostics (`spec.md`'s `-m`/`-T`
/// debug flags and ambient observability — idempotent, safe to call more
/// than once, mirroring the teacher runtime's `scheduler_init`-triggered
/// install).
pub fn install_signal_handler(registry: &'static ThreadRegistry, heap: &'static Heap) {
    let _ = DIAGNOSTIC_TARGET.set(DiagnosticTarget { registry, heap });

    SIGNAL_HANDLER_INIT.call_once(|| {
        #[cfg(unix)]
        {
            unsafe {
                let _ = signal_hook::low_level::register(signal_hook::consts::SIGQUIT, || {
                    dump_diagnostics();
                });
            }
        }

        #[cfg(not(unix))]
        {
            // Signal handling isn't available; dump_diagnostics() can
            // still be called directly.
        }
    });
}

/// Dump runtime diagnostics to stderr. Callable directly (the CLI's debug
/// flags do this) or triggered via SIGQUIT.
pub fn dump_diagnostics() {
    use std::io::Write;
    let mut out = std::io::stderr().lock();

    let _ = writeln!(out, "\n=== Alore Runtime Diagnostics ===");
    let _ = writeln!(out, "Timestamp: {:?}", std::time::SystemTime::now());

    let Some(target) = DIAGNOSTIC_TARGET.get() else {
        let _ = writeln!(out, "(runtime not yet installed)");
        let _ = writeln!(out, "=== End Diagnostics ===\n");
        return;
    };

    let _ = writeln!(out, "\n[GC]");
    let _ = writeln!(
        out,
        "  Allocations currently disallowed: {}",
        target.heap.gc_disallowed()
    );

    let _ = writeln!(out, "\n[Threads]");
    let mut count = 0usize;
    target.registry.for_each_mutator(&mut |_roots| count += 1);
    let _ = writeln!(out, "  Registered mutators: {count}");

    let _ = writeln!(out, "\n=== End Diagnostics ===\n");
}
