//! The runtime context: per-VM global mutable state
//!
//! `spec.md` §9 frames the Value sentinels and the pre-allocated exception
//! instances as fields of a single runtime context created at VM start and
//! threaded into every entry point, allowing a realization to make them
//! static after construction so long as a test can reset a context per
//! test. We follow that: [`RuntimeContext`] owns them, a process normally
//! has exactly one behind [`std::sync::OnceLock`] (installed by
//! [`RuntimeContext::install`]), and tests construct private instances with
//! [`RuntimeContext::new`] instead of touching the shared one.

use crate::error::ExceptionKind;
use crate::heap::Heap;
use alore_core::Value;
use std::collections::HashMap;
use std::sync::OnceLock;

static GLOBAL_CONTEXT: OnceLock<RuntimeContext> = OnceLock::new();

/// One pre-allocated exception instance per [`ExceptionKind`], so that
/// raising a built-in exception never itself requires an allocation that
/// could fail under memory pressure.
pub struct PreallocatedExceptions {
    instances: HashMap<ExceptionKind, Value>,
}

impl PreallocatedExceptions {
    fn build(heap: &Heap) -> PreallocatedExceptions {
        let mut instances = HashMap::with_capacity(ExceptionKind::ALL.len());
        for kind in ExceptionKind::ALL {
            instances.insert(kind, heap.allocate_sentinel_exception(kind));
        }
        PreallocatedExceptions { instances }
    }

    pub fn get(&self, kind: ExceptionKind) -> Value {
        *self
            .instances
            .get(&kind)
            .expect("every ExceptionKind has a pre-allocated instance")
    }
}

/// Module-global descriptors and the symbol table the loader callback
/// populates (`spec.md` §4.6/§6). The runtime only stores what it was
/// handed; compiling source and deciding what symbols exist is the module
/// loader's job, not the runtime's (`spec.md` §1, "deliberately out of
/// scope").
pub struct ModuleTable {
    /// Global slot values, indexed by global index.
    pub globals: Vec<Value>,
    /// Maps a public global's interned member id back to its global index,
    /// for `spec.md` §4.6's "lookup from a module symbol to all its public
    /// global identifiers".
    pub public_symbols: HashMap<u32, Vec<usize>>,
    next_free: usize,
}

impl ModuleTable {
    fn new() -> ModuleTable {
        ModuleTable {
            globals: Vec::new(),
            public_symbols: HashMap::new(),
            next_free: 0,
        }
    }

    /// `spec.md` §4.6: `allocate_module_globals → (first_var_index, first_const_index)`.
    /// Constants and variables share one growable array in this
    /// realization; the two returned indices both point at the start of
    /// the freshly extended region, and the loader is free to treat the
    /// low half as vars and the high half as consts by convention.
    pub fn allocate_module_globals(&mut self, count: usize) -> (usize, usize) {
        let first = self.next_free;
        self.globals.resize(first + count, Value::NIL);
        self.next_free += count;
        (first, first)
    }

    /// `spec.md` §4.6: `free_globals(first_index)` — used when a module
    /// fails to load after partial global allocation.
    pub fn free_globals(&mut self, first_index: usize) {
        self.globals.truncate(first_index);
        self.next_free = first_index;
    }

    pub fn register_public_symbol(&mut self, member_id: u32, global_index: usize) {
        self.public_symbols
            .entry(member_id)
            .or_default()
            .push(global_index);
    }
}

/// Everything a single Alore VM instance needs that isn't owned by an
/// individual thread: the Value sentinels (trivial — they're `const`s on
/// `Value` itself), the pre-allocated exception instances, the heap, and
/// the module/global table.
pub struct RuntimeContext {
    pub heap: Heap,
    pub exceptions: PreallocatedExceptions,
    pub modules: std::sync::Mutex<ModuleTable>,
    pub is_standalone: bool,
}

impl RuntimeContext {
    pub fn new(is_standalone: bool) -> RuntimeContext {
        let heap = Heap::new();
        let exceptions = PreallocatedExceptions::build(&heap);
        RuntimeContext {
            heap,
            exceptions,
            modules: std::sync::Mutex::new(ModuleTable::new()),
            is_standalone,
        }
    }

    /// Install `self` as the process-wide runtime context. Panics if one
    /// was already installed — a process hosts exactly one live VM.
    pub fn install(self) -> &'static RuntimeContext {
        GLOBAL_CONTEXT
            .set(self)
            .unwrap_or_else(|_| panic!("RuntimeContext already installed"));
        GLOBAL_CONTEXT.get().unwrap()
    }

    pub fn global() -> &'static RuntimeContext {
        GLOBAL_CONTEXT
            .get()
            .expect("RuntimeContext::install must run before the VM starts")
    }

    pub fn exception_instance(&self, kind: ExceptionKind) -> Value {
        self.exceptions.get(kind)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn module_table_allocates_contiguous_slots() {
        let mut t = ModuleTable::new();
        let (first_var, first_const) = t.allocate_module_globals(4);
        assert_eq!(first_var, 0);
        assert_eq!(first_const, 0);
        assert_eq!(t.globals.len(), 4);
        let (second, _) = t.allocate_module_globals(2);
        assert_eq!(second, 4);
        assert_eq!(t.globals.len(), 6);
    }

    #[test]
    fn free_globals_truncates_and_rewinds() {
        let mut t = ModuleTable::new();
        t.allocate_module_globals(4);
        t.free_globals(2);
        assert_eq!(t.globals.len(), 2);
        let (next, _) = t.allocate_module_globals(1);
        assert_eq!(next, 2);
    }

    #[test]
    fn preallocated_exceptions_cover_every_kind() {
        let ctx = RuntimeContext::new(false);
        for kind in ExceptionKind::ALL {
            let v = ctx.exception_instance(kind);
            assert!(v.is_heap_ref());
        }
    }
}
