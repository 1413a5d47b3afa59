//! The Alore heap: generational, mostly-copying garbage collection
//!
//! `spec.md` §4.2 splits the heap into a per-thread bump-pointer nursery and
//! a shared old generation of segregated free lists, connected by a
//! remembered set of old→young references and a stop-the-world copying
//! collector for the young generation plus mark-sweep for the old.
//!
//! ```text
//!           per mutator thread                 shared
//!         ┌───────────────────┐        ┌──────────────────────┐
//!         │      Nursery      │        │     Old generation    │
//!         │  (bumpalo::Bump)  │ ──────▶│ segregated free lists │
//!         │   bump pointer    │ young   │  keyed by size class  │
//!         │   new-ref list    │ collect │  + large-object list  │
//!         └───────────────────┘        └──────────────────────┘
//!                    ▲                            │
//!                    │ write barrier (old→young)   │ mark-sweep
//!                    └─────────────────────────────┘ (old collection)
//! ```
//!
//! Submodules:
//! - `nursery`: per-thread bump allocation.
//! - `oldgen`: segregated free lists, large-object list, identity-hash side
//!   table.
//! - `gc`: the young (copying) and old (mark-sweep) collection algorithms.
//! - `roots`: the root set a collection scans, abstracted over how the
//!   concurrency layer stores per-thread stacks so this module doesn't
//!   depend on `concurrency`.
//! - `barrier`: the old→young write barrier contract.

pub mod barrier;
pub mod gc;
pub mod nursery;
pub mod oldgen;
pub mod roots;

use crate::error::ExceptionKind;
use alore_core::block::{BlockHeader, BlockKind, round_block_size};
use alore_core::value::TAG_INSTANCE;
use alore_core::Value;
use oldgen::OldGen;
use std::ptr::NonNull;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

/// Shared state every mutator thread allocates against. One per VM
/// (`globals::RuntimeContext` owns it); thread-local nurseries are owned by
/// `concurrency::ThreadState`, not here, so that a thread's exit can drop
/// its nursery without touching this struct.
pub struct Heap {
    pub(crate) old_gen: Mutex<OldGen>,
    identity_hash: Mutex<std::collections::HashMap<usize, u64>>,
    next_identity_hash: AtomicU64,
    pub(crate) finalizer_queue: Mutex<Vec<Value>>,
    /// Set while a thread holds a "disallow GC" critical region
    /// (`spec.md` §4.2, "Allow/disallow old-gen GC").
    gc_disallow_depth: AtomicU64,
}

impl Heap {
    pub fn new() -> Heap {
        Heap {
            old_gen: Mutex::new(OldGen::new()),
            identity_hash: Mutex::new(std::collections::HashMap::new()),
            next_identity_hash: AtomicU64::new(1),
            finalizer_queue: Mutex::new(Vec::new()),
            gc_disallow_depth: AtomicU64::new(0),
        }
    }

    /// Allocate directly in the old generation: used for objects the
    /// caller knows are long-lived (module globals, the pre-allocated
    /// exception instances) or for "unmovable" nursery-overflow requests
    /// (`spec.md` §4.2).
    pub fn allocate_old(&self, kind: BlockKind, payload_size: usize) -> NonNull<BlockHeader> {
        let total = round_block_size(std::mem::size_of::<BlockHeader>() + payload_size);
        let mut old = self.old_gen.lock().unwrap();
        old.allocate(kind, total)
    }

    pub fn gc_disallowed(&self) -> bool {
        self.gc_disallow_depth.load(Ordering::Acquire) > 0
    }

    /// Enter a critical region that holds raw pointers into the heap.
    /// Paired with [`Heap::end_disallow_gc`]; reentrant.
    pub fn begin_disallow_gc(&self) {
        self.gc_disallow_depth.fetch_add(1, Ordering::AcqRel);
    }

    pub fn end_disallow_gc(&self) {
        self.gc_disallow_depth.fetch_sub(1, Ordering::AcqRel);
    }

    /// The stable identity hash for a pointer-addressed value
    /// (`spec.md` §4.2, "hash-id side table"). Allocated lazily on first
    /// use and swept when the pointer becomes unreachable.
    pub fn identity_hash(&self, ptr: NonNull<BlockHeader>) -> u64 {
        let addr = ptr.as_ptr() as usize;
        let mut table = self.identity_hash.lock().unwrap();
        *table
            .entry(addr)
            .or_insert_with(|| self.next_identity_hash.fetch_add(1, Ordering::Relaxed))
    }

    /// Drop identity-hash entries for addresses no longer present in
    /// `live`. Called by the old-gen sweep.
    pub(crate) fn sweep_identity_hashes(&self, live: &std::collections::HashSet<usize>) {
        let mut table = self.identity_hash.lock().unwrap();
        table.retain(|addr, _| live.contains(addr));
    }

    /// Allocate a permanent, old-gen, unmovable instance of the wrapper
    /// type for `kind`, with its message slot left `Nil`. This is how
    /// `globals::RuntimeContext` builds the twelve pre-allocated exception
    /// singletons at VM start — they must exist before anything else can
    /// fail, so they bypass ordinary instance construction entirely.
    pub fn allocate_sentinel_exception(&self, kind: ExceptionKind) -> Value {
        // message, traceback, errno/code: four Value-sized slots.
        let slot_count = 4usize;
        let payload = slot_count * std::mem::size_of::<Value>();
        let block = self.allocate_old(BlockKind::Instance, payload);
        // `allocate_old` already wrote a live BlockHeader; only the payload
        // slots need initializing.
        unsafe {
            let slots = block.as_ptr().add(1) as *mut Value;
            for i in 0..slot_count {
                std::ptr::write(slots.add(i), Value::NIL);
            }
            // Stash which exception kind this sentinel represents in its
            // first slot as a short int tag; `types::dispatch` resolves the
            // concrete TypeInfo for traceback/`is` purposes from the kind
            // itself, but keeping it here makes the block self-describing
            // for debugging dumps.
            std::ptr::write(slots, Value::int(kind as i64));
        }
        unsafe { Value::from_heap_ptr(TAG_INSTANCE, block) }
    }
}

impl Default for Heap {
    fn default() -> Heap {
        Heap::new()
    }
}
