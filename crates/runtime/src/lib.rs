//! The Alore virtual machine runtime
//!
//! `spec.md` §1 describes four pieces that together form a working
//! language runtime core:
//!
//! - [`heap`]: tagged-value heap allocation and generational GC
//!   (nursery copying collector, old-gen mark-sweep, write barrier).
//! - [`types`]: `TypeInfo` and member dispatch across six hashed tables
//!   (public/private × getter/setter/method).
//! - [`interp`]: the bytecode interpreter — opcode dispatch, frames,
//!   the calling convention, and structured exception unwinding.
//! - [`concurrency`]: one-OS-thread-per-Alore-thread scheduling, the
//!   stop-the-world freeze protocol, and named locks.
//!
//! [`globals`] ties these together into a [`globals::RuntimeContext`]: the
//! heap, the pre-allocated exception instances, and the module global
//! table, installed once per process. [`error`] carries the exception
//! vocabulary shared by every layer above, and [`stdlib`] implements the
//! container and arithmetic types the interpreter's opcode handlers call
//! into directly (Array, Tuple, Str, Map, Set, Sort, Int/Float helpers).
//!
//! `diagnostics` (behind the `diagnostics` feature, on by default) installs
//! a SIGQUIT handler that dumps live-thread and GC state to stderr, for the
//! same kind of production debugging the teacher crate's `watchdog.rs` gave
//! `seq-runtime`.

pub mod concurrency;
#[cfg(feature = "diagnostics")]
pub mod diagnostics;
pub mod error;
pub mod globals;
pub mod heap;
pub mod interp;
pub mod stdlib;
pub mod types;

pub use alore_core::{LongInt, Sentinel, Value};
pub use error::{ExceptionKind, LoadError, RaisedException, VmResult};
pub use globals::RuntimeContext;
pub use interp::{Frame, Interpreter, Opcode};
pub use types::{MemberId, TypeInfo};
