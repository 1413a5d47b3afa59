//! Exception kinds and embedder-facing error types
//!
//! The VM's internal control-flow exceptions (`spec.md` §7) are distinct
//! from the errors an embedder (the CLI, the module loader callback) can
//! observe at the boundary of a runtime call. This module covers both:
//!
//! - [`ExceptionKind`] enumerates the built-in exception hierarchy; each
//!   variant names the pre-allocated instance the interpreter raises
//!   directly (via [`crate::globals::RuntimeContext::exception_instance`])
//!   without going through ordinary allocation, so that raising it cannot
//!   itself fail on out-of-memory.
//! - [`LoadError`] is the `thiserror`-typed error the module loader
//!   callback and the CLI driver see; it never appears inside the
//!   interpreter's own control flow.
//!
//! The thread-local pending-exception slot itself lives in `alore_core::error`
//! (shared with the `Value` representation); this module only adds the
//! vocabulary for what gets stored there.

use alore_core::Value;
use std::fmt;

/// The built-in exception hierarchy (`spec.md` §7). Every kind has exactly
/// one pre-allocated instance per [`crate::globals::RuntimeContext`], so
/// raising one never itself requires an allocation that could fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ExceptionKind {
    /// Operator/method applied to wrong types; non-Boolean in a condition;
    /// invalid cast; type-object expected.
    TypeError,
    /// Invalid string-to-number; invalid radix; NaN/Inf to int; invalid
    /// range bounds; invalid character name; call on a primitive-type
    /// sentinel.
    ValueError,
    /// Unknown member id after a full supertype walk.
    MemberError,
    /// Out-of-range integer index after negative-index normalization.
    IndexError,
    /// Missing Map key; the message carries the key's `Repr`.
    KeyError,
    /// Divide or modulus by zero; negative base with a non-integer
    /// exponent.
    ArithmeticError,
    /// An `as` cast failed.
    CastError,
    /// An I/O call failed; carries an OS errno as both integer and
    /// symbolic constant.
    IoError,
    /// Allocation failed, or the stack overflowed while constructing an
    /// exception.
    MemoryError,
    /// Stack overflow or another runtime invariant breach.
    RuntimeError,
    /// A keyboard interrupt delivered to the main thread.
    InterruptException,
    /// `Exit(n)` was called.
    ExitException,
}

impl ExceptionKind {
    pub const ALL: [ExceptionKind; 12] = [
        ExceptionKind::TypeError,
        ExceptionKind::ValueError,
        ExceptionKind::MemberError,
        ExceptionKind::IndexError,
        ExceptionKind::KeyError,
        ExceptionKind::ArithmeticError,
        ExceptionKind::CastError,
        ExceptionKind::IoError,
        ExceptionKind::MemoryError,
        ExceptionKind::RuntimeError,
        ExceptionKind::InterruptException,
        ExceptionKind::ExitException,
    ];

    /// The name bound at the language level, e.g. for `is` checks and
    /// traceback printing.
    pub fn type_name(self) -> &'static str {
        match self {
            ExceptionKind::TypeError => "TypeError",
            ExceptionKind::ValueError => "ValueError",
            ExceptionKind::MemberError => "MemberError",
            ExceptionKind::IndexError => "IndexError",
            ExceptionKind::KeyError => "KeyError",
            ExceptionKind::ArithmeticError => "ArithmeticError",
            ExceptionKind::CastError => "CastError",
            ExceptionKind::IoError => "IoError",
            ExceptionKind::MemoryError => "MemoryError",
            ExceptionKind::RuntimeError => "RuntimeError",
            ExceptionKind::InterruptException => "InterruptException",
            ExceptionKind::ExitException => "ExitException",
        }
    }
}

impl fmt::Display for ExceptionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.type_name())
    }
}

/// A raised exception together with the field values an interpreted
/// handler (`except e is ValueError`) would see on `e`.
#[derive(Debug, Clone)]
pub struct RaisedException {
    pub kind: ExceptionKind,
    pub message: Option<String>,
    /// Populated lazily as the exception unwinds past each interpreted
    /// frame (`spec.md` §7).
    pub traceback: Vec<String>,
    /// `IoError` only.
    pub errno: Option<i32>,
}

impl RaisedException {
    pub fn new(kind: ExceptionKind, message: impl Into<String>) -> RaisedException {
        RaisedException {
            kind,
            message: Some(message.into()),
            traceback: Vec::new(),
            errno: None,
        }
    }

    pub fn io(errno: i32, message: impl Into<String>) -> RaisedException {
        RaisedException {
            kind: ExceptionKind::IoError,
            message: Some(message.into()),
            traceback: Vec::new(),
            errno: Some(errno),
        }
    }

    pub fn push_frame(&mut self, frame_description: String) {
        self.traceback.push(frame_description);
    }

    /// For `ExitException`, the code `Exit(n)` was raised with. The
    /// interpreter stores `n` as the exception's decimal-string message, the
    /// same convention `IoError` uses for its errno (a typed slot would cost
    /// every other kind a field it never populates). `None` for any other
    /// kind, or if the message isn't a valid `i32` (treated as `Exit(99)` by
    /// the caller, `spec.md` §6's "unrecoverable internal failure").
    pub fn exit_code(&self) -> Option<i32> {
        if self.kind != ExceptionKind::ExitException {
            return None;
        }
        self.message.as_deref()?.parse().ok()
    }
}

impl fmt::Display for RaisedException {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.message {
            Some(m) => write!(f, "{}: {}", self.kind, m),
            None => write!(f, "{}", self.kind),
        }
    }
}

impl std::error::Error for RaisedException {}

/// A `Result` alias for interpreter-internal operations that raise directly
/// rather than returning the `Error` sentinel and consulting the thread-local
/// pending slot (`spec.md` §7, "Propagation policy").
pub type VmResult<T> = Result<T, RaisedException>;

/// Errors observed at the embedder boundary: the module-loader callback and
/// the CLI driver. These are never seen inside the interpreter's own
/// control flow, only by code that calls into the VM from the outside.
#[derive(Debug, thiserror::Error)]
pub enum LoadError {
    #[error("module not found on ALOREPATH: {0}")]
    ModuleNotFound(String),

    #[error("failed to read module source {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("global table exhausted while allocating module globals")]
    GlobalTableExhausted,

    #[error("compile failed in {module}: {message}")]
    CompileFailed { module: String, message: String },
}

/// Errors the `alore` CLI driver reports directly to the user, distinct
/// from an Alore-level exception escaping to the top of the main thread.
#[derive(Debug, thiserror::Error)]
pub enum CliError {
    #[error(transparent)]
    Load(#[from] LoadError),

    #[error("invalid --max-heap value {0:?}")]
    InvalidMaxHeap(String),

    #[error("uncaught exception: {0}")]
    Uncaught(RaisedException),

    /// No module loader is linked into this build. `spec.md` §1 scopes the
    /// lexer/parser/compiler/module loader out of the runtime core as an
    /// external collaborator; a driver that links only this crate can start
    /// the VM and exercise its lifecycle but has nothing to hand the
    /// interpreter without a loader supplying compiled `Function`s.
    #[error("no module loader linked into this build; cannot compile or run {0}")]
    LoaderUnavailable(String),
}

/// Translate a raised exception plus an already-accumulated frame
/// description into an updated traceback, mirroring the interpreter's
/// lazy per-frame traceback population.
pub fn annotate_frame(mut exc: RaisedException, frame: impl Into<String>) -> RaisedException {
    exc.push_frame(frame.into());
    exc
}

/// Extract the payload carried by `value` for error messages that must
/// embed a `Repr`-like description of a `Value` (e.g. `KeyError`'s missing
/// key). Actual `Repr` dispatch lives in `types::dispatch`; this is the
/// fallback used when dispatch is unavailable (for error paths that must
/// not themselves risk raising).
pub fn debug_repr(v: Value) -> String {
    format!("{v:?}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exception_kind_names_are_stable() {
        assert_eq!(ExceptionKind::KeyError.type_name(), "KeyError");
        assert_eq!(ExceptionKind::ALL.len(), 12);
    }

    #[test]
    fn raised_exception_display_includes_message() {
        let e = RaisedException::new(ExceptionKind::ValueError, "bad radix");
        assert_eq!(e.to_string(), "ValueError: bad radix");
    }

    #[test]
    fn io_exception_carries_errno() {
        let e = RaisedException::io(2, "No such file or directory");
        assert_eq!(e.errno, Some(2));
        assert_eq!(e.kind, ExceptionKind::IoError);
    }

    #[test]
    fn exit_exception_reports_its_code() {
        let e = RaisedException::new(ExceptionKind::ExitException, "7");
        assert_eq!(e.exit_code(), Some(7));
    }

    #[test]
    fn non_exit_exception_has_no_exit_code() {
        let e = RaisedException::new(ExceptionKind::ValueError, "bad radix");
        assert_eq!(e.exit_code(), None);
    }
}
