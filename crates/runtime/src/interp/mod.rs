//! The bytecode interpreter
//!
//! `spec.md` §4.4: an opcode-addressed dispatch loop over fixed-width
//! instructions, a downward-growing per-function stack frame, structured
//! exception handling via per-frame exception tables, and a calling
//! convention that fills fixed/optional/varargs slots according to the
//! callee's declared arity.

pub mod calling;
pub mod closure;
pub mod exceptions;
pub mod frame;
pub mod interpreter;
pub mod opcode;

pub use frame::Frame;
pub use interpreter::Interpreter;
pub use opcode::Opcode;
