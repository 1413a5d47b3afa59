//! Alore Core: tagged-value and heap-block primitives
//!
//! This crate holds the representation that every other part of the Alore
//! runtime agrees on but that has no opinion of its own about allocation,
//! threading, or dispatch:
//!
//! - `value`: the one-word tagged `Value`, its sentinels, and short-integer
//!   arithmetic with overflow detection.
//! - `block`: the heap block header every GC-managed allocation begins
//!   with, and the block-kind tag the collector reads it from.
//! - `longint`: arbitrary-precision integer digits and the arithmetic used
//!   once a short integer overflows.
//! - `error`: thread-local pending-exception state, shared by every C-style
//!   entry point in `alore-rt`.
//!
//! # Modules
//!
//! - `value`: Value (Int, Float, heap references, sentinels)
//! - `block`: BlockHeader, BlockKind, allocation-unit rounding
//! - `longint`: Digit, LongInt, schoolbook arithmetic
//! - `error`: thread-local last-error / pending-exception slot

pub mod block;
pub mod error;
pub mod longint;
pub mod value;

pub use block::{BlockHeader, BlockKind, ALLOC_UNIT, round_block_size};
pub use error::{clear_pending, has_pending, set_pending, take_pending};
pub use longint::LongInt;
pub use value::{Sentinel, Value, SHORT_INT_MAX, SHORT_INT_MIN};
