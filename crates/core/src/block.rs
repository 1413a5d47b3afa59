//! Heap block headers
//!
//! Every GC-managed allocation — nursery or old generation — begins with a
//! `BlockHeader`. Given nothing but a `Value`'s heap pointer, the collector
//! reads this header to learn the block's byte size and, via `BlockKind`,
//! where within the block any nested `Value`s (the block's own GC roots)
//! live (`spec.md` §3.2).
//!
//! Blocks are always allocated in multiples of `ALLOC_UNIT` bytes and
//! aligned to `ALLOC_UNIT`, which is large enough to leave the low 4 bits of
//! every block pointer free for `value::Value`'s tag.

use crate::value::{
    TAG_CONSTANT, TAG_FIX_ARRAY, TAG_FLOAT, TAG_FUNCTION, TAG_INSTANCE, TAG_LONG_INT, TAG_MAP,
    TAG_MIXED, TAG_NARROW_STR, TAG_SET, TAG_SUBSTR, TAG_TUPLE, TAG_TYPE, TAG_WIDE_STR,
};

/// Every heap block is a multiple of, and aligned to, this many bytes.
///
/// 16 bytes leaves 4 header-free low bits in every block address, matching
/// `value::Value`'s 4-bit tag.
pub const ALLOC_UNIT: usize = 16;

/// Round `size` bytes up to the next multiple of [`ALLOC_UNIT`].
#[inline]
pub fn round_block_size(size: usize) -> usize {
    (size + ALLOC_UNIT - 1) & !(ALLOC_UNIT - 1)
}

/// The concrete shape of a heap block, mirroring `value::Value`'s heap tags
/// one-for-one except where a single tag covers a family further
/// disambiguated here (`Mixed`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum BlockKind {
    Float = 0,
    FixArray = 1,
    NarrowStr = 2,
    WideStr = 3,
    SubStr = 4,
    Instance = 5,
    Type = 6,
    Function = 7,
    LongInt = 8,
    Constant = 9,
    /// Bound method: `(receiver: Value, function: Value)`.
    MixedBoundMethod = 10,
    /// A `Pair` stdlib value: `(left: Value, right: Value)`.
    MixedPair = 11,
    /// A `Range` stdlib value: `(start: Value, stop: Value)`.
    MixedRange = 12,
    /// An immutable `Tuple`: same flat-length-plus-slots layout as
    /// `FixArray`, under its own pointer tag so the interpreter's `is`/type
    /// checks can tell the two apart without consulting a type object.
    Tuple = 13,
    /// `Map`'s open-addressed table (`spec.md` §4.5): capacity/live-count
    /// header followed by `capacity` `(key, value)` `Value` pairs.
    Map = 14,
    /// `Set`'s open-addressed table: same engine as `Map`, one `Value` per
    /// slot instead of a pair.
    Set = 15,
    /// A closure (`spec.md` §4.4 "Closures", `CREATE_ANON`): `(function
    /// global index: Value, captured cells: Value)` where the second slot
    /// holds a `FixArray` of one-element exposed-variable cells. Shares the
    /// `Mixed` pointer tag, same as `MixedBoundMethod`/`MixedPair`/
    /// `MixedRange` — its two-slot shape is disambiguated by the header.
    MixedClosure = 16,
}

impl BlockKind {
    /// The `value::Value` pointer tag this block is referenced through.
    pub fn value_tag(self) -> u64 {
        match self {
            BlockKind::Float => TAG_FLOAT,
            BlockKind::FixArray => TAG_FIX_ARRAY,
            BlockKind::NarrowStr => TAG_NARROW_STR,
            BlockKind::WideStr => TAG_WIDE_STR,
            BlockKind::SubStr => TAG_SUBSTR,
            BlockKind::Instance => TAG_INSTANCE,
            BlockKind::Type => TAG_TYPE,
            BlockKind::Function => TAG_FUNCTION,
            BlockKind::LongInt => TAG_LONG_INT,
            BlockKind::Constant => TAG_CONSTANT,
            BlockKind::MixedBoundMethod
            | BlockKind::MixedPair
            | BlockKind::MixedRange
            | BlockKind::MixedClosure => TAG_MIXED,
            BlockKind::Tuple => TAG_TUPLE,
            BlockKind::Map => TAG_MAP,
            BlockKind::Set => TAG_SET,
        }
    }

    /// Whether a block of this kind holds any nested `Value` fields that the
    /// collector must trace and, on promotion, fix up.
    ///
    /// `false` for blocks that are pure bytes (strings, long-int digits):
    /// the collector copies them but never walks into them.
    pub fn has_value_fields(self) -> bool {
        !matches!(
            self,
            BlockKind::NarrowStr | BlockKind::WideStr | BlockKind::LongInt
        )
    }

    /// Bytes of non-`Value` bookkeeping a block of this kind keeps between
    /// its `BlockHeader` and its first `Value` slot: `FixArray`/`Tuple`'s
    /// 8-byte length prefix, `Map`/`Set`'s 16-byte capacity/live-count pair.
    /// The collector's flat-slot tracer (`heap::gc`) must skip exactly this
    /// many bytes before reading `Value`s, or it reinterprets a length or
    /// capacity integer as a `Value` and may chase it as a heap pointer.
    pub fn value_slot_prefix_bytes(self) -> usize {
        match self {
            BlockKind::FixArray | BlockKind::Tuple => 8,
            BlockKind::Map | BlockKind::Set => 16,
            _ => 0,
        }
    }

    fn from_u8(tag: u8) -> Option<BlockKind> {
        Some(match tag {
            0 => BlockKind::Float,
            1 => BlockKind::FixArray,
            2 => BlockKind::NarrowStr,
            3 => BlockKind::WideStr,
            4 => BlockKind::SubStr,
            5 => BlockKind::Instance,
            6 => BlockKind::Type,
            7 => BlockKind::Function,
            8 => BlockKind::LongInt,
            9 => BlockKind::Constant,
            10 => BlockKind::MixedBoundMethod,
            11 => BlockKind::MixedPair,
            12 => BlockKind::MixedRange,
            13 => BlockKind::Tuple,
            14 => BlockKind::Map,
            15 => BlockKind::Set,
            16 => BlockKind::MixedClosure,
            _ => return None,
        })
    }
}

/// Header bits besides the block kind: generation membership, the
/// forwarding flag a young collection sets on a block it has already
/// copied, and (old generation only) the free-list "not in use" flag.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockFlags(u8);

impl BlockFlags {
    const OLD_GEN: u8 = 1 << 0;
    const FORWARDED: u8 = 1 << 1;
    const FREE: u8 = 1 << 2;
    const FINALIZABLE: u8 = 1 << 3;

    pub const NONE: BlockFlags = BlockFlags(0);

    pub fn is_old_gen(self) -> bool {
        self.0 & Self::OLD_GEN != 0
    }
    pub fn set_old_gen(&mut self, v: bool) {
        self.set_bit(Self::OLD_GEN, v);
    }

    pub fn is_forwarded(self) -> bool {
        self.0 & Self::FORWARDED != 0
    }
    pub fn set_forwarded(&mut self, v: bool) {
        self.set_bit(Self::FORWARDED, v);
    }

    pub fn is_free(self) -> bool {
        self.0 & Self::FREE != 0
    }
    pub fn set_free(&mut self, v: bool) {
        self.set_bit(Self::FREE, v);
    }

    pub fn is_finalizable(self) -> bool {
        self.0 & Self::FINALIZABLE != 0
    }
    pub fn set_finalizable(&mut self, v: bool) {
        self.set_bit(Self::FINALIZABLE, v);
    }

    fn set_bit(&mut self, bit: u8, v: bool) {
        if v {
            self.0 |= bit;
        } else {
            self.0 &= !bit;
        }
    }
}

/// The header common to every GC-managed block.
///
/// `size` is the block's total allocation in bytes, header included, always
/// a multiple of [`ALLOC_UNIT`]. During a young collection, a forwarded
/// block stores the forwarding address in the dedicated `forward` word
/// instead of reusing `size` — a 32-bit `size` field can't hold an
/// arbitrary 64-bit heap address (old-gen blocks come from `std::alloc`,
/// whose addresses routinely exceed `u32::MAX`), so `size` keeps meaning
/// "block size" even on a forwarded header; only `forward` is repurposed,
/// and only while `flags().is_forwarded()` (`spec.md` §3.2, "a block that
/// has already been copied... is left as a forwarding pointer").
#[repr(C)]
#[derive(Debug)]
pub struct BlockHeader {
    kind: u8,
    flags: u8,
    _reserved: u16,
    size: u32,
    forward: u64,
}

impl BlockHeader {
    pub fn new(kind: BlockKind, size: usize) -> BlockHeader {
        debug_assert_eq!(size % ALLOC_UNIT, 0, "block size must be ALLOC_UNIT-aligned");
        BlockHeader {
            kind: kind as u8,
            flags: 0,
            _reserved: 0,
            size: size as u32,
            forward: 0,
        }
    }

    pub fn kind(&self) -> BlockKind {
        BlockKind::from_u8(self.kind).expect("corrupt block header: unknown kind byte")
    }

    pub fn size(&self) -> usize {
        self.size as usize
    }

    pub fn flags(&self) -> BlockFlags {
        BlockFlags(self.flags)
    }

    pub fn set_flags(&mut self, flags: BlockFlags) {
        self.flags = flags.0;
    }

    /// Overwrite this (nursery) header with a forwarding pointer to the
    /// block's new old-generation location. Only valid before the nursery
    /// arena is reset.
    pub fn set_forwarding(&mut self, target: *mut BlockHeader) {
        let mut flags = self.flags();
        flags.set_forwarded(true);
        self.flags = flags.0;
        self.forward = target as usize as u64;
    }

    pub fn forwarding_target(&self) -> Option<*mut BlockHeader> {
        if self.flags().is_forwarded() {
            Some(self.forward as usize as *mut BlockHeader)
        } else {
            None
        }
    }
}
