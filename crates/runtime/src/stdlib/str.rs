//! Str: narrow (8-bit), wide (16-bit), and substring string values
//!
//! `spec.md` §3.1 gives strings three heap shapes sharing one language-level
//! type: `NarrowStr` (one byte per code point, the common case), `WideStr`
//! (one `u16` per code point, for text outside Latin-1), and `SubStr` (a
//! view into another string: base value, offset, length, used so slicing
//! and substring extraction don't have to copy). All three answer the same
//! `code_points`/`len` queries; callers that need uniform access go through
//! those rather than matching on the underlying tag.
//!
//! Layout mirrors `stdlib::array`'s "length prefix then flat slots"
//! convention but with `u8`/`u16` element width instead of `Value`-sized
//! slots; neither `NarrowStr` nor `WideStr` have value fields
//! (`BlockKind::has_value_fields` excludes them), so the collector copies
//! them without walking into them, exactly as it does for `LongInt` digits.
//! `SubStr` does have a `Value` field (its base string), so it keeps the
//! collector honest about keeping the backing string alive.

use crate::error::{ExceptionKind, RaisedException, VmResult};
use crate::heap::Heap;
use alore_core::block::BlockKind;
use alore_core::value::{TAG_NARROW_STR, TAG_SUBSTR, TAG_WIDE_STR};
use alore_core::Value;
use std::mem::size_of;

const LEN_PREFIX_BYTES: usize = size_of::<u64>();

pub struct AloreStr;

impl AloreStr {
    /// Build a narrow string from a UTF-8 Rust `&str`, matching narrow/wide
    /// selection to whether every code point fits in a byte.
    pub fn from_str(heap: &Heap, s: &str) -> VmResult<Value> {
        let points: Vec<u32> = s.chars().map(|c| c as u32).collect();
        let wide = points.iter().any(|&cp| cp > 0xFF);
        Self::from_code_points(heap, &points, wide)
    }

    /// `spec.md` §4.1: constructing a wide char out of a code point that
    /// doesn't fit its 16-bit slot raises `ValueError` rather than losing
    /// the high bits. Narrow construction is only ever reached with
    /// `cp <= 0xFF` callers (`has_wide_point` steers anything larger to the
    /// wide path), so the narrow bound is checked defensively.
    pub fn from_code_points(heap: &Heap, points: &[u32], wide: bool) -> VmResult<Value> {
        let limit = if wide { 0xFFFF } else { 0xFF };
        if let Some(&cp) = points.iter().find(|&&cp| cp > limit) {
            return Err(RaisedException::new(
                ExceptionKind::ValueError,
                format!("code point {cp:#x} overflows a {}-bit character", if wide { 16 } else { 8 }),
            ));
        }
        if wide {
            Ok(Self::build(heap, BlockKind::WideStr, TAG_WIDE_STR, points, |base, i, cp| unsafe {
                std::ptr::write((base as *mut u16).add(i), cp as u16);
            }))
        } else {
            Ok(Self::build(heap, BlockKind::NarrowStr, TAG_NARROW_STR, points, |base, i, cp| unsafe {
                std::ptr::write((base as *mut u8).add(i), cp as u8);
            }))
        }
    }

    fn build(
        heap: &Heap,
        kind: BlockKind,
        tag: u64,
        points: &[u32],
        write_one: impl Fn(*mut u8, usize, u32),
    ) -> Value {
        let elem_size = if tag == TAG_WIDE_STR { 2 } else { 1 };
        let payload = LEN_PREFIX_BYTES + points.len() * elem_size;
        let block = heap.allocate_old(kind, payload);
        unsafe {
            let base = block.as_ptr().add(1) as *mut u8;
            std::ptr::write(base as *mut u64, points.len() as u64);
            let data = base.add(LEN_PREFIX_BYTES);
            for (i, &cp) in points.iter().enumerate() {
                write_one(data, i, cp);
            }
        }
        unsafe { Value::from_heap_ptr(tag, block) }
    }

    /// A view into `base[offset..offset + length)`, used by slicing so the
    /// backing narrow/wide string isn't copied.
    pub fn substr(heap: &Heap, base: Value, offset: usize, length: usize) -> Value {
        let payload = size_of::<Value>() + 2 * size_of::<u64>();
        let block = heap.allocate_old(BlockKind::SubStr, payload);
        unsafe {
            let fields = block.as_ptr().add(1) as *mut u8;
            std::ptr::write(fields as *mut Value, base);
            std::ptr::write(fields.add(size_of::<Value>()) as *mut u64, offset as u64);
            std::ptr::write(
                fields.add(size_of::<Value>() + size_of::<u64>()) as *mut u64,
                length as u64,
            );
        }
        unsafe { Value::from_heap_ptr(TAG_SUBSTR, block) }
    }

    pub fn len(v: Value) -> usize {
        match v.as_heap_ptr() {
            Some((tag, ptr)) if tag == TAG_SUBSTR => unsafe {
                let fields = ptr.as_ptr().add(1) as *const u8;
                std::ptr::read(
                    fields.add(size_of::<Value>() + size_of::<u64>()) as *const u64,
                ) as usize
            },
            Some((_, ptr)) => unsafe {
                let base = ptr.as_ptr().add(1) as *const u8;
                std::ptr::read(base as *const u64) as usize
            },
            None => panic!("Str value must be a heap reference"),
        }
    }

    /// Decode every string shape down to its code-point sequence. The
    /// common "is this narrow" fast path lives in callers that only need to
    /// know the width (e.g. concatenation), but anything that must compare
    /// or iterate code points goes through this.
    pub fn code_points(v: Value) -> Vec<u32> {
        let (tag, ptr) = v.as_heap_ptr().expect("Str value must be a heap reference");
        match tag {
            TAG_NARROW_STR => {
                let len = Self::len(v);
                let data = unsafe { (ptr.as_ptr().add(1) as *const u8).add(LEN_PREFIX_BYTES) };
                (0..len).map(|i| unsafe { std::ptr::read(data.add(i)) as u32 }).collect()
            }
            TAG_WIDE_STR => {
                let len = Self::len(v);
                let data =
                    unsafe { (ptr.as_ptr().add(1) as *const u8).add(LEN_PREFIX_BYTES) as *const u16 };
                (0..len).map(|i| unsafe { std::ptr::read(data.add(i)) as u32 }).collect()
            }
            TAG_SUBSTR => {
                let fields = unsafe { ptr.as_ptr().add(1) as *const u8 };
                let base = unsafe { std::ptr::read(fields as *const Value) };
                let offset = unsafe {
                    std::ptr::read(fields.add(size_of::<Value>()) as *const u64) as usize
                };
                let length = Self::len(v);
                let all = Self::code_points(base);
                all[offset..offset + length].to_vec()
            }
            other => panic!("not a Str tag: 0x{other:x}"),
        }
    }

    /// `spec.md` §8 "String concat": `narrow + narrow` stays narrow, any
    /// `wide` operand forces the result wide.
    pub fn concat(heap: &Heap, a: Value, b: Value) -> VmResult<Value> {
        let both_narrow = a.has_tag(TAG_NARROW_STR) && b.has_tag(TAG_NARROW_STR);
        let mut points = Self::code_points(a);
        points.extend(Self::code_points(b));
        let wide = !both_narrow && Self::has_wide_point(&points);
        Self::from_code_points(heap, &points, wide)
    }

    fn has_wide_point(points: &[u32]) -> bool {
        points.iter().any(|&cp| cp > 0xFF)
    }

    /// `"ab" * 3 == "ababab"` (`spec.md` §8).
    pub fn repeat(heap: &Heap, s: Value, count: usize) -> VmResult<Value> {
        let points = Self::code_points(s);
        let wide = Self::has_wide_point(&points);
        let mut out = Vec::with_capacity(points.len() * count);
        for _ in 0..count {
            out.extend_from_slice(&points);
        }
        Self::from_code_points(heap, &out, wide)
    }

    fn normalize_index(v: Value, index: i64) -> VmResult<usize> {
        let len = Self::len(v) as i64;
        let idx = if index < 0 { index + len } else { index };
        if idx < 0 || idx >= len {
            return Err(RaisedException::new(
                ExceptionKind::IndexError,
                format!("string index {index} out of range for length {len}"),
            ));
        }
        Ok(idx as usize)
    }

    /// Single-character access (`spec.md` §4.5's negative-index convention,
    /// shared with `Array`). Returns a one-code-point `Str`, not a raw code
    /// point, matching Alore's "characters are one-length strings" model.
    pub fn char_at(heap: &Heap, v: Value, index: i64) -> VmResult<Value> {
        let idx = Self::normalize_index(v, index)?;
        let points = Self::code_points(v);
        let cp = points[idx];
        Self::from_code_points(heap, &[cp], cp > 0xFF)
    }

    pub fn compare(a: Value, b: Value) -> std::cmp::Ordering {
        Self::code_points(a).cmp(&Self::code_points(b))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn narrow_round_trips() {
        let heap = Heap::new();
        let s = AloreStr::from_str(&heap, "hello").unwrap();
        assert!(s.has_tag(TAG_NARROW_STR));
        assert_eq!(AloreStr::len(s), 5);
        assert_eq!(AloreStr::code_points(s), vec![104, 101, 108, 108, 111]);
    }

    #[test]
    fn wide_is_used_for_non_latin1_code_points() {
        let heap = Heap::new();
        let s = AloreStr::from_str(&heap, "caf\u{00e9}\u{0391}").unwrap();
        assert!(s.has_tag(TAG_WIDE_STR));
    }

    #[test]
    fn from_code_points_rejects_a_code_point_that_overflows_a_wide_char() {
        let heap = Heap::new();
        let err = AloreStr::from_code_points(&heap, &[0x1F600], true).unwrap_err();
        assert_eq!(err.kind, ExceptionKind::ValueError);
    }

    #[test]
    fn concat_narrow_and_narrow_stays_narrow() {
        let heap = Heap::new();
        let a = AloreStr::from_str(&heap, "ab").unwrap();
        let b = AloreStr::from_str(&heap, "cd").unwrap();
        let c = AloreStr::concat(&heap, a, b).unwrap();
        assert!(c.has_tag(TAG_NARROW_STR));
        assert_eq!(AloreStr::len(c), 4);
        assert_eq!(
            AloreStr::code_points(c),
            AloreStr::code_points(AloreStr::from_str(&heap, "abcd").unwrap())
        );
    }

    #[test]
    fn concat_with_wide_operand_forces_wide() {
        let heap = Heap::new();
        let a = AloreStr::from_str(&heap, "ab").unwrap();
        let b = AloreStr::from_code_points(&heap, &[0x0391], true).unwrap();
        let c = AloreStr::concat(&heap, a, b).unwrap();
        assert!(c.has_tag(TAG_WIDE_STR));
        assert_eq!(AloreStr::len(c), 3);
    }

    #[test]
    fn repeat_matches_example_in_spec() {
        let heap = Heap::new();
        let s = AloreStr::from_str(&heap, "ab").unwrap();
        let r = AloreStr::repeat(&heap, s, 3).unwrap();
        assert_eq!(
            AloreStr::code_points(r),
            AloreStr::code_points(AloreStr::from_str(&heap, "ababab").unwrap())
        );
    }

    #[test]
    fn negative_index_addresses_from_the_end() {
        let heap = Heap::new();
        let s = AloreStr::from_str(&heap, "hello").unwrap();
        let last = AloreStr::char_at(&heap, s, -1).unwrap();
        assert_eq!(AloreStr::code_points(last), vec![b'o' as u32]);
    }

    #[test]
    fn out_of_range_char_access_raises_index_error() {
        let heap = Heap::new();
        let s = AloreStr::from_str(&heap, "hi").unwrap();
        let err = AloreStr::char_at(&heap, s, 10).unwrap_err();
        assert_eq!(err.kind, ExceptionKind::IndexError);
    }

    #[test]
    fn substr_views_share_the_backing_string() {
        let heap = Heap::new();
        let s = AloreStr::from_str(&heap, "hello world").unwrap();
        let view = AloreStr::substr(&heap, s, 6, 5);
        assert_eq!(AloreStr::len(view), 5);
        assert_eq!(
            AloreStr::code_points(view),
            AloreStr::code_points(AloreStr::from_str(&heap, "world").unwrap())
        );
    }

    #[test]
    fn compare_is_lexicographic_by_code_point() {
        let heap = Heap::new();
        let a = AloreStr::from_str(&heap, "abc").unwrap();
        let b = AloreStr::from_str(&heap, "abd").unwrap();
        assert_eq!(AloreStr::compare(a, b), std::cmp::Ordering::Less);
    }
}
