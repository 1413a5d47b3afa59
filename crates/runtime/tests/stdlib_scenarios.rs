//! Cross-module integration scenarios, exercised through the public API
//! surface rather than a single module's private internals.
//!
//! `spec.md` §8's literal end-to-end scenarios ground these: Map
//! keys/remove/hasKey, Array+Str concatenation repeated under a
//! reallocating table, and old-generation GC safety across a batch of
//! Map/Set allocations (the collision this crate's `BlockKind` prefix
//! bytes could have caused, see `DESIGN.md`'s open questions).

use alore_rt::heap::gc;
use alore_rt::heap::roots::{MutatorRoots, RootProvider};
use alore_rt::heap::Heap;
use alore_rt::stdlib::hash::{default_eq, default_hash};
use alore_rt::stdlib::map::AloreMap;
use alore_rt::stdlib::set::AloreSet;
use alore_rt::stdlib::str::AloreStr;
use alore_rt::Value;

struct SingleThreadHeap {
    stack: std::cell::RefCell<Vec<Value>>,
}

impl RootProvider for SingleThreadHeap {
    fn for_each_mutator(&self, f: &mut dyn FnMut(MutatorRoots<'_>)) {
        let mut stack = self.stack.borrow_mut();
        let mut temp = Vec::new();
        let mut retained = Vec::new();
        let mut new_refs = Vec::new();
        let mut finalizable = Vec::new();
        f(MutatorRoots {
            alore_stack: &mut stack,
            temp_stack: &mut temp,
            exception_slot: None,
            retained_young: &mut retained,
            new_reference_slots: &mut new_refs,
            finalizable_candidates: &mut finalizable,
        });
    }
    fn global_roots(&self, _f: &mut dyn FnMut(&mut Value)) {}
    fn reset_all_nurseries(&self) {}
}

/// `spec.md` §8 scenario 3: `Map("a":1,"b":2).keys()` is a two-element
/// array containing `"a"` and `"b"`; `remove("a")` then `hasKey("a")` is
/// false.
#[test]
fn map_keys_remove_haskey_scenario() {
    let heap = Heap::new();
    let a = AloreStr::from_str(&heap, "a").unwrap();
    let b = AloreStr::from_str(&heap, "b").unwrap();

    let mut m = AloreMap::new(&heap);
    AloreMap::set(&mut m, a, Value::int(1), &heap, &default_hash, &default_eq);
    AloreMap::set(&mut m, b, Value::int(2), &heap, &default_hash, &default_eq);

    let mut keys: Vec<String> = AloreMap::keys(m)
        .into_iter()
        .map(|k| {
            AloreStr::code_points(k)
                .into_iter()
                .map(|cp| char::from_u32(cp).unwrap())
                .collect::<String>()
        })
        .collect();
    keys.sort();
    assert_eq!(keys, vec!["a".to_string(), "b".to_string()]);

    AloreMap::remove(&mut m, a, &heap, &default_hash, &default_eq).unwrap();
    assert!(!AloreMap::has_key(m, a, &default_hash, &default_eq));
    assert!(AloreMap::has_key(m, b, &default_hash, &default_eq));
}

/// `spec.md` §8's Map law: iteration visits each live entry exactly once,
/// even after growth has rehashed the table at least once.
#[test]
fn map_survives_growth_with_every_entry_visited_once() {
    let heap = Heap::new();
    let mut m = AloreMap::new(&heap);
    for i in 0..200i64 {
        AloreMap::set(
            &mut m,
            Value::int(i),
            Value::int(i * 2),
            &heap,
            &default_hash,
            &default_eq,
        );
    }
    assert_eq!(AloreMap::len(m), 200);

    let mut seen = std::collections::HashSet::new();
    for (k, v) in AloreMap::entries(m) {
        let k = k.as_short_int().unwrap();
        let v = v.as_short_int().unwrap();
        assert_eq!(v, k * 2);
        assert!(seen.insert(k), "key {k} visited more than once");
    }
    assert_eq!(seen.len(), 200);
}

/// `spec.md` §4.5: Set equality is cardinality plus mutual containment,
/// independent of insertion order, surviving growth.
#[test]
fn set_equality_after_growth_and_shrink() {
    let heap = Heap::new();
    let mut s = AloreSet::new(&heap);
    for i in 0..50i64 {
        AloreSet::add(&mut s, Value::int(i), &heap, &default_hash, &default_eq);
    }
    for i in (0..50i64).step_by(2) {
        AloreSet::remove(&mut s, Value::int(i), &heap, &default_hash, &default_eq).unwrap();
    }
    assert_eq!(AloreSet::len(s), 25);

    let mut rebuilt = AloreSet::new(&heap);
    for i in (1..50i64).step_by(2) {
        AloreSet::add(&mut rebuilt, Value::int(i), &heap, &default_hash, &default_eq);
    }
    assert!(AloreSet::set_eq(s, rebuilt, &default_hash, &default_eq));
}

/// GC safety (`spec.md` §8): a batch of `Map`/`Set`/`Array`-shaped
/// old-generation blocks, each carrying the non-`Value` prefix bytes
/// `BlockKind::value_slot_prefix_bytes` now accounts for, survives an old
/// collection with every entry intact and no misinterpreted prefix word.
#[test]
fn old_collection_preserves_map_and_set_contents() {
    let heap = Heap::new();
    let mut m = AloreMap::new(&heap);
    for i in 0..40i64 {
        AloreMap::set(
            &mut m,
            Value::int(i),
            Value::int(-i),
            &heap,
            &default_hash,
            &default_eq,
        );
    }
    let mut s = AloreSet::new(&heap);
    for i in 0..40i64 {
        AloreSet::add(&mut s, Value::int(i), &heap, &default_hash, &default_eq);
    }

    let provider = SingleThreadHeap {
        stack: std::cell::RefCell::new(vec![m, s]),
    };
    gc::old_collect(&heap, &provider);

    let stack = provider.stack.borrow();
    let (survived_map, survived_set) = (stack[0], stack[1]);
    assert_eq!(AloreMap::len(survived_map), 40);
    for i in 0..40i64 {
        assert_eq!(
            AloreMap::get(survived_map, Value::int(i), &default_hash, &default_eq).unwrap(),
            Value::int(-i)
        );
    }
    assert_eq!(AloreSet::len(survived_set), 40);
    for i in 0..40i64 {
        assert!(AloreSet::contains(
            survived_set,
            Value::int(i),
            &default_hash,
            &default_eq
        ));
    }
}

#[test]
fn map_get_returns_key_error_for_missing_key() {
    let heap = Heap::new();
    let m = AloreMap::new(&heap);
    let err = AloreMap::get(m, Value::int(1), &default_hash, &default_eq).unwrap_err();
    assert_eq!(err.kind, alore_rt::error::ExceptionKind::KeyError);
}

/// `spec.md` §8 scenario 2: `"ab" * 3 == "ababab"`, built by repeated
/// `concat` the way a naive `*` implementation would, narrow the whole way
/// since no operand ever introduces a wide code point.
#[test]
fn repeated_concat_matches_repeat() {
    let heap = Heap::new();
    let ab = AloreStr::from_str(&heap, "ab").unwrap();
    let mut acc = AloreStr::from_str(&heap, "").unwrap();
    for _ in 0..3 {
        acc = AloreStr::concat(&heap, acc, ab).unwrap();
    }
    let repeated = AloreStr::repeat(&heap, ab, 3).unwrap();
    assert_eq!(AloreStr::code_points(acc), AloreStr::code_points(repeated));
    assert_eq!(
        AloreStr::code_points(acc)
            .into_iter()
            .map(|cp| char::from_u32(cp).unwrap())
            .collect::<String>(),
        "ababab"
    );
}
