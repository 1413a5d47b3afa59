//! Sort: in-place quicksort on a copied Array
//!
//! `spec.md` §4.5: "quicksort in place on a copied Array, optionally with a
//! user comparator `(a, b) -> Bool`." `original_source/src/std_sort.c`'s
//! quicksort is unstable (SPEC_FULL.md §C); we keep that and test only the
//! properties `spec.md` §8 actually asks for — the result is a permutation
//! of the input, monotone with respect to the comparator — not stability.
//!
//! The comparator is injected the same way `stdlib::map`'s hash/eq are: a
//! closure returning `VmResult<bool>`, so a user `(a, b) -> Bool` function
//! can fail mid-sort (raising through the interpreter) without this module
//! depending on `types::dispatch` or `interp::calling` directly.

use crate::error::VmResult;
use alore_core::Value;

pub struct AloreSort;

impl AloreSort {
    /// Sort `values` in place using `less_than(a, b)` as the strict
    /// ordering predicate (defaults to `<=` at the call site per
    /// `spec.md` §4.5 when no comparator is supplied). Returns as soon as
    /// `less_than` raises, leaving `values` partially reordered — matching
    /// the "may either raise directly or propagate" policy of §7 for
    /// C-implemented methods that call back into interpreted code.
    pub fn sort(values: &mut [Value], less_than: &mut dyn FnMut(Value, Value) -> VmResult<bool>) -> VmResult<()> {
        if values.len() > 1 {
            Self::quicksort(values, less_than)?;
        }
        Ok(())
    }

    fn quicksort(values: &mut [Value], less_than: &mut dyn FnMut(Value, Value) -> VmResult<bool>) -> VmResult<()> {
        let len = values.len();
        if len <= 1 {
            return Ok(());
        }
        let pivot_index = len / 2;
        values.swap(pivot_index, len - 1);
        let pivot = values[len - 1];

        let mut store = 0;
        for i in 0..len - 1 {
            if less_than(values[i], pivot)? {
                values.swap(i, store);
                store += 1;
            }
        }
        values.swap(store, len - 1);

        let (left, right) = values.split_at_mut(store);
        Self::quicksort(left, less_than)?;
        Self::quicksort(&mut right[1..], less_than)
    }
}
