//! Multi-key stable sorting of query results.
//!
//! For each key in turn, number pairs compare numerically and string pairs compare
//! under ICU root collation. Any other pairing, including a missing field, compares
//! equal for that key and falls through to the next one. The sort is stable, so
//! records that tie on every key keep their store order.

use std::{cmp::Ordering, sync::LazyLock};

use bson::Bson;
use icu_collator::options::CollatorOptions;
use icu_collator::{Collator, CollatorBorrowed, CollatorPreferences};
use log::warn;

use docsync_core::{
    query::{Sort, SortDirection},
    record::Record,
};

use crate::evaluator::Number;

static COLLATOR: LazyLock<Option<CollatorBorrowed<'static>>> = LazyLock::new(|| {
    Collator::try_new(CollatorPreferences::default(), CollatorOptions::default())
        .inspect_err(|err| warn!("failed to create collator, falling back to code point order: {err:?}"))
        .ok()
});

/// Sorts records by `order_by`, returning a new sequence.
///
/// An empty `order_by` returns the input order unchanged.
pub(crate) fn sort_records<'a>(records: Vec<&'a Record>, order_by: &[Sort]) -> Vec<&'a Record> {
    if order_by.is_empty() || records.len() < 2 {
        return records;
    }

    let collator = COLLATOR.as_ref();
    merge_sort(records, |a, b| {
        order_by
            .iter()
            .map(|sort| {
                let ordering = compare_field(
                    a.get(&sort.field).as_deref(),
                    b.get(&sort.field).as_deref(),
                    collator,
                );
                match sort.direction {
                    SortDirection::Asc => ordering,
                    SortDirection::Desc => ordering.reverse(),
                }
            })
            .find(|ordering| ordering.is_ne())
            .unwrap_or(Ordering::Equal)
    })
}

/// Bottom-up stable merge sort.
///
/// Ties on mixed types make `compare` non-transitive, which `slice::sort_by` may
/// reject with a panic. This merge only ever asks whether the right element is
/// strictly less than the left one, so any comparator yields a permutation of the
/// input and equal elements keep their relative order.
fn merge_sort<T: Copy>(items: Vec<T>, mut compare: impl FnMut(&T, &T) -> Ordering) -> Vec<T> {
    let len = items.len();
    let mut source = items;
    let mut merged = Vec::with_capacity(len);
    let mut width = 1;

    while width < len {
        merged.clear();
        let mut start = 0;
        while start < len {
            let middle = (start + width).min(len);
            let end = (start + 2 * width).min(len);
            let (mut left, mut right) = (start, middle);

            while left < middle && right < end {
                if compare(&source[right], &source[left]).is_lt() {
                    merged.push(source[right]);
                    right += 1;
                } else {
                    merged.push(source[left]);
                    left += 1;
                }
            }
            merged.extend_from_slice(&source[left..middle]);
            merged.extend_from_slice(&source[right..end]);
            start = end;
        }

        std::mem::swap(&mut source, &mut merged);
        width *= 2;
    }

    source
}

fn compare_field(a: Option<&Bson>, b: Option<&Bson>, collator: Option<&CollatorBorrowed<'static>>) -> Ordering {
    match (a, b) {
        (Some(Bson::String(a)), Some(Bson::String(b))) => match collator {
            Some(collator) => collator.compare(a, b),
            None => a.cmp(b),
        },
        (Some(a), Some(b)) => match (Number::of(a), Number::of(b)) {
            (Some(a), Some(b)) => a.compare(b).unwrap_or(Ordering::Equal),
            _ => Ordering::Equal,
        },
        _ => Ordering::Equal,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bson::doc;

    fn records(rows: Vec<(&str, bson::Document)>) -> Vec<Record> {
        rows.into_iter()
            .map(|(id, fields)| Record::new(id, 0, 0, fields))
            .collect()
    }

    fn sorted_ids(records: &[Record], order_by: &[Sort]) -> Vec<String> {
        sort_records(records.iter().collect(), order_by)
            .into_iter()
            .map(|record| record.id().to_string())
            .collect()
    }

    #[test]
    fn test_numbers_sort_numerically() {
        let sorted = sorted_ids(
            &records(vec![
                ("a", doc! { "n": 10 }),
                ("b", doc! { "n": 2.5 }),
                ("c", doc! { "n": -1_i64 }),
            ]),
            &[Sort::asc("n")],
        );
        assert_eq!(sorted, vec!["c", "b", "a"]);
    }

    #[test]
    fn test_multi_key_sort() {
        let sorted = sorted_ids(
            &records(vec![
                ("a", doc! { "city": "Oslo", "age": 30 }),
                ("b", doc! { "city": "Bergen", "age": 30 }),
                ("c", doc! { "city": "Oslo", "age": 22 }),
                ("d", doc! { "city": "Bergen", "age": 41 }),
            ]),
            &[Sort::asc("city"), Sort::desc("age")],
        );
        assert_eq!(sorted, vec!["d", "b", "a", "c"]);
    }

    #[test]
    fn test_strings_use_collation() {
        let sorted = sorted_ids(
            &records(vec![
                ("a", doc! { "name": "banana" }),
                ("b", doc! { "name": "Apple" }),
                ("c", doc! { "name": "apple" }),
            ]),
            &[Sort::asc("name")],
        );
        // Root collation puts lowercase before uppercase on a tertiary difference.
        assert_eq!(sorted, vec!["c", "b", "a"]);
    }

    #[test]
    fn test_mixed_and_missing_values_tie() {
        let sorted = sorted_ids(
            &records(vec![
                ("a", doc! { "v": "x" }),
                ("b", doc! { "v": 1 }),
                ("c", doc! {}),
                ("d", doc! { "v": true }),
            ]),
            &[Sort::desc("v")],
        );
        assert_eq!(sorted, vec!["a", "b", "c", "d"]);
    }

    #[test]
    fn test_mixed_types_at_scale() {
        let rows = (0..400)
            .map(|n| {
                let value = match n % 3 {
                    0 => Bson::Int32((n * 7919) % 101),
                    1 => Bson::String(format!("s{}", (n * 31) % 17)),
                    _ => Bson::Boolean(n % 2 == 0),
                };
                (format!("r{n}"), doc! { "v": value })
            })
            .collect::<Vec<_>>();
        let records = rows
            .iter()
            .map(|(id, fields)| Record::new(id.as_str(), 0, 0, fields.clone()))
            .collect::<Vec<_>>();

        for order_by in [[Sort::asc("v")], [Sort::desc("v")]] {
            let mut ids = sorted_ids(&records, &order_by);
            assert_eq!(ids.len(), records.len());
            ids.sort();
            ids.dedup();
            assert_eq!(ids.len(), records.len());
        }
    }

    #[test]
    fn test_merge_sort_is_stable() {
        let items = vec![(3, 'a'), (1, 'b'), (3, 'c'), (2, 'd'), (1, 'e'), (2, 'f'), (3, 'g')];
        let sorted = merge_sort(items, |a, b| a.0.cmp(&b.0));
        assert_eq!(sorted, vec![(1, 'b'), (1, 'e'), (2, 'd'), (2, 'f'), (3, 'a'), (3, 'c'), (3, 'g')]);
    }

    #[test]
    fn test_large_integers_sort_exactly() {
        let sorted = sorted_ids(
            &records(vec![
                ("a", doc! { "n": 9_007_199_254_740_993_i64 }),
                ("b", doc! { "n": 9_007_199_254_740_992_i64 }),
            ]),
            &[Sort::asc("n")],
        );
        assert_eq!(sorted, vec!["b", "a"]);
    }

    #[test]
    fn test_empty_order_keeps_input() {
        let sorted = sorted_ids(&records(vec![("b", doc! {}), ("a", doc! {})]), &[]);
        assert_eq!(sorted, vec!["b", "a"]);
    }
}
