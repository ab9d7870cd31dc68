//! Law-style properties of views and inverted indexes.

use std::collections::BTreeSet;
use std::sync::Arc;

use proptest::prelude::*;
use strata_core::prelude::Scalar;
use strata_storage::{Column, InvertedIndex, Positions, Relation, Table, View};

fn table_from(keys: Vec<i32>) -> Arc<Table> {
    let labels: Vec<String> = keys.iter().map(|k| format!("row-{k}")).collect();
    Arc::new(
        Table::try_new(vec![
            Column::new("k", keys),
            Column::new("label", labels),
        ])
        .unwrap(),
    )
}

/// A table and a position list into it.
fn table_and_positions() -> impl Strategy<Value = (Vec<i32>, Vec<usize>)> {
    prop::collection::vec(-20i32..20, 1..60).prop_flat_map(|keys| {
        let n = keys.len();
        (Just(keys), prop::collection::vec(0..n, 0..80))
    })
}

proptest! {
    #[test]
    fn identity_view_answers_like_the_table(keys in prop::collection::vec(any::<i32>(), 0..50)) {
        let t = table_from(keys);
        let v = View::from_table(Arc::clone(&t));
        prop_assert_eq!(v.row_count(), t.row_count());
        prop_assert_eq!(v.column_count(), t.column_count());
        for c in 0..t.column_count() {
            prop_assert_eq!(v.column_name(c).unwrap(), t.column_name(c).unwrap());
            prop_assert_eq!(v.column_type(c).unwrap(), t.column_type(c).unwrap());
            for r in 0..t.row_count() {
                prop_assert_eq!(v.scalar(c, r).unwrap(), t.scalar(c, r).unwrap());
            }
        }
    }

    #[test]
    fn nested_views_equal_composed_positions(
        (keys, p1) in table_and_positions(),
        picks in prop::collection::vec(any::<prop::sample::Index>(), 0..40),
    ) {
        let t = table_from(keys);
        let inner = View::new(Arc::clone(&t), p1.clone());
        let p2: Vec<usize> = if p1.is_empty() {
            Vec::new()
        } else {
            picks.iter().map(|i| i.index(p1.len())).collect()
        };
        let nested = inner.over(p2.clone());
        let composed: Vec<usize> = p2.iter().map(|&i| p1[i]).collect();
        let direct = View::new(Arc::clone(&t), composed.clone());

        prop_assert_eq!(nested.part_count(), 1);
        prop_assert_eq!(nested.positions_of(0).unwrap().to_vec(), composed);
        prop_assert_eq!(nested.to_rows().unwrap(), direct.to_rows().unwrap());
        prop_assert_eq!(
            Positions::from(p1).compose(&Positions::from(p2)),
            direct.positions_of(0).unwrap().clone()
        );
    }

    #[test]
    fn buckets_partition_all_rows(keys in prop::collection::vec(-10i32..10, 0..100)) {
        let t = table_from(keys.clone());
        let idx = InvertedIndex::<i32>::build(&*t, 0).unwrap();
        let mut seen = vec![0usize; keys.len()];
        for (key, bucket) in idx.buckets() {
            prop_assert!(bucket.windows(2).all(|w| w[0] < w[1]));
            for &p in bucket {
                prop_assert_eq!(keys[p], *key);
                seen[p] += 1;
            }
        }
        prop_assert!(seen.iter().all(|&n| n == 1));
        prop_assert_eq!(idx.row_count(), keys.len());
    }

    #[test]
    fn ranges_split_the_rows(keys in prop::collection::vec(-10i32..10, 0..100), k in -12i32..12) {
        let t = table_from(keys.clone());
        let idx = InvertedIndex::<i32>::build(&*t, 0).unwrap();

        let less = idx.lookup_less(&k);
        let equal = idx.lookup_equal(&k).to_vec();
        let greater = idx.lookup_greater(&k);
        for r in [&less, &greater, &idx.lookup_less_or_equal(&k), &idx.lookup_greater_or_equal(&k)] {
            prop_assert!(r.windows(2).all(|w| w[0] < w[1]));
        }

        let all: BTreeSet<usize> = less.iter().chain(&equal).chain(&greater).copied().collect();
        prop_assert_eq!(all.len(), less.len() + equal.len() + greater.len());
        prop_assert_eq!(all, (0..keys.len()).collect::<BTreeSet<_>>());

        let mut le: Vec<usize> = less.iter().chain(&equal).copied().collect();
        le.sort_unstable();
        prop_assert_eq!(le, idx.lookup_less_or_equal(&k));
        let mut ge: Vec<usize> = greater.iter().chain(&equal).copied().collect();
        ge.sort_unstable();
        prop_assert_eq!(ge, idx.lookup_greater_or_equal(&k));

        let expected: Vec<usize> = (0..keys.len()).filter(|&i| keys[i] >= k && keys[i] <= k + 3).collect();
        prop_assert_eq!(idx.lookup_between(&k, &(k + 3)), expected);
    }
}

#[test]
fn views_read_scalars_through_positions() {
    let t = table_from(vec![7, 8, 9]);
    let v = View::new(t, vec![2, 2, 0]);
    assert_eq!(
        v.to_rows().unwrap(),
        vec![
            vec![Scalar::I32(9), Scalar::Str("row-9".into())],
            vec![Scalar::I32(9), Scalar::Str("row-9".into())],
            vec![Scalar::I32(7), Scalar::Str("row-7".into())],
        ]
    );
}

#[test]
fn empty_table_index_is_empty_for_every_probe() {
    let t = table_from(Vec::new());
    let idx = InvertedIndex::<i32>::build(&*t, 0).unwrap();
    assert!(idx.is_empty());
    for k in [i32::MIN, 0, i32::MAX] {
        assert!(idx.lookup_equal(&k).is_empty());
        assert!(idx.lookup_less(&k).is_empty());
        assert!(idx.lookup_less_or_equal(&k).is_empty());
        assert!(idx.lookup_greater(&k).is_empty());
        assert!(idx.lookup_greater_or_equal(&k).is_empty());
        assert!(idx.lookup_between(&i32::MIN, &k).is_empty());
    }
}
