use std::collections::BTreeMap;
use std::collections::BTreeSet;

use freeze_hash::CollectionError;
use freeze_hash::HashMapBuilder;
use freeze_hash::HashSetBuilder;
use freeze_hash::ImmutableHashMap;
use freeze_hash::ImmutableHashSet;
use freeze_hash::ImmutableList;
use proptest::prelude::*;

fn permuted(items: Vec<u16>, seed: u64) -> Vec<u16> {
    let mut items = items;
    // Fisher-Yates driven by a small LCG so proptest controls the order.
    let mut state = seed | 1;
    for i in (1..items.len()).rev() {
        state = state
            .wrapping_mul(6364136223846793005)
            .wrapping_add(1442695040888963407);
        let j = (state >> 33) as usize % (i + 1);
        items.swap(i, j);
    }
    items
}

proptest! {
    #[test]
    fn prop_set_hash_ignores_order(items in proptest::collection::vec(0u16..500, 0..200), seed in any::<u64>()) {
        let forward: ImmutableHashSet<u16> = items.iter().copied().collect();
        let shuffled: ImmutableHashSet<u16> = permuted(items.clone(), seed).into_iter().collect();

        prop_assert_eq!(&forward, &shuffled);
        prop_assert_eq!(forward.structural_hash(), shuffled.structural_hash());
    }

    #[test]
    fn prop_map_hash_ignores_order(items in proptest::collection::btree_map(0u16..500, any::<u8>(), 0..100), seed in any::<u64>()) {
        let keys: Vec<u16> = items.keys().copied().collect();
        let forward: ImmutableHashMap<u16, u8> = items.iter().map(|(k, v)| (*k, *v)).collect();
        let shuffled: ImmutableHashMap<u16, u8> = permuted(keys, seed)
            .into_iter()
            .map(|k| (k, items[&k]))
            .collect();

        prop_assert_eq!(&forward, &shuffled);
        prop_assert_eq!(forward.structural_hash(), shuffled.structural_hash());
    }

    #[test]
    fn prop_list_equality_follows_order(items in proptest::collection::vec(any::<u8>(), 0..50), seed in any::<u64>()) {
        let shuffled_items: Vec<u8> = {
            let widened: Vec<u16> = items.iter().map(|&b| u16::from(b)).collect();
            permuted(widened, seed).into_iter().map(|w| w as u8).collect()
        };
        let forward: ImmutableList<u8> = items.iter().copied().collect();
        let shuffled: ImmutableList<u8> = shuffled_items.iter().copied().collect();

        prop_assert_eq!(forward == shuffled, items == shuffled_items);
    }

    // Every published snapshot must keep the contents it had at build time,
    // whatever the builder does afterwards.
    #[test]
    fn prop_snapshots_are_isolated(ops in proptest::collection::vec((0u8..=3u8, 0u16..64), 1..200)) {
        let mut builder: HashSetBuilder<u16> = HashSetBuilder::new();
        let mut model: BTreeSet<u16> = BTreeSet::new();
        let mut snapshots: Vec<(ImmutableHashSet<u16>, BTreeSet<u16>)> = Vec::new();

        for (op, key) in ops {
            match op {
                0 => {
                    prop_assert_eq!(builder.insert(key).unwrap(), model.insert(key));
                }
                1 => {
                    prop_assert_eq!(builder.remove(&key).unwrap(), model.remove(&key));
                }
                2 => {
                    snapshots.push((builder.build().unwrap(), model.clone()));
                }
                3 => {
                    if key % 16 == 0 {
                        builder.clear().unwrap();
                        model.clear();
                    } else {
                        builder.trim_to_len().unwrap();
                    }
                }
                _ => unreachable!(),
            }
            prop_assert_eq!(builder.len(), model.len());
        }

        for (value, expected) in &snapshots {
            let actual: BTreeSet<u16> = value.iter().copied().collect();
            prop_assert_eq!(&actual, expected);
        }
    }

    #[test]
    fn prop_map_workload_matches_model(ops in proptest::collection::vec((0u8..=4u8, 0u16..128, any::<u32>()), 1..300)) {
        let mut builder: HashMapBuilder<u16, u32> = HashMapBuilder::new();
        let mut model: BTreeMap<u16, u32> = BTreeMap::new();

        for (op, key, value) in ops {
            match op {
                0 => {
                    prop_assert_eq!(builder.insert(key, value).unwrap(), model.insert(key, value));
                }
                1 => {
                    let expected = if model.contains_key(&key) {
                        Err(CollectionError::DuplicateKey)
                    } else {
                        model.insert(key, value);
                        Ok(())
                    };
                    prop_assert_eq!(builder.try_add(key, value), expected);
                }
                2 => {
                    prop_assert_eq!(builder.remove(&key).unwrap(), model.remove(&key));
                }
                3 => {
                    if let Some(slot) = builder.get_mut(&key).unwrap() {
                        *slot = value;
                        model.insert(key, value);
                    }
                }
                4 => {
                    let snapshot = builder.build().unwrap();
                    prop_assert_eq!(snapshot.len(), model.len());
                }
                _ => unreachable!(),
            }
        }

        let built = builder.build().unwrap();
        prop_assert_eq!(built.len(), model.len());
        for (key, value) in &model {
            prop_assert_eq!(built.get(key), Some(value));
        }
    }

    #[test]
    fn prop_set_algebra_matches_btreeset(
        left in proptest::collection::btree_set(0u16..100, 0..60),
        right in proptest::collection::vec(0u16..100, 0..60),
    ) {
        let value: ImmutableHashSet<u16> = left.iter().copied().collect();
        let right_set: BTreeSet<u16> = right.iter().copied().collect();

        let union: BTreeSet<u16> = value.union(&right).unwrap().iter().copied().collect();
        let intersect: BTreeSet<u16> = value.intersect(&right).unwrap().iter().copied().collect();
        let except: BTreeSet<u16> = value.except(&right).unwrap().iter().copied().collect();
        let symmetric: BTreeSet<u16> = value.symmetric_except(&right).unwrap().iter().copied().collect();

        prop_assert_eq!(union, left.union(&right_set).copied().collect::<BTreeSet<_>>());
        prop_assert_eq!(intersect, left.intersection(&right_set).copied().collect::<BTreeSet<_>>());
        prop_assert_eq!(except, left.difference(&right_set).copied().collect::<BTreeSet<_>>());
        prop_assert_eq!(symmetric, left.symmetric_difference(&right_set).copied().collect::<BTreeSet<_>>());

        prop_assert_eq!(value.is_subset_of(&right), left.is_subset(&right_set));
        prop_assert_eq!(value.is_superset_of(&right), left.is_superset(&right_set));
        prop_assert_eq!(value.overlaps(&right), !left.is_disjoint(&right_set));
        prop_assert_eq!(value.set_equals(&right), left == right_set);
        prop_assert_eq!(
            value.is_proper_subset_of(&right),
            left.is_subset(&right_set) && left.len() < right_set.len()
        );
        prop_assert_eq!(
            value.is_proper_superset_of(&right),
            left.is_superset(&right_set) && left.len() > right_set.len()
        );

        // The hashed fast path must agree with the sequence path.
        let hashed: ImmutableHashSet<u16> = right.iter().copied().collect();
        prop_assert_eq!(value.union(&hashed).unwrap(), value.union(&right).unwrap());
        prop_assert_eq!(value.intersect(&hashed).unwrap(), value.intersect(&right).unwrap());
        prop_assert_eq!(value.symmetric_except(&hashed).unwrap(), value.symmetric_except(&right).unwrap());
        prop_assert_eq!(value.is_proper_subset_of(&hashed), value.is_proper_subset_of(&right));
    }

    #[test]
    fn prop_capacity_controls(len in 0usize..200, grow in 0usize..2000, trim in 0usize..400) {
        let mut builder: HashSetBuilder<usize> = (0..len).collect();
        let before = builder.capacity();
        let grown = builder.ensure_capacity(grow).unwrap();
        prop_assert!(grown >= grow);
        prop_assert!(grown >= before);
        prop_assert_eq!(grown, builder.capacity());

        let result = builder.trim_excess(trim);
        if trim < len {
            let is_out_of_range = matches!(result, Err(CollectionError::ArgumentOutOfRange { .. }));
            prop_assert!(is_out_of_range);
            prop_assert_eq!(builder.capacity(), grown);
        } else {
            // Trimming never grows the storage.
            prop_assert!(result.is_ok());
            prop_assert!(builder.capacity() <= grown);
            if trim <= grown {
                prop_assert!(builder.capacity() >= trim);
            }
        }
        prop_assert_eq!(builder.len(), len);
    }
}
