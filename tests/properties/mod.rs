//! Randomized directory and isolation properties

use std::collections::{HashMap, HashSet};

use proptest::collection::{hash_map, hash_set};
use proptest::prelude::*;
use snapstore::Store;

use crate::common::{field0, put_u64};

// Keys are effectively 63-bit: the directory reserves the low bit of
// the shifted key, so stay below 2^62 to keep a margin.
const KEY_RANGE: std::ops::Range<u64> = 0..(1u64 << 62);

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn every_inserted_key_is_found(
        keys in hash_set(KEY_RANGE, 1..400usize),
    ) {
        let mut store = Store::create("u").unwrap();
        let field = field0(&store);
        let mut txn = store.write().unwrap();
        for &key in &keys {
            put_u64(&mut txn, field, key, key ^ 0xABCD);
        }
        txn.commit().unwrap();

        let view = store.read(store.snapshot());
        prop_assert_eq!(view.len(), keys.len() as u64);
        for &key in &keys {
            prop_assert!(view.find(key));
            prop_assert_eq!(view.get(&view.object(key).unwrap(), field), key ^ 0xABCD);
        }
        for probe in [0u64, 1, 2, 12_345, (1 << 62) - 1] {
            if !keys.contains(&probe) {
                prop_assert!(!view.find(probe));
            }
        }
        // Iteration yields exactly the inserted key set, once each.
        let mut seen = HashSet::new();
        for (key, _) in view.rows() {
            prop_assert!(seen.insert(key), "key {} yielded twice", key);
        }
        prop_assert_eq!(seen, keys);
    }

    #[test]
    fn snapshots_are_isolated_from_later_writes(
        first in hash_map(KEY_RANGE, 0u64..1000, 1..100usize),
        second in hash_map(KEY_RANGE, 1000u64..2000, 1..100usize),
    ) {
        let mut store = Store::create("u").unwrap();
        let field = field0(&store);

        let mut txn = store.write().unwrap();
        for (&key, &value) in &first {
            put_u64(&mut txn, field, key, value);
        }
        let old_snapshot = txn.commit().unwrap();

        let mut txn = store.write().unwrap();
        for (&key, &value) in &second {
            put_u64(&mut txn, field, key, value);
        }
        txn.commit().unwrap();

        // The old snapshot reads exactly the first batch.
        let old = store.read(old_snapshot);
        prop_assert_eq!(old.len(), first.len() as u64);
        for (&key, &value) in &first {
            prop_assert_eq!(old.get(&old.object(key).unwrap(), field), value);
        }
        for &key in second.keys() {
            if !first.contains_key(&key) {
                prop_assert!(!old.find(key));
            }
        }

        // The new image is the overwrite-merge of both batches.
        let mut expected: HashMap<u64, u64> = first.clone();
        expected.extend(&second);
        let new = store.read(store.snapshot());
        prop_assert_eq!(new.len(), expected.len() as u64);
        for (&key, &value) in &expected {
            prop_assert_eq!(new.get(&new.object(key).unwrap(), field), value);
        }
    }
}
