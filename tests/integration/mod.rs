//! End-to-end store scenarios

use snapstore::{Error, Store};

use crate::common::{field0, get_u64, put_u64, u64_store};

#[test]
fn round_trip_u64() {
    let mut store = Store::create("u").unwrap();
    let field = field0(&store);

    let mut txn = store.write().unwrap();
    txn.insert(0x100).unwrap();
    let mut obj = txn.object_mut(0x100).unwrap();
    txn.set(&mut obj, field, 42).unwrap();
    txn.commit().unwrap();

    let view = store.read(store.snapshot());
    assert!(view.find(0x100));
    assert_eq!(view.get(&view.object(0x100).unwrap(), field), 42);
}

#[test]
fn mixed_schema() {
    let mut store = Store::create("uifd").unwrap();
    let schema = store.read(store.snapshot()).schema();
    let (c0, c1, c2, c3) = (
        schema.field::<u64>(0),
        schema.field::<i64>(1),
        schema.field::<f32>(2),
        schema.field::<f64>(3),
    );

    let mut txn = store.write().unwrap();
    txn.insert(7).unwrap();
    let mut obj = txn.object_mut(7).unwrap();
    txn.set(&mut obj, c0, 1).unwrap();
    txn.set(&mut obj, c1, -2).unwrap();
    txn.set(&mut obj, c2, 3.5).unwrap();
    txn.set(&mut obj, c3, 4.25).unwrap();
    txn.commit().unwrap();

    let view = store.read(store.snapshot());
    let obj = view.object(7).unwrap();
    assert_eq!(view.get(&obj, c0), 1);
    assert_eq!(view.get(&obj, c1), -2);
    assert_eq!(view.get(&obj, c2), 3.5);
    assert_eq!(view.get(&obj, c3), 4.25);
}

#[test]
fn not_found_leaves_the_directory_unchanged() {
    let store = Store::create("u").unwrap();
    let view = store.read(store.snapshot());
    assert!(!view.find(99));
    assert_eq!(view.object(99).unwrap_err(), Error::NotFound);
    assert_eq!(view.len(), 0);
    assert!(view.rows().next().is_none());
}

#[test]
fn snapshot_isolation() {
    let mut store = Store::create("u").unwrap();
    let field = field0(&store);
    let s1 = store.snapshot();

    let mut txn = store.write().unwrap();
    put_u64(&mut txn, field, 1, 10);
    let s2 = txn.commit().unwrap();

    // The old snapshot still reads the old image.
    let r1 = store.read(s1);
    assert!(!r1.find(1));
    assert_eq!(r1.len(), 0);

    // A reader at the new root sees the write.
    let r2 = store.read(s2);
    assert!(r2.find(1));
    assert_eq!(r2.get(&r2.object(1).unwrap(), field), 10);
    assert!(s2.version() > s1.version());
}

#[test]
fn overwrite_preserves_intermediate_snapshots() {
    let mut store = u64_store(&[(5, 100)]);
    let field = field0(&store);
    let intermediate = store.snapshot();

    let mut txn = store.write().unwrap();
    let mut obj = txn.object_mut(5).unwrap();
    txn.set(&mut obj, field, 200).unwrap();
    txn.commit().unwrap();

    assert_eq!(get_u64(&store, field, 5), Some(200));
    let old = store.read(intermediate);
    assert_eq!(old.get(&old.object(5).unwrap(), field), 100);
}

#[test]
fn bulk_insert_iteration() {
    let store = u64_store(&[(1, 1), (3, 3), (5, 5), (7, 7), (9, 9)]);
    let view = store.read(store.snapshot());

    let mut keys: Vec<u64> = view.rows().map(|(key, _)| key).collect();
    keys.sort_unstable();
    assert_eq!(keys, [1, 3, 5, 7, 9]);
    assert_eq!(view.len(), 5);
}

#[test]
fn reinsert_resets_the_row() {
    let mut store = u64_store(&[(4, 44)]);
    let field = field0(&store);

    // A duplicate insert overwrites: the row comes back all-zero.
    let mut txn = store.write().unwrap();
    txn.insert(4).unwrap();
    txn.commit().unwrap();
    assert_eq!(get_u64(&store, field, 4), Some(0));

    let view = store.read(store.snapshot());
    assert_eq!(view.len(), 1);
}

#[test]
fn writer_sees_its_own_writes_before_commit() {
    let mut store = Store::create("u").unwrap();
    let field = field0(&store);

    let mut txn = store.write().unwrap();
    put_u64(&mut txn, field, 6, 60);
    assert!(txn.find(6));
    let obj = txn.object(6).unwrap();
    assert_eq!(txn.get(&obj, field), 60);
    txn.rollback();

    assert_eq!(get_u64(&store, field, 6), None);
}

#[test]
fn commits_survive_heavy_growth() {
    let mut store = Store::create("u").unwrap();
    let field = field0(&store);

    // Three commits, each adding enough rows to force directory growth.
    for round in 0..3u64 {
        let mut txn = store.write().unwrap();
        for i in 0..300u64 {
            let key = round * 1000 + i;
            put_u64(&mut txn, field, key, key + 1);
        }
        txn.commit().unwrap();
    }

    let view = store.read(store.snapshot());
    assert_eq!(view.len(), 900);
    for round in 0..3u64 {
        for i in (0..300u64).step_by(17) {
            let key = round * 1000 + i;
            assert_eq!(get_u64(&store, field, key), Some(key + 1));
        }
    }
    // Nothing mutable is reachable after a commit.
    assert_eq!(store.memory_stats().live_blocks, 0);
    assert_eq!(store.memory_stats().slab_bytes, 0);
}
