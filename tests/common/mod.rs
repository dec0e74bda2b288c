//! Shared helpers for the scenario tests

use snapstore::{Field, Store, WriteTxn};

/// Creates a `"u"`-schema store holding one row per `(key, value)`
/// pair, committed.
pub fn u64_store(pairs: &[(u64, u64)]) -> Store {
    let mut store = Store::create("u").unwrap();
    let field = field0(&store);
    let mut txn = store.write().unwrap();
    for &(key, value) in pairs {
        put_u64(&mut txn, field, key, value);
    }
    txn.commit().unwrap();
    store
}

/// The single u64 field of a `"u"`-schema store.
pub fn field0(store: &Store) -> Field<u64> {
    store.read(store.snapshot()).schema().field::<u64>(0)
}

/// Inserts `key` and sets its single field to `value`.
pub fn put_u64(txn: &mut WriteTxn<'_>, field: Field<u64>, key: u64, value: u64) {
    txn.insert(key).unwrap();
    let mut obj = txn.object_mut(key).unwrap();
    txn.set(&mut obj, field, value).unwrap();
}

/// Reads the single u64 field of `key` through a fresh snapshot.
pub fn get_u64(store: &Store, field: Field<u64>, key: u64) -> Option<u64> {
    let view = store.read(store.snapshot());
    view.object(key).ok().map(|obj| view.get(&obj, field))
}
