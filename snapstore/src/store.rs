//! Snapshot and transaction glue over a single table
//!
//! The store owns the allocator and the published root. Readers take
//! copyable [`Snapshot`] tokens and see the immutable image those roots
//! name, forever. The one writer at a time (enforced by the `&mut`
//! borrow) works against a cowed copy and publishes atomically on
//! commit: the root either swings to the fully committed new image or
//! stays where it was.

use log::debug;
use snapstore_api::Result;
use snapstore_memory::{Memory, MemoryStats, Ref};

use crate::object::{Field, FieldValue, Object};
use crate::schema::Schema;
use crate::table::{Rows, Table};

/// A table store with one published root.
pub struct Store {
    mem: Memory,
    root: Ref,
}

impl Store {
    /// Creates a store for the given schema and publishes its initial
    /// empty image.
    pub fn create(typeinfo: &str) -> Result<Store> {
        let mut mem = Memory::new();
        let table = Table::create(&mut mem, typeinfo)?;
        mem.begin_commit();
        let table = match Table::commit(&mut mem, table) {
            Ok(table) => table,
            Err(e) => {
                mem.abort_commit();
                return Err(e);
            }
        };
        mem.end_commit();
        Ok(Store {
            mem,
            root: table.to_ref(),
        })
    }

    /// Takes a snapshot of the current published image.
    pub fn snapshot(&self) -> Snapshot {
        Snapshot {
            root: self.root,
            version: self.mem.version(),
        }
    }

    /// Opens a read view over a snapshot. Snapshots taken at earlier
    /// versions keep reading their own image.
    pub fn read(&self, snapshot: Snapshot) -> ReadView<'_> {
        ReadView {
            mem: &self.mem,
            table: Table::from_ref(snapshot.root),
        }
    }

    /// Begins the write transaction, cowing the table block into the
    /// working set. Any abandoned previous working set is reclaimed
    /// here.
    pub fn write(&mut self) -> Result<WriteTxn<'_>> {
        self.mem.discard();
        let table = Table::cow(&mut self.mem, Table::from_ref(self.root))?;
        Ok(WriteTxn { store: self, table })
    }

    /// Allocator statistics for the backing memory.
    pub fn memory_stats(&self) -> MemoryStats {
        self.mem.stats()
    }
}

/// A consistent view of the store: one root ref plus the commit version
/// that published it. Copy it around freely; it stays valid for the
/// life of the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Snapshot {
    root: Ref,
    version: u64,
}

impl Snapshot {
    /// The commit version that published this snapshot's image.
    pub fn version(&self) -> u64 {
        self.version
    }
}

/// Read access to one snapshot's image.
pub struct ReadView<'a> {
    mem: &'a Memory,
    table: Table,
}

impl ReadView<'_> {
    /// The table's schema.
    pub fn schema(&self) -> Schema {
        self.table.schema(self.mem)
    }

    /// Number of rows in this image.
    pub fn len(&self) -> u64 {
        self.table.len(self.mem)
    }

    /// True when this image holds no rows.
    pub fn is_empty(&self) -> bool {
        self.table.is_empty(self.mem)
    }

    /// Existence check.
    pub fn find(&self, key: u64) -> bool {
        self.table.find(self.mem, key)
    }

    /// Resolves `key` to a read cursor.
    pub fn object(&self, key: u64) -> Result<Object> {
        self.table.get_cluster(self.mem, key)
    }

    /// Reads a field of a row. Refs in a committed image are stable,
    /// so the cursor needs no re-resolution here.
    pub fn get<T: FieldValue>(&self, obj: &Object, field: Field<T>) -> T {
        obj.get(self.mem, field)
    }

    /// Iterates the rows of this image.
    pub fn rows(&self) -> Rows<'_> {
        self.table.rows(self.mem)
    }
}

/// The single write transaction.
///
/// Mutations are visible to the transaction itself immediately and to
/// nobody else until [`WriteTxn::commit`] publishes them.
pub struct WriteTxn<'a> {
    store: &'a mut Store,
    table: Table,
}

impl WriteTxn<'_> {
    /// The table's schema.
    pub fn schema(&self) -> Schema {
        self.table.schema(&self.store.mem)
    }

    /// Number of rows in the working set.
    pub fn len(&self) -> u64 {
        self.table.len(&self.store.mem)
    }

    /// True when the working set holds no rows.
    pub fn is_empty(&self) -> bool {
        self.table.is_empty(&self.store.mem)
    }

    /// Inserts an all-zero row under `key`, overwriting any existing
    /// row with that key.
    pub fn insert(&mut self, key: u64) -> Result<()> {
        self.table.insert(&mut self.store.mem, key)
    }

    /// Existence check against the working set.
    pub fn find(&self, key: u64) -> bool {
        self.table.find(&self.store.mem, key)
    }

    /// Resolves `key` to a read cursor.
    pub fn object(&self, key: u64) -> Result<Object> {
        self.table.get_cluster(&self.store.mem, key)
    }

    /// Resolves `key` to a writable cursor, cowing its path.
    pub fn object_mut(&mut self, key: u64) -> Result<Object> {
        self.table.change_cluster(&mut self.store.mem, key)
    }

    /// Reads a field of a row.
    ///
    /// The cursor is re-resolved by key first: structural edits since
    /// it was minted (a cow, a directory grow) may have relocated the
    /// row's cluster, and cached refs must not be trusted across them.
    pub fn get<T: FieldValue>(&self, obj: &Object, field: Field<T>) -> T {
        let fresh = match self.table.get_cluster(&self.store.mem, obj.key()) {
            Ok(fresh) => fresh,
            Err(_) => panic!("stale object cursor: key vanished from the table"),
        };
        fresh.get(&self.store.mem, field)
    }

    /// Writes a field of a row.
    ///
    /// This is the change contract: the row's path is cowed (again, if
    /// necessary) and the cursor rebound to the same logical row before
    /// the store goes through, so the caller's cursor stays valid even
    /// when the cluster had to move.
    pub fn set<T: FieldValue>(
        &mut self,
        obj: &mut Object,
        field: Field<T>,
        value: T,
    ) -> Result<()> {
        *obj = self.table.change_cluster(&mut self.store.mem, obj.key())?;
        obj.set(&mut self.store.mem, field, value)
    }

    /// Iterates the rows of the working set.
    pub fn rows(&self) -> Rows<'_> {
        self.table.rows(&self.store.mem)
    }

    /// Materializes the working set as the new immutable image and
    /// publishes it. On failure the old image remains authoritative and
    /// the transaction is rolled back.
    pub fn commit(self) -> Result<Snapshot> {
        let store = self.store;
        store.mem.begin_commit();
        match Table::commit(&mut store.mem, self.table) {
            Ok(table) => {
                store.mem.end_commit();
                store.root = table.to_ref();
                debug!("published root {:?} at version {}", store.root, store.mem.version());
                Ok(store.snapshot())
            }
            Err(e) => {
                store.mem.abort_commit();
                Err(e)
            }
        }
    }

    /// Abandons the transaction; the working set is reclaimed and the
    /// published image is untouched.
    pub fn rollback(self) {
        self.store.mem.discard();
    }
}
