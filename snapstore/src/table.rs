//! Table blocks
//!
//! A table is one block: the field count, the schema tag bytes, and the
//! embedded directory header. Everything else hangs off the directory.

use snapstore_api::{Error, Result, MAX_FIELDS};
use snapstore_memory::{Memory, Ref};

use crate::cluster::ClusterMgr;
use crate::cuckoo::{Cuckoo, Entries, HEADER_WORDS};
use crate::object::Object;
use crate::payload::PayloadMgr;
use crate::schema::Schema;

const W_NUM_FIELDS: usize = 0;
const W_TAGS: usize = 1; // two words of tag bytes
const W_DIR: usize = 3;

const TABLE_BYTES: usize = (W_DIR + HEADER_WORDS) * 8;

/// A table handle: a typed view over one table block.
#[derive(Debug, Clone, Copy)]
pub struct Table {
    r: Ref,
}

impl Table {
    /// Allocates and initializes a fresh table block in the slab.
    ///
    /// Panics on a malformed typeinfo string; a bad schema is a
    /// programmer error, not runtime input.
    pub fn create(mem: &mut Memory, typeinfo: &str) -> Result<Table> {
        let schema = Schema::parse(typeinfo);
        let r = mem.alloc(TABLE_BYTES)?;
        mem.set_word(r, W_NUM_FIELDS, schema.num_fields() as u64);
        let tags = schema.to_stored();
        mem.set_word(r, W_TAGS, u64::from_le_bytes(tags[0..8].try_into().unwrap()));
        mem.set_word(r, W_TAGS + 1, u64::from_le_bytes(tags[8..16].try_into().unwrap()));
        Cuckoo::at(r, W_DIR).init(mem)?;
        Ok(Table { r })
    }

    /// Views an existing table block.
    pub const fn from_ref(r: Ref) -> Table {
        Table { r }
    }

    /// The underlying block ref.
    pub const fn to_ref(self) -> Ref {
        self.r
    }

    /// Reads the schema back out of the block.
    pub fn schema(&self, mem: &Memory) -> Schema {
        let len = mem.word(self.r, W_NUM_FIELDS) as usize;
        let mut tags = [0u8; MAX_FIELDS];
        tags[0..8].copy_from_slice(&mem.word(self.r, W_TAGS).to_le_bytes());
        tags[8..16].copy_from_slice(&mem.word(self.r, W_TAGS + 1).to_le_bytes());
        Schema::from_stored(&tags, len)
    }

    /// Number of rows.
    pub fn len(&self, mem: &Memory) -> u64 {
        self.dir().len(mem)
    }

    /// True when the table holds no rows.
    pub fn is_empty(&self, mem: &Memory) -> bool {
        self.dir().is_empty(mem)
    }

    /// Inserts an empty (all-zero) row under `key`, overwriting any
    /// existing row with that key. Fields are populated afterwards
    /// through [`Table::change_cluster`] and the typed setters.
    pub fn insert(&self, mem: &mut Memory, key: u64) -> Result<()> {
        assert!(mem.is_writable(self.r), "insert into an immutable table");
        let mut pm = ClusterMgr::new(self.schema(mem));
        pm.init_buffer();
        self.dir().insert(mem, key << 1, &mut pm)
    }

    /// Existence check; resolves nothing.
    pub fn find(&self, mem: &Memory, key: u64) -> bool {
        self.dir().find(mem, key).is_some()
    }

    /// Resolves `key` to a read cursor. The cursor's writability
    /// mirrors the payload's: it is writable only if this transaction
    /// already cowed the bucket.
    pub fn get_cluster(&self, mem: &Memory, key: u64) -> Result<Object> {
        match self.dir().find(mem, key) {
            Some((payload, index)) => {
                Ok(Object::new(key, payload, index, mem.is_writable(payload)))
            }
            None => Err(Error::NotFound),
        }
    }

    /// Resolves `key` to a writable cursor, cowing the route to the
    /// bucket and the bucket's payload on the way.
    pub fn change_cluster(&self, mem: &mut Memory, key: u64) -> Result<Object> {
        assert!(mem.is_writable(self.r), "change through an immutable table");
        let mut pm = ClusterMgr::new(self.schema(mem));
        match self.dir().find_and_cow_path(mem, &mut pm, key)? {
            Some((payload, index)) => {
                debug_assert!(mem.is_writable(payload));
                Ok(Object::new(key, payload, index, true))
            }
            None => Err(Error::NotFound),
        }
    }

    /// Clones the table block into the slab if it is still committed;
    /// the directory and payloads stay shared until they are cowed.
    pub fn cow(mem: &mut Memory, from: Table) -> Result<Table> {
        if mem.is_writable(from.r) {
            return Ok(from);
        }
        let to = mem.alloc(TABLE_BYTES)?;
        mem.copy_block(from.r, to, TABLE_BYTES);
        Ok(Table { r: to })
    }

    /// Moves a mutable table into the file region: the block first,
    /// then the directory and every payload beneath it. An immutable
    /// table is already committed and returned unchanged.
    pub fn commit(mem: &mut Memory, from: Table) -> Result<Table> {
        if !mem.is_writable(from.r) {
            return Ok(from);
        }
        let to = mem.alloc_in_file(TABLE_BYTES)?;
        mem.copy_block(from.r, to, TABLE_BYTES);
        mem.free(from.r, TABLE_BYTES);
        let table = Table { r: to };
        let mut pm = ClusterMgr::new(table.schema(mem));
        Cuckoo::at(to, W_DIR).copied_to_file(mem, &mut pm)?;
        Ok(table)
    }

    /// Iterates the rows in directory order, each key exactly once.
    pub fn rows<'a>(&self, mem: &'a Memory) -> Rows<'a> {
        Rows {
            entries: self.dir().entries(mem),
            mem,
        }
    }

    fn dir(&self) -> Cuckoo {
        Cuckoo::at(self.r, W_DIR)
    }
}

/// Iterator over a table's rows.
pub struct Rows<'a> {
    entries: Entries<'a>,
    mem: &'a Memory,
}

impl Iterator for Rows<'_> {
    type Item = (u64, Object);

    fn next(&mut self) -> Option<(u64, Object)> {
        self.entries.next().map(|e| {
            let writable = self.mem.is_writable(e.payload);
            (e.key, Object::new(e.key, e.payload, e.index, writable))
        })
    }
}
