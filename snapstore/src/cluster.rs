//! Typed cluster payloads
//!
//! A cluster is the payload of one directory bucket: a block of column
//! refs, one typed array per field, all sharing the bucket's slot
//! capacity. [`ClusterMgr`] is the only code that interprets the
//! schema; the directory drives it through the [`PayloadMgr`] trait.

use snapstore_api::{FieldType, Result, MAX_FIELDS};
use snapstore_memory::{Array, Memory, Ref, Scalar};

use crate::payload::PayloadMgr;
use crate::schema::Schema;

/// Reads one element of the typed column at word `col` of `cluster`.
pub(crate) fn read_col<T: Scalar>(mem: &Memory, cluster: Ref, col: usize, row: usize) -> T {
    let arr = Array::<T>::from_ref(Ref::new(mem.word(cluster, col)));
    arr.get(mem, row)
}

/// Writes one element of the typed column at word `col` of `cluster`.
///
/// The cluster block must already be writable; the column itself is
/// cowed here if it is still shared with a committed image, and the
/// cluster's column ref is updated to the clone.
pub(crate) fn write_col<T: Scalar>(
    mem: &mut Memory,
    cluster: Ref,
    col: usize,
    row: usize,
    value: T,
) -> Result<()> {
    let arr = Array::<T>::from_ref(Ref::new(mem.word(cluster, col)));
    let arr = arr.cow(mem)?;
    mem.set_word(cluster, col, arr.to_ref().raw());
    arr.set(mem, row, value);
    Ok(())
}

/// Block size of a cluster with the given field count.
const fn cluster_bytes(num_fields: usize) -> usize {
    num_fields * 8
}

/// The concrete payload manager over typed column arrays.
///
/// Carries the parsed schema and the transient row buffer: one raw
/// 64-bit cell per field, `f32` values occupying the low half of their
/// cell. The buffer shuttles a single row through cuckoo displacement
/// chains without touching the allocator.
pub struct ClusterMgr {
    schema: Schema,
    pub(crate) values: [u64; MAX_FIELDS],
}

impl ClusterMgr {
    /// Creates a manager for one table's schema.
    pub fn new(schema: Schema) -> Self {
        Self {
            schema,
            values: [0; MAX_FIELDS],
        }
    }
}

impl PayloadMgr for ClusterMgr {
    fn init_buffer(&mut self) {
        for cell in self.values.iter_mut().take(self.schema.num_fields()) {
            *cell = 0;
        }
    }

    fn read_buffer(&mut self, mem: &Memory, payload: Ref, index: usize) {
        for (col, ty) in self.schema.field_types().iter().enumerate() {
            self.values[col] = match ty {
                FieldType::TableRef | FieldType::RowRef | FieldType::U64 => {
                    read_col::<u64>(mem, payload, col, index)
                }
                FieldType::I64 => read_col::<i64>(mem, payload, col, index) as u64,
                FieldType::F32 => read_col::<f32>(mem, payload, col, index).to_bits() as u64,
                FieldType::F64 => read_col::<f64>(mem, payload, col, index).to_bits(),
            };
        }
    }

    fn write_buffer(&mut self, mem: &mut Memory, payload: Ref, index: usize) -> Result<()> {
        assert!(mem.is_writable(payload), "write into an immutable payload");
        for (col, ty) in self.schema.field_types().iter().enumerate() {
            let cell = self.values[col];
            match ty {
                FieldType::TableRef | FieldType::RowRef | FieldType::U64 => {
                    write_col::<u64>(mem, payload, col, index, cell)?;
                }
                FieldType::I64 => write_col::<i64>(mem, payload, col, index, cell as i64)?,
                FieldType::F32 => {
                    write_col::<f32>(mem, payload, col, index, f32::from_bits(cell as u32))?;
                }
                FieldType::F64 => {
                    write_col::<f64>(mem, payload, col, index, f64::from_bits(cell))?;
                }
            }
        }
        Ok(())
    }

    fn swap_buffer(&mut self, mem: &mut Memory, payload: Ref, index: usize) -> Result<()> {
        assert!(mem.is_writable(payload), "swap into an immutable payload");
        for (col, ty) in self.schema.field_types().iter().enumerate() {
            let cell = self.values[col];
            self.values[col] = match ty {
                FieldType::TableRef | FieldType::RowRef | FieldType::U64 => {
                    let old = read_col::<u64>(mem, payload, col, index);
                    write_col::<u64>(mem, payload, col, index, cell)?;
                    old
                }
                FieldType::I64 => {
                    let old = read_col::<i64>(mem, payload, col, index);
                    write_col::<i64>(mem, payload, col, index, cell as i64)?;
                    old as u64
                }
                FieldType::F32 => {
                    let old = read_col::<f32>(mem, payload, col, index);
                    write_col::<f32>(mem, payload, col, index, f32::from_bits(cell as u32))?;
                    old.to_bits() as u64
                }
                FieldType::F64 => {
                    let old = read_col::<f64>(mem, payload, col, index);
                    write_col::<f64>(mem, payload, col, index, f64::from_bits(cell))?;
                    old.to_bits()
                }
            };
        }
        Ok(())
    }

    fn alloc_payload(&mut self, mem: &mut Memory, capacity: usize) -> Result<Ref> {
        let num_fields = self.schema.num_fields();
        let block = mem.alloc(cluster_bytes(num_fields))?;
        for (col, ty) in self.schema.field_types().iter().enumerate() {
            let column = match ty {
                FieldType::TableRef | FieldType::RowRef | FieldType::U64 => {
                    Array::<u64>::alloc(mem, capacity)?.to_ref()
                }
                FieldType::I64 => Array::<i64>::alloc(mem, capacity)?.to_ref(),
                FieldType::F32 => Array::<f32>::alloc(mem, capacity)?.to_ref(),
                FieldType::F64 => Array::<f64>::alloc(mem, capacity)?.to_ref(),
            };
            mem.set_word(block, col, column.raw());
        }
        Ok(block)
    }

    fn cow(
        &mut self,
        mem: &mut Memory,
        payload: &mut Ref,
        old_capacity: usize,
        new_capacity: usize,
    ) -> Result<()> {
        assert!(!payload.is_null());
        debug_assert_eq!(
            old_capacity, new_capacity,
            "bucket capacity is fixed; growth happens in bucket count"
        );
        if mem.is_writable(*payload) {
            return Ok(());
        }
        // Shallow clone: the column refs move over, the columns stay
        // shared until they are individually cowed on first write.
        let num_fields = self.schema.num_fields();
        let size = cluster_bytes(num_fields);
        let clone = mem.alloc(size)?;
        mem.copy_block(*payload, clone, size);
        *payload = clone;
        Ok(())
    }

    fn free(&mut self, mem: &mut Memory, payload: Ref, _capacity: usize) {
        if payload.is_null() || !mem.is_writable(payload) {
            return;
        }
        for (col, ty) in self.schema.field_types().iter().enumerate() {
            let column = Ref::new(mem.word(payload, col));
            if !mem.is_writable(column) {
                continue;
            }
            match ty {
                FieldType::TableRef | FieldType::RowRef | FieldType::U64 => {
                    Array::<u64>::from_ref(column).free(mem);
                }
                FieldType::I64 => Array::<i64>::from_ref(column).free(mem),
                FieldType::F32 => Array::<f32>::from_ref(column).free(mem),
                FieldType::F64 => Array::<f64>::from_ref(column).free(mem),
            }
        }
        mem.free(payload, cluster_bytes(self.schema.num_fields()));
    }

    fn commit(&mut self, mem: &mut Memory, from: Ref) -> Result<Ref> {
        if !mem.is_writable(from) {
            return Ok(from);
        }
        let num_fields = self.schema.num_fields();
        let size = cluster_bytes(num_fields);
        let to = mem.alloc_in_file(size)?;
        for (col, ty) in self.schema.field_types().iter().enumerate() {
            let column = Ref::new(mem.word(from, col));
            let committed = match ty {
                FieldType::TableRef | FieldType::RowRef | FieldType::U64 => {
                    Array::<u64>::commit(mem, Array::from_ref(column))?.to_ref()
                }
                FieldType::I64 => Array::<i64>::commit(mem, Array::from_ref(column))?.to_ref(),
                FieldType::F32 => Array::<f32>::commit(mem, Array::from_ref(column))?.to_ref(),
                FieldType::F64 => Array::<f64>::commit(mem, Array::from_ref(column))?.to_ref(),
            };
            mem.set_word(to, col, committed.raw());
        }
        mem.free(from, size);
        Ok(to)
    }
}
