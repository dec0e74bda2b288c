//! Row cursors and typed field accessors

use core::marker::PhantomData;

use snapstore_api::{FieldType, Result, RowRef, TableRef};
use snapstore_memory::{Memory, Ref};

use crate::cluster::{read_col, write_col};

/// A typed handle to one column, minted by [`crate::Schema::field`]
/// with the column tag checked against `T`.
pub struct Field<T> {
    index: usize,
    _ty: PhantomData<T>,
}

impl<T> Clone for Field<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for Field<T> {}

impl<T> Field<T> {
    pub(crate) const fn new(index: usize) -> Self {
        Self {
            index,
            _ty: PhantomData,
        }
    }

    /// Column position within the schema.
    pub const fn index(self) -> usize {
        self.index
    }
}

/// A value type storable through a [`Field`] accessor.
///
/// `TableRef` and `RowRef` ride the u64 column path; the trait is what
/// keeps them apart from plain integers at compile time.
pub trait FieldValue: Copy {
    /// True when a column tagged `ty` stores this type.
    fn matches(ty: FieldType) -> bool;

    /// Reads one element from the column at word `col` of `cluster`.
    fn read(mem: &Memory, cluster: Ref, col: usize, row: usize) -> Self;

    /// Writes one element through the column at word `col` of
    /// `cluster`, cowing the column if it is still shared.
    fn write(self, mem: &mut Memory, cluster: Ref, col: usize, row: usize) -> Result<()>;
}

impl FieldValue for u64 {
    fn matches(ty: FieldType) -> bool {
        ty == FieldType::U64
    }

    fn read(mem: &Memory, cluster: Ref, col: usize, row: usize) -> Self {
        read_col::<u64>(mem, cluster, col, row)
    }

    fn write(self, mem: &mut Memory, cluster: Ref, col: usize, row: usize) -> Result<()> {
        write_col::<u64>(mem, cluster, col, row, self)
    }
}

impl FieldValue for i64 {
    fn matches(ty: FieldType) -> bool {
        ty == FieldType::I64
    }

    fn read(mem: &Memory, cluster: Ref, col: usize, row: usize) -> Self {
        read_col::<i64>(mem, cluster, col, row)
    }

    fn write(self, mem: &mut Memory, cluster: Ref, col: usize, row: usize) -> Result<()> {
        write_col::<i64>(mem, cluster, col, row, self)
    }
}

impl FieldValue for f32 {
    fn matches(ty: FieldType) -> bool {
        ty == FieldType::F32
    }

    fn read(mem: &Memory, cluster: Ref, col: usize, row: usize) -> Self {
        read_col::<f32>(mem, cluster, col, row)
    }

    fn write(self, mem: &mut Memory, cluster: Ref, col: usize, row: usize) -> Result<()> {
        write_col::<f32>(mem, cluster, col, row, self)
    }
}

impl FieldValue for f64 {
    fn matches(ty: FieldType) -> bool {
        ty == FieldType::F64
    }

    fn read(mem: &Memory, cluster: Ref, col: usize, row: usize) -> Self {
        read_col::<f64>(mem, cluster, col, row)
    }

    fn write(self, mem: &mut Memory, cluster: Ref, col: usize, row: usize) -> Result<()> {
        write_col::<f64>(mem, cluster, col, row, self)
    }
}

impl FieldValue for TableRef {
    fn matches(ty: FieldType) -> bool {
        ty == FieldType::TableRef
    }

    fn read(mem: &Memory, cluster: Ref, col: usize, row: usize) -> Self {
        TableRef(read_col::<u64>(mem, cluster, col, row))
    }

    fn write(self, mem: &mut Memory, cluster: Ref, col: usize, row: usize) -> Result<()> {
        write_col::<u64>(mem, cluster, col, row, self.key())
    }
}

impl FieldValue for RowRef {
    fn matches(ty: FieldType) -> bool {
        ty == FieldType::RowRef
    }

    fn read(mem: &Memory, cluster: Ref, col: usize, row: usize) -> Self {
        RowRef(read_col::<u64>(mem, cluster, col, row))
    }

    fn write(self, mem: &mut Memory, cluster: Ref, col: usize, row: usize) -> Result<()> {
        write_col::<u64>(mem, cluster, col, row, self.key())
    }
}

/// A transient cursor to one row.
///
/// Holds the resolved cluster ref and slot for the row's key. The ref
/// is only as durable as the structure behind it: any operation that
/// may cow can relocate the cluster, which is why writes re-resolve the
/// cursor through the owning transaction first.
#[derive(Debug, Clone, Copy)]
pub struct Object {
    key: u64,
    cluster: Ref,
    index: usize,
    writable: bool,
}

impl Object {
    pub(crate) fn new(key: u64, cluster: Ref, index: usize, writable: bool) -> Self {
        Self {
            key,
            cluster,
            index,
            writable,
        }
    }

    /// The row's key.
    pub fn key(&self) -> u64 {
        self.key
    }

    /// The row's slot within its cluster.
    pub fn index(&self) -> usize {
        self.index
    }

    /// True when the cursor points into the writable working set.
    pub fn is_writable(&self) -> bool {
        self.writable
    }

    pub(crate) fn cluster_ref(&self) -> Ref {
        self.cluster
    }

    /// Reads a field of this row.
    pub fn get<T: FieldValue>(&self, mem: &Memory, field: Field<T>) -> T {
        T::read(mem, self.cluster, field.index(), self.index)
    }

    /// Writes a field of this row. The cursor must already point at a
    /// writable cluster; [`crate::WriteTxn::set`] takes care of that.
    pub(crate) fn set<T: FieldValue>(
        &self,
        mem: &mut Memory,
        field: Field<T>,
        value: T,
    ) -> Result<()> {
        assert!(self.writable, "write through a read-only object");
        value.write(mem, self.cluster, field.index(), self.index)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cluster::ClusterMgr;
    use crate::payload::PayloadMgr;
    use crate::schema::Schema;

    #[test]
    fn test_typed_access_through_objects() {
        let mut mem = Memory::new();
        let schema = Schema::parse("trud");
        let mut pm = ClusterMgr::new(schema);
        let payload = pm.alloc_payload(&mut mem, 4).unwrap();

        let obj = Object::new(9, payload, 1, true);
        obj.set(&mut mem, schema.field::<TableRef>(0), TableRef(3))
            .unwrap();
        obj.set(&mut mem, schema.field::<RowRef>(1), RowRef(8)).unwrap();
        obj.set(&mut mem, schema.field::<u64>(2), 500).unwrap();
        obj.set(&mut mem, schema.field::<f64>(3), -0.5).unwrap();

        assert_eq!(obj.get(&mem, schema.field::<TableRef>(0)), TableRef(3));
        assert_eq!(obj.get(&mem, schema.field::<RowRef>(1)), RowRef(8));
        assert_eq!(obj.get(&mem, schema.field::<u64>(2)), 500);
        assert_eq!(obj.get(&mem, schema.field::<f64>(3)), -0.5);

        // A neighboring row is untouched.
        let other = Object::new(9, payload, 0, true);
        assert_eq!(other.get(&mem, schema.field::<u64>(2)), 0);
    }

    #[test]
    #[should_panic(expected = "read-only object")]
    fn test_read_only_objects_reject_writes() {
        let mut mem = Memory::new();
        let schema = Schema::parse("u");
        let mut pm = ClusterMgr::new(schema);
        let payload = pm.alloc_payload(&mut mem, 2).unwrap();
        let obj = Object::new(1, payload, 0, false);
        let _ = obj.set(&mut mem, schema.field::<u64>(0), 1);
    }
}
