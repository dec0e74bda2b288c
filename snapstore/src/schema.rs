//! Typeinfo parsing and field handles

use snapstore_api::{FieldType, MAX_FIELDS};

use crate::object::{Field, FieldValue};

/// A parsed table schema: one [`FieldType`] per column.
///
/// Parsed once from the typeinfo tag string at table creation and fixed
/// thereafter. An unknown tag or a schema wider than [`MAX_FIELDS`] is a
/// programmer error and panics.
#[derive(Debug, Clone, Copy)]
pub struct Schema {
    fields: [FieldType; MAX_FIELDS],
    len: usize,
}

impl Schema {
    /// Parses a typeinfo string, one tag character per column.
    pub fn parse(typeinfo: &str) -> Schema {
        assert!(
            typeinfo.len() <= MAX_FIELDS,
            "schema wider than {} fields",
            MAX_FIELDS
        );
        let mut fields = [FieldType::U64; MAX_FIELDS];
        for (i, tag) in typeinfo.bytes().enumerate() {
            fields[i] = match FieldType::from_tag(tag) {
                Some(ty) => ty,
                None => panic!("unsupported type tag {:?}", tag as char),
            };
        }
        Schema {
            fields,
            len: typeinfo.len(),
        }
    }

    /// Rebuilds a schema from the tag bytes stored in a table block.
    pub(crate) fn from_stored(tags: &[u8; MAX_FIELDS], len: usize) -> Schema {
        debug_assert!(len <= MAX_FIELDS);
        let mut fields = [FieldType::U64; MAX_FIELDS];
        for i in 0..len {
            fields[i] = FieldType::from_tag(tags[i]).expect("corrupt schema tags");
        }
        Schema { fields, len }
    }

    /// Serializes the schema back to tag bytes for block storage.
    pub(crate) fn to_stored(self) -> [u8; MAX_FIELDS] {
        let mut tags = [0u8; MAX_FIELDS];
        for i in 0..self.len {
            tags[i] = self.fields[i].tag();
        }
        tags
    }

    /// Number of columns.
    pub fn num_fields(&self) -> usize {
        self.len
    }

    /// Column types, in declaration order.
    pub fn field_types(&self) -> &[FieldType] {
        &self.fields[..self.len]
    }

    /// Mints a typed handle for column `index`.
    ///
    /// Panics if the column's tag does not store values of type `T`;
    /// the handle is the compile-time seam that keeps `'t'`, `'r'` and
    /// `'u'` columns apart even though they share u64 storage.
    pub fn field<T: FieldValue>(&self, index: usize) -> Field<T> {
        assert!(index < self.len, "field index out of range");
        assert!(
            T::matches(self.fields[index]),
            "field {} does not store the requested type",
            index
        );
        Field::new(index)
    }
}
