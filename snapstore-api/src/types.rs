//! Schema tag types and field value wrappers

/// Maximum number of fields in a table schema.
///
/// The transient row buffer that shuttles a row through cuckoo
/// displacement is a fixed array of this many cells, so wider schemas
/// are rejected at table creation.
pub const MAX_FIELDS: usize = 16;

/// Column type of a table field, parsed from one typeinfo tag character.
///
/// `TableRef`, `RowRef` and `U64` share the u64 storage representation;
/// the distinction is enforced at the typed accessor layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldType {
    /// `'t'` - a reference to another table, stored as u64
    TableRef,
    /// `'r'` - a reference to a row, stored as u64
    RowRef,
    /// `'u'` - unsigned 64-bit integer
    U64,
    /// `'i'` - signed 64-bit integer
    I64,
    /// `'f'` - 32-bit float
    F32,
    /// `'d'` - 64-bit float
    F64,
}

impl FieldType {
    /// Parses a typeinfo tag character.
    pub const fn from_tag(tag: u8) -> Option<FieldType> {
        match tag {
            b't' => Some(FieldType::TableRef),
            b'r' => Some(FieldType::RowRef),
            b'u' => Some(FieldType::U64),
            b'i' => Some(FieldType::I64),
            b'f' => Some(FieldType::F32),
            b'd' => Some(FieldType::F64),
            _ => None,
        }
    }

    /// Returns the typeinfo tag character for this field type.
    pub const fn tag(self) -> u8 {
        match self {
            FieldType::TableRef => b't',
            FieldType::RowRef => b'r',
            FieldType::U64 => b'u',
            FieldType::I64 => b'i',
            FieldType::F32 => b'f',
            FieldType::F64 => b'd',
        }
    }
}

/// A table-valued field: the key of another table.
///
/// Stored through the u64 column path; the wrapper keeps table keys and
/// plain integers apart in the accessor API.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(transparent)]
pub struct TableRef(pub u64);

impl TableRef {
    /// Returns the wrapped table key.
    pub const fn key(self) -> u64 {
        self.0
    }
}

/// A row-valued field: the key of a row in some table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(transparent)]
pub struct RowRef(pub u64);

impl RowRef {
    /// Returns the wrapped row key.
    pub const fn key(self) -> u64 {
        self.0
    }
}
