//! Stable allocation handles

use static_assertions::const_assert;

/// First ref of the immutable file region.
///
/// Ref zero is the null ref, so file offsets start one alignment unit in.
pub const FILE_BASE: u64 = 8;

/// First ref of the mutable slab region.
///
/// The slab sits at a fixed base far above any attainable file size, so
/// the two regions never interleave while `is_writable` stays a single
/// baseline comparison.
pub const SLAB_BASE: u64 = 1 << 40;

const_assert!(FILE_BASE % 8 == 0);
const_assert!(SLAB_BASE % 8 == 0);
const_assert!(FILE_BASE < SLAB_BASE);

/// A stable handle to one allocation.
///
/// Refs are 8-byte-aligned and nonzero; the null ref is [`Ref::NULL`].
/// A ref identifies its allocation for the allocation's whole lifetime
/// and is translated to bytes by [`crate::Memory`], which lets blocks be
/// relocated without rewriting stored cross-references.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(transparent)]
pub struct Ref(u64);

impl Ref {
    /// The null ref.
    pub const NULL: Ref = Ref(0);

    /// Creates a ref from a raw handle value.
    pub const fn new(raw: u64) -> Self {
        debug_assert!(raw % 8 == 0);
        Self(raw)
    }

    /// Returns the raw handle value.
    pub const fn raw(self) -> u64 {
        self.0
    }

    /// Checks whether this is the null ref.
    pub const fn is_null(self) -> bool {
        self.0 == 0
    }
}

impl From<u64> for Ref {
    fn from(raw: u64) -> Self {
        Self::new(raw)
    }
}

impl From<Ref> for u64 {
    fn from(r: Ref) -> Self {
        r.0
    }
}
