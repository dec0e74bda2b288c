//! Error handling module for the snapstore table store

use core::fmt;

/// Common error type used throughout snapstore.
///
/// Only runtime failures are represented here. Programmer errors such as
/// an unknown schema tag or a write to an immutable ref without a prior
/// copy-on-write are assertion failures, not `Error` values.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    /// The allocator could not satisfy an allocation request.
    OutOfMemory,
    /// The requested key is not present in the table.
    NotFound,
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::OutOfMemory => write!(f, "Out of memory"),
            Error::NotFound => write!(f, "Not found"),
        }
    }
}

/// Result type for operations that can fail
pub type Result<T> = core::result::Result<T, Error>;
