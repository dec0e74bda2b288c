//! Snapstore
//!
//! A copy-on-write, snapshot-isolated table store. Tables map 64-bit
//! keys to typed rows held in fixed-width clusters; a cuckoo-hash
//! directory locates each row, and every structure lives behind stable
//! refs vended by [`snapstore_memory::Memory`]. Readers traverse an
//! immutable committed image; the single writer cows only the path it
//! touches and publishes a new image atomically on commit.

#![cfg_attr(not(test), no_std)]
#![warn(missing_docs)]
#![warn(clippy::all)]

extern crate alloc;

pub mod cluster;
pub mod cuckoo;
pub mod object;
pub mod payload;
pub mod schema;
pub mod store;
pub mod table;

pub use object::{Field, FieldValue, Object};
pub use schema::Schema;
pub use store::{ReadView, Snapshot, Store, WriteTxn};
pub use table::Table;

// Re-export the layers the store is built from.
pub use snapstore_api::{Error, FieldType, Result, RowRef, TableRef, MAX_FIELDS};
pub use snapstore_memory::{Array, Memory, Ref};
