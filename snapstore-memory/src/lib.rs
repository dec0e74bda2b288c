//! Snapstore Memory
//!
//! This crate provides the ref-indirected allocator underneath the
//! snapstore table store. Allocations are identified by stable integer
//! refs rather than addresses, split into an immutable file region and a
//! mutable slab region, and the typed [`Array`] layer stores primitive
//! columns behind single refs.

#![cfg_attr(not(test), no_std)]
#![warn(missing_docs)]
#![warn(clippy::all)]

extern crate alloc;

pub mod array;
pub mod memory;
pub mod memref;

pub use array::{Array, Scalar};
pub use memory::{Memory, MemoryStats};
pub use memref::{Ref, FILE_BASE, SLAB_BASE};
