//! Snapstore API
//!
//! This crate provides the shared vocabulary of the snapstore table store:
//! the common error type and the schema tag types used by every layer.

#![cfg_attr(not(test), no_std)]
#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod error;
pub mod types;

pub use error::{Error, Result};
pub use types::{FieldType, RowRef, TableRef, MAX_FIELDS};
