//! Data store abstractions.
//!
//! A store is the system batches are written to. The core only talks to it through the
//! [`Store`] trait. With the `test-utils` feature, `memory::MemoryStore` keeps written
//! rows in memory.

mod base;
#[cfg(any(test, feature = "test-utils"))]
pub mod memory;

pub use base::{Completion, Store};
