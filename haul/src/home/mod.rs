//! Data home abstractions.
//!
//! A home is the system batches are read from. The core only talks to it through the [`Home`]
//! trait. With the `test-utils` feature, `memory::MemoryHome` serves fixed batches from memory.

mod base;
#[cfg(any(test, feature = "test-utils"))]
pub mod memory;

pub use base::{BatchStream, Home};
