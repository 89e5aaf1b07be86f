//! Movement of one entity from a home to a store.
//!
//! Each attempt runs a producer task reading batches from the home and a consumer task writing
//! them to the store, connected by a bounded channel. A failed attempt is retried from the
//! beginning according to the flow's retry policy.

mod attempt;
mod base;
mod result;

pub use base::{Mover, MoverState};
pub use result::{RunResult, RunStatus};
