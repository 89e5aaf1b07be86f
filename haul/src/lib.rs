//! Batch data movement from a home to a store with bounded memory, whole-attempt retries,
//! watermark-based incremental reads, a crash-safe run journal and a deferred mirror of that
//! journal.
//!
//! The entry points are [`mover::Mover`], which moves one entity, and
//! [`orchestrator::Orchestrator`], which runs many movers under a concurrency limit.

pub mod concurrency;
pub mod error;
#[cfg(feature = "failpoints")]
pub mod failpoints;
pub mod home;
pub mod journal;
mod macros;
pub mod metrics;
pub mod mirror;
pub mod mover;
pub mod orchestrator;
pub mod pool;
pub mod retry;
pub mod store;
#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;
pub mod types;
pub mod watermark;

pub use haul_config::shared::{RunMode, WatermarkKind};
