//! Coordination primitives shared by movers and the orchestrator.
//!
//! - [`shutdown`] broadcasts a one-way shutdown request to every running task.
//! - [`slot`] wraps an orchestrator concurrency permit that a mover can hand back early.
//! - [`stream`] adapts home streams so they stop promptly on shutdown.

pub mod shutdown;
pub mod slot;
pub mod stream;
