//! Helpers for testing movers, journals, mirrors and pools.
//!
//! - [`data`] builds the `orders` fixture and flow configurations.
//! - [`test_store_wrapper`] wraps a store to count calls, inject failures and defer completion.
//! - [`test_home_wrapper`] wraps a home to record every read.
//! - [`connector`] provides a [`crate::pool::Connector`] with controllable liveness.
//! - [`notify`] waits for test conditions with a timeout.

pub mod connector;
pub mod data;
#[cfg(feature = "failpoints")]
pub mod failpoints;
pub mod notify;
pub mod test_home_wrapper;
pub mod test_store_wrapper;
