//! Logging setup shared by binaries and tests that embed the `haul` crates.

pub mod tracing;
