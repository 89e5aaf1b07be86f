//! Bounded pools of reusable connections.
//!
//! A [`ConnectionPool`] hands out at most `capacity` live connections created by a
//! [`Connector`]. Connections are recycled when their guard drops, replaced once they exceed
//! their maximum lifetime and probed for liveness while idle. Pools are shared between movers
//! through an explicit [`PoolRegistry`].

mod base;
mod connector;
mod registry;

pub use base::{ConnectionPool, PoolStatus, PooledConnection};
pub use connector::Connector;
pub use registry::PoolRegistry;
