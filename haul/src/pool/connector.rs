use std::future::Future;

use crate::error::HaulResult;

/// Creates, probes and closes the connections held by a [`crate::pool::ConnectionPool`].
///
/// Connection failures must be reported with a connection [`crate::error::ErrorKind`] so that
/// movers retry them. The pool never retries `connect` itself.
pub trait Connector: Send + Sync + 'static {
    type Connection: Send + 'static;

    /// Opens a new connection.
    fn connect(&self) -> impl Future<Output = HaulResult<Self::Connection>> + Send;

    /// Lightweight liveness probe of an idle connection.
    fn is_valid(&self, connection: &mut Self::Connection) -> impl Future<Output = bool> + Send;

    /// Closes a connection that leaves the pool. Dropping it is the default.
    fn close(&self, connection: Self::Connection) -> impl Future<Output = ()> + Send {
        async move { drop(connection) }
    }
}
