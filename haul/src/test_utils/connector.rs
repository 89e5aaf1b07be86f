use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use crate::error::{ErrorKind, HaulError, HaulResult};
use crate::pool::Connector;

/// A connection handed out by [`TestConnector`], identified by creation order.
#[derive(Debug, PartialEq, Eq)]
pub struct TestConnection {
    pub id: u64,
}

#[derive(Debug, Default)]
struct Inner {
    created: AtomicU64,
    closed: AtomicU64,
    probes: AtomicU64,
    refuse_connections: AtomicBool,
    connections_valid: AtomicBool,
}

/// Connector counting connections and letting tests control liveness.
#[derive(Debug, Clone)]
pub struct TestConnector {
    inner: Arc<Inner>,
}

impl TestConnector {
    pub fn new() -> Self {
        let inner = Inner::default();
        inner.connections_valid.store(true, Ordering::Release);

        Self {
            inner: Arc::new(inner),
        }
    }

    /// Makes every liveness probe report the connection as dead (or alive again).
    pub fn set_connections_valid(&self, valid: bool) {
        self.inner.connections_valid.store(valid, Ordering::Release);
    }

    /// Makes `connect` fail with [`ErrorKind::StoreConnectionFailed`].
    pub fn refuse_connections(&self, refuse: bool) {
        self.inner.refuse_connections.store(refuse, Ordering::Release);
    }

    pub fn created(&self) -> u64 {
        self.inner.created.load(Ordering::Acquire)
    }

    pub fn closed(&self) -> u64 {
        self.inner.closed.load(Ordering::Acquire)
    }

    pub fn probes(&self) -> u64 {
        self.inner.probes.load(Ordering::Acquire)
    }
}

impl Default for TestConnector {
    fn default() -> Self {
        Self::new()
    }
}

impl Connector for TestConnector {
    type Connection = TestConnection;

    async fn connect(&self) -> HaulResult<TestConnection> {
        if self.inner.refuse_connections.load(Ordering::Acquire) {
            return Err(HaulError::from((
                ErrorKind::StoreConnectionFailed,
                "Test connector refused the connection",
            )));
        }

        let id = self.inner.created.fetch_add(1, Ordering::AcqRel) + 1;
        Ok(TestConnection { id })
    }

    async fn is_valid(&self, _connection: &mut TestConnection) -> bool {
        self.inner.probes.fetch_add(1, Ordering::AcqRel);
        self.inner.connections_valid.load(Ordering::Acquire)
    }

    async fn close(&self, _connection: TestConnection) {
        self.inner.closed.fetch_add(1, Ordering::AcqRel);
    }
}
