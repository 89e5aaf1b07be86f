use std::any::Any;
use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};

use futures::future::BoxFuture;
use tracing::info;

use crate::bail;
use crate::error::{ErrorKind, HaulResult};
use crate::pool::{ConnectionPool, Connector, PoolStatus};

/// Object-safe view of a [`ConnectionPool`] of any connector type.
trait ErasedPool: Send + Sync {
    fn as_any(&self) -> &dyn Any;

    fn shutdown(&self) -> BoxFuture<'_, ()>;

    fn status(&self) -> PoolStatus;
}

impl<C: Connector> ErasedPool for ConnectionPool<C> {
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn shutdown(&self) -> BoxFuture<'_, ()> {
        Box::pin(ConnectionPool::shutdown(self))
    }

    fn status(&self) -> PoolStatus {
        ConnectionPool::status(self)
    }
}

/// Named connection pools shared by the movers of one process.
///
/// Built by the caller and passed by reference into mover construction, where stores look up
/// their pool with [`PoolRegistry::get`]. Cloning yields another handle to the same registry.
#[derive(Clone, Default)]
pub struct PoolRegistry {
    pools: Arc<RwLock<HashMap<String, Arc<dyn ErasedPool>>>>,
}

impl std::fmt::Debug for PoolRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PoolRegistry")
            .field("pools", &self.names())
            .finish()
    }
}

impl PoolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `pool` under its name. Fails if the name is taken.
    pub fn register<C: Connector>(&self, pool: ConnectionPool<C>) -> HaulResult<()> {
        let mut pools = self.pools.write().unwrap_or_else(PoisonError::into_inner);
        if pools.contains_key(pool.name()) {
            bail!(
                ErrorKind::ConfigError,
                "A connection pool with this name is already registered",
                format!("pool `{}`", pool.name())
            );
        }

        pools.insert(pool.name().to_string(), Arc::new(pool));

        Ok(())
    }

    /// Returns the pool named `name` if it exists and was built with connector `C`.
    pub fn get<C: Connector>(&self, name: &str) -> Option<ConnectionPool<C>> {
        let pools = self.pools.read().unwrap_or_else(PoisonError::into_inner);
        pools
            .get(name)?
            .as_any()
            .downcast_ref::<ConnectionPool<C>>()
            .cloned()
    }

    /// Like [`PoolRegistry::get`], failing with [`ErrorKind::ConfigError`] when absent.
    pub fn require<C: Connector>(&self, name: &str) -> HaulResult<ConnectionPool<C>> {
        match self.get(name) {
            Some(pool) => Ok(pool),
            None => bail!(
                ErrorKind::ConfigError,
                "No connection pool of the expected type is registered under this name",
                format!("pool `{name}`")
            ),
        }
    }

    /// Returns the registered names in sorted order.
    pub fn names(&self) -> Vec<String> {
        let pools = self.pools.read().unwrap_or_else(PoisonError::into_inner);
        let mut names: Vec<String> = pools.keys().cloned().collect();
        names.sort();

        names
    }

    pub fn status(&self, name: &str) -> Option<PoolStatus> {
        let pools = self.pools.read().unwrap_or_else(PoisonError::into_inner);
        pools.get(name).map(|pool| pool.status())
    }

    /// Shuts every registered pool down.
    pub async fn shutdown_all(&self) {
        let pools: Vec<(String, Arc<dyn ErasedPool>)> = {
            let pools = self.pools.read().unwrap_or_else(PoisonError::into_inner);
            pools
                .iter()
                .map(|(name, pool)| (name.clone(), pool.clone()))
                .collect()
        };

        for (name, pool) in pools {
            pool.shutdown().await;
            info!(pool = %name, "shut down registered pool");
        }
    }
}
