use std::collections::VecDeque;
use std::ops::{Deref, DerefMut};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::time::Duration;

use haul_config::shared::PoolConfig;
use metrics::{counter, histogram};
use tokio::runtime::Handle;
use tokio::sync::{OwnedSemaphorePermit, Semaphore, TryAcquireError};
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

use crate::bail;
use crate::error::{ErrorKind, HaulResult};
use crate::metrics::{
    HAUL_POOL_ACQUIRE_WAIT_SECONDS, HAUL_POOL_CONNECTIONS_DISCARDED_TOTAL,
    HAUL_POOL_EXHAUSTED_TOTAL, POOL_LABEL, REASON_LABEL,
};
use crate::pool::Connector;

/// A live connection with its bookkeeping.
#[derive(Debug)]
struct PoolEntry<T> {
    connection: T,
    created_at: Instant,
    last_checked_at: Instant,
}

impl<T> PoolEntry<T> {
    fn new(connection: T) -> Self {
        let now = Instant::now();
        Self {
            connection,
            created_at: now,
            last_checked_at: now,
        }
    }

    fn is_expired(&self, max_lifetime: Duration) -> bool {
        self.created_at.elapsed() >= max_lifetime
    }

    fn needs_probe(&self, interval: Duration) -> bool {
        self.last_checked_at.elapsed() >= interval
    }
}

/// Snapshot of a pool's occupancy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolStatus {
    pub capacity: usize,
    pub idle: usize,
    pub in_use: usize,
}

struct PoolInner<C: Connector> {
    name: String,
    connector: C,
    config: PoolConfig,
    /// One permit per connection that may be live and handed out.
    permits: Arc<Semaphore>,
    idle: Mutex<VecDeque<PoolEntry<C::Connection>>>,
    closed: AtomicBool,
    health_task: Mutex<Option<JoinHandle<()>>>,
}

impl<C: Connector> PoolInner<C> {
    fn idle(&self) -> MutexGuard<'_, VecDeque<PoolEntry<C::Connection>>> {
        self.idle.lock().unwrap_or_else(PoisonError::into_inner)
    }

    async fn discard(&self, entry: PoolEntry<C::Connection>, reason: &'static str) {
        debug!(pool = %self.name, reason, "discarding pooled connection");
        counter!(
            HAUL_POOL_CONNECTIONS_DISCARDED_TOTAL,
            POOL_LABEL => self.name.clone(),
            REASON_LABEL => reason,
        )
        .increment(1);

        self.connector.close(entry.connection).await;
    }

    /// Probes idle connections once, dropping expired or unhealthy ones.
    ///
    /// Each probed connection is covered by a permit so a concurrent `acquire` cannot open a
    /// replacement while the probe runs.
    async fn probe_idle(&self) {
        let pending = self.idle().len();
        for _ in 0..pending {
            let permit = match self.permits.clone().try_acquire_owned() {
                Ok(permit) => permit,
                Err(TryAcquireError::NoPermits) | Err(TryAcquireError::Closed) => break,
            };

            let Some(mut entry) = self.idle().pop_front() else {
                break;
            };

            if entry.is_expired(self.config.max_lifetime()) {
                self.discard(entry, "expired").await;
            } else if !self.connector.is_valid(&mut entry.connection).await {
                self.discard(entry, "unhealthy").await;
            } else {
                entry.last_checked_at = Instant::now();
                self.idle().push_back(entry);
            }

            drop(permit);
        }
    }
}

impl<C: Connector> Drop for PoolInner<C> {
    fn drop(&mut self) {
        let task = self
            .health_task
            .get_mut()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(task) = task {
            task.abort();
        }
    }
}

/// A bounded pool of connections created by `C`.
///
/// Cloning is cheap and yields another handle to the same pool.
pub struct ConnectionPool<C: Connector> {
    inner: Arc<PoolInner<C>>,
}

impl<C: Connector> Clone for ConnectionPool<C> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<C: Connector> std::fmt::Debug for ConnectionPool<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionPool")
            .field("name", &self.inner.name)
            .field("status", &self.status())
            .finish()
    }
}

impl<C: Connector> ConnectionPool<C> {
    /// Creates an empty pool. Connections are opened lazily by [`ConnectionPool::acquire`].
    pub fn new(name: impl Into<String>, connector: C, config: PoolConfig) -> HaulResult<Self> {
        config.validate()?;

        let inner = PoolInner {
            name: name.into(),
            connector,
            permits: Arc::new(Semaphore::new(config.capacity)),
            config,
            idle: Mutex::new(VecDeque::new()),
            closed: AtomicBool::new(false),
            health_task: Mutex::new(None),
        };

        Ok(Self {
            inner: Arc::new(inner),
        })
    }

    pub fn name(&self) -> &str {
        &self.inner.name
    }

    pub fn connector(&self) -> &C {
        &self.inner.connector
    }

    /// Hands out a connection, waiting up to `acquire_timeout` for a free slot.
    ///
    /// Idle connections are reused first. Those older than `max_lifetime` are closed and those
    /// not probed within `health_check_interval` are probed before hand-out. A new connection
    /// is opened when none is idle; its failure is returned as is.
    pub async fn acquire(&self) -> HaulResult<PooledConnection<C>> {
        let started = Instant::now();
        let acquire = self.inner.permits.clone().acquire_owned();
        let permit = match tokio::time::timeout(self.inner.config.acquire_timeout(), acquire).await
        {
            Ok(Ok(permit)) => permit,
            Ok(Err(_)) => bail!(
                ErrorKind::PoolClosed,
                "Connection pool is shut down",
                format!("pool `{}`", self.inner.name)
            ),
            Err(_) => {
                counter!(HAUL_POOL_EXHAUSTED_TOTAL, POOL_LABEL => self.inner.name.clone())
                    .increment(1);
                warn!(pool = %self.inner.name, capacity = self.inner.config.capacity, "connection pool exhausted");

                bail!(
                    ErrorKind::PoolExhausted,
                    "No pooled connection became available in time",
                    format!(
                        "pool `{}` with capacity {} timed out after {:?}",
                        self.inner.name,
                        self.inner.config.capacity,
                        self.inner.config.acquire_timeout()
                    )
                );
            }
        };

        histogram!(HAUL_POOL_ACQUIRE_WAIT_SECONDS, POOL_LABEL => self.inner.name.clone())
            .record(started.elapsed().as_secs_f64());

        loop {
            let Some(mut entry) = self.inner.idle().pop_front() else {
                break;
            };

            if entry.is_expired(self.inner.config.max_lifetime()) {
                self.inner.discard(entry, "expired").await;
                continue;
            }

            if entry.needs_probe(self.inner.config.health_check_interval()) {
                if !self.inner.connector.is_valid(&mut entry.connection).await {
                    self.inner.discard(entry, "unhealthy").await;
                    continue;
                }
                entry.last_checked_at = Instant::now();
            }

            return Ok(PooledConnection::new(entry, permit, self.inner.clone()));
        }

        let connection = self.inner.connector.connect().await?;
        debug!(pool = %self.inner.name, "opened new pooled connection");

        Ok(PooledConnection::new(
            PoolEntry::new(connection),
            permit,
            self.inner.clone(),
        ))
    }

    /// Returns a connection to the pool. Equivalent to dropping the guard.
    pub fn release(&self, connection: PooledConnection<C>) {
        drop(connection);
    }

    /// Starts probing idle connections every `health_check_interval`.
    ///
    /// The task stops when the pool shuts down or its last handle is dropped. Calling this again
    /// replaces the running task.
    pub fn start_health_checks(&self) {
        let pool = Arc::downgrade(&self.inner);
        let period = self.inner.config.health_check_interval();

        let task = tokio::spawn(async move {
            let mut ticker = tokio::time::interval_at(Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                ticker.tick().await;

                let Some(inner) = Weak::upgrade(&pool) else {
                    break;
                };
                if inner.closed.load(Ordering::Acquire) {
                    break;
                }

                inner.probe_idle().await;
            }
        });

        let previous = self
            .inner
            .health_task
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .replace(task);
        if let Some(previous) = previous {
            previous.abort();
        }
    }

    /// Closes the pool.
    ///
    /// Pending and future acquires fail with [`ErrorKind::PoolClosed`], idle connections are
    /// closed and connections still in use are closed when their guard drops.
    pub async fn shutdown(&self) {
        if self.inner.closed.swap(true, Ordering::AcqRel) {
            return;
        }

        self.inner.permits.close();

        let task = self
            .inner
            .health_task
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(task) = task {
            task.abort();
        }

        let idle: Vec<_> = self.inner.idle().drain(..).collect();
        let closed = idle.len();
        for entry in idle {
            self.inner.connector.close(entry.connection).await;
        }

        info!(pool = %self.inner.name, closed, "connection pool shut down");
    }

    pub fn is_closed(&self) -> bool {
        self.inner.closed.load(Ordering::Acquire)
    }

    pub fn status(&self) -> PoolStatus {
        let capacity = self.inner.config.capacity;
        let in_use = if self.is_closed() {
            0
        } else {
            capacity.saturating_sub(self.inner.permits.available_permits())
        };

        PoolStatus {
            capacity,
            idle: self.inner.idle().len(),
            in_use,
        }
    }
}

/// A connection checked out of a [`ConnectionPool`].
///
/// Dropping the guard returns the connection to the pool on every exit path, unless it was
/// [`invalidate`](PooledConnection::invalidate)d or the pool shut down, in which case it is
/// closed.
pub struct PooledConnection<C: Connector> {
    entry: Option<PoolEntry<C::Connection>>,
    pool: Arc<PoolInner<C>>,
    healthy: bool,
    // Dropped after `entry` is back in the idle set.
    _permit: OwnedSemaphorePermit,
}

impl<C: Connector> PooledConnection<C> {
    fn new(
        entry: PoolEntry<C::Connection>,
        permit: OwnedSemaphorePermit,
        pool: Arc<PoolInner<C>>,
    ) -> Self {
        Self {
            entry: Some(entry),
            pool,
            healthy: true,
            _permit: permit,
        }
    }

    /// Marks the connection as broken so it is closed instead of recycled.
    pub fn invalidate(&mut self) {
        self.healthy = false;
    }

    pub fn is_healthy(&self) -> bool {
        self.healthy
    }
}

impl<C: Connector> std::fmt::Debug for PooledConnection<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PooledConnection")
            .field("pool", &self.pool.name)
            .field("healthy", &self.healthy)
            .field("age", &self.entry.as_ref().map(|entry| entry.created_at.elapsed()))
            .finish()
    }
}

impl<C: Connector> Deref for PooledConnection<C> {
    type Target = C::Connection;

    fn deref(&self) -> &Self::Target {
        match &self.entry {
            Some(entry) => &entry.connection,
            None => unreachable!("pooled connection accessed after release"),
        }
    }
}

impl<C: Connector> DerefMut for PooledConnection<C> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        match &mut self.entry {
            Some(entry) => &mut entry.connection,
            None => unreachable!("pooled connection accessed after release"),
        }
    }
}

impl<C: Connector> Drop for PooledConnection<C> {
    fn drop(&mut self) {
        let Some(entry) = self.entry.take() else {
            return;
        };

        if self.healthy && !self.pool.closed.load(Ordering::Acquire) {
            self.pool.idle().push_back(entry);
            return;
        }

        let reason = if self.healthy { "closed" } else { "invalidated" };
        match Handle::try_current() {
            Ok(handle) => {
                let pool = self.pool.clone();
                handle.spawn(async move { pool.discard(entry, reason).await });
            }
            Err(_) => drop(entry),
        }
    }
}
