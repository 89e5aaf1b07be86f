use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use haul::RunMode;
use haul::error::{ErrorKind, HaulResult};
use haul::journal::MemoryJournal;
use haul::mover::{Mover, RunStatus};
use haul::pool::{ConnectionPool, PoolRegistry, PoolStatus};
use haul::store::{Completion, Store};
use haul::test_utils::connector::TestConnector;
use haul::test_utils::data::{orders_flow, orders_home};
use haul::types::Batch;
use haul_config::shared::PoolConfig;
use haul_telemetry::tracing::init_test_tracing;
use uuid::Uuid;

const WAREHOUSE: &str = "warehouse";

fn pool_config(capacity: usize) -> PoolConfig {
    PoolConfig {
        capacity,
        acquire_timeout_ms: 50,
        max_lifetime_ms: 60_000,
        health_check_interval_ms: 10,
    }
}

/// Store that checks a connection out of the `warehouse` pool for every write.
#[derive(Debug, Clone, Default)]
struct PooledStore {
    pool: Option<ConnectionPool<TestConnector>>,
    rows: Arc<AtomicU64>,
}

impl Store for PooledStore {
    fn name(&self) -> &str {
        "pooled"
    }

    fn set_pool(&mut self, registry: &PoolRegistry) -> HaulResult<()> {
        self.pool = Some(registry.require(WAREHOUSE)?);
        Ok(())
    }

    async fn write(&self, batch: Batch) -> HaulResult<()> {
        let Some(pool) = &self.pool else {
            panic!("pool was not set");
        };

        let _connection = pool.acquire().await?;
        self.rows
            .fetch_add(batch.row_count() as u64, Ordering::AcqRel);

        Ok(())
    }

    async fn finish(&self) -> HaulResult<Completion> {
        Ok(Completion::Settled)
    }
}

#[tokio::test(flavor = "multi_thread")]
async fn exhausted_pool_times_out_and_recovers_on_release() {
    init_test_tracing();

    let connector = TestConnector::new();
    let pool = ConnectionPool::new(WAREHOUSE, connector.clone(), pool_config(2)).unwrap();

    let first = pool.acquire().await.unwrap();
    let second = pool.acquire().await.unwrap();
    assert_ne!(first.id, second.id);

    let err = pool.acquire().await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::PoolExhausted);

    let first_id = first.id;
    pool.release(first);
    let third = pool.acquire().await.unwrap();

    assert_eq!(third.id, first_id);
    assert_eq!(connector.created(), 2);
    assert_eq!(
        pool.status(),
        PoolStatus {
            capacity: 2,
            idle: 0,
            in_use: 2
        }
    );
}

#[tokio::test(flavor = "multi_thread")]
async fn dead_idle_connections_are_replaced() {
    init_test_tracing();

    let connector = TestConnector::new();
    let pool = ConnectionPool::new(WAREHOUSE, connector.clone(), pool_config(1)).unwrap();

    drop(pool.acquire().await.unwrap());
    connector.set_connections_valid(false);
    tokio::time::sleep(Duration::from_millis(20)).await;

    let connection = pool.acquire().await.unwrap();
    assert_eq!(connection.id, 2);
    assert_eq!(connector.closed(), 1);
    assert!(connector.probes() >= 1);
}

#[tokio::test(flavor = "multi_thread")]
async fn expired_connections_are_closed_before_reuse() {
    init_test_tracing();

    let connector = TestConnector::new();
    let config = PoolConfig {
        max_lifetime_ms: 5,
        health_check_interval_ms: 60_000,
        ..pool_config(1)
    };
    let pool = ConnectionPool::new(WAREHOUSE, connector.clone(), config).unwrap();

    drop(pool.acquire().await.unwrap());
    tokio::time::sleep(Duration::from_millis(20)).await;

    let connection = pool.acquire().await.unwrap();
    assert_eq!(connection.id, 2);
    assert_eq!(connector.closed(), 1);
    assert_eq!(connector.probes(), 0);
}

#[tokio::test(flavor = "multi_thread")]
async fn health_checks_discard_dead_idle_connections() {
    init_test_tracing();

    let connector = TestConnector::new();
    let pool = ConnectionPool::new(WAREHOUSE, connector.clone(), pool_config(1)).unwrap();
    pool.start_health_checks();

    drop(pool.acquire().await.unwrap());
    connector.set_connections_valid(false);

    let mut waited = Duration::ZERO;
    while connector.closed() == 0 && waited < Duration::from_secs(5) {
        tokio::time::sleep(Duration::from_millis(10)).await;
        waited += Duration::from_millis(10);
    }

    assert_eq!(connector.closed(), 1);
    assert_eq!(pool.status().idle, 0);

    pool.shutdown().await;
}

#[tokio::test(flavor = "multi_thread")]
async fn registry_hands_pools_to_stores() {
    init_test_tracing();

    let connector = TestConnector::new();
    let registry = PoolRegistry::new();
    registry
        .register(ConnectionPool::new(WAREHOUSE, connector.clone(), pool_config(1)).unwrap())
        .unwrap();

    let duplicate = ConnectionPool::new(WAREHOUSE, TestConnector::new(), pool_config(1)).unwrap();
    assert_eq!(
        registry.register(duplicate).unwrap_err().kind(),
        ErrorKind::ConfigError
    );
    assert_eq!(registry.names(), vec![WAREHOUSE.to_string()]);

    let store = PooledStore::default();
    let mover = Mover::new(
        &orders_flow(RunMode::FullDrop),
        orders_home(4, 25),
        store.clone(),
        MemoryJournal::new(),
        &registry,
    )
    .unwrap();

    let result = mover.run(mover.context(Uuid::new_v4())).await;
    assert_eq!(result.status, RunStatus::Succeeded);
    assert_eq!(mover.store().rows.load(Ordering::Acquire), 100);

    // One connection served every write.
    assert_eq!(connector.created(), 1);

    registry.shutdown_all().await;
    let pool = registry.require::<TestConnector>(WAREHOUSE).unwrap();
    assert!(pool.is_closed());
    assert_eq!(pool.acquire().await.unwrap_err().kind(), ErrorKind::PoolClosed);
}

#[tokio::test(flavor = "multi_thread")]
async fn missing_pool_is_a_configuration_error() {
    init_test_tracing();

    let err = Mover::new(
        &orders_flow(RunMode::FullDrop),
        orders_home(1, 1),
        PooledStore::default(),
        MemoryJournal::new(),
        &PoolRegistry::new(),
    )
    .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::ConfigError);
}
