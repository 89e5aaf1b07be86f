//! The `orders` fixture: an integer key, a customer, an amount and an update timestamp.

use std::sync::Arc;

use bigdecimal::BigDecimal;
use chrono::{DateTime, Duration, TimeZone, Utc};
use haul_config::shared::{FlowConfig, MoverConfig, RetryConfig, WatermarkConfig};

use crate::home::memory::MemoryHome;
use crate::types::{Batch, BatchSchema, Cell, ColumnSchema, ColumnType, TableRow};
use crate::{RunMode, WatermarkKind};

pub const ORDERS_FLOW: &str = "crm";
pub const ORDERS_ENTITY: &str = "orders";

pub fn orders_schema() -> Arc<BatchSchema> {
    let schema = BatchSchema::try_new(vec![
        ColumnSchema::new("id", ColumnType::Integer, false).primary_key(),
        ColumnSchema::new("customer", ColumnType::String, false),
        ColumnSchema::new("amount", ColumnType::Numeric, true),
        ColumnSchema::new("updated_at", ColumnType::TimestampTz, false),
    ])
    .unwrap();

    Arc::new(schema)
}

/// Update timestamp of order `id`: one second per id after a fixed epoch.
pub fn order_updated_at(id: i64) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap() + Duration::seconds(id)
}

pub fn order_row(id: i64) -> TableRow {
    TableRow::new(vec![
        Cell::I64(id),
        Cell::String(format!("customer-{}", id % 17)),
        Cell::Numeric(BigDecimal::from(id * 3)),
        Cell::TimestampTz(order_updated_at(id)),
    ])
}

/// Builds `batches` batches of `rows_per_batch` orders with ids starting at `first_id`.
pub fn orders_batches(first_id: i64, batches: usize, rows_per_batch: usize) -> Vec<Batch> {
    let schema = orders_schema();

    (0..batches)
        .map(|batch| {
            let start = first_id + (batch * rows_per_batch) as i64;
            let rows = (start..start + rows_per_batch as i64).map(order_row).collect();
            Batch::try_new(schema.clone(), rows).unwrap()
        })
        .collect()
}

pub fn orders_home(batches: usize, rows_per_batch: usize) -> MemoryHome {
    MemoryHome::try_new(
        ORDERS_ENTITY,
        orders_schema(),
        orders_batches(1, batches, rows_per_batch),
    )
    .unwrap()
}

/// Retries quickly so retry tests do not sleep for long.
pub fn fast_retry(max_attempts: u32) -> RetryConfig {
    RetryConfig {
        max_attempts,
        initial_delay_ms: 5,
        max_delay_ms: 20,
        backoff_multiplier: 2.0,
        jitter: 0.0,
    }
}

/// The `crm.orders` flow, watermarked on `updated_at`.
pub fn orders_flow(run_mode: RunMode) -> FlowConfig {
    FlowConfig {
        flow_name: ORDERS_FLOW.to_string(),
        entity_name: ORDERS_ENTITY.to_string(),
        run_mode,
        watermark: Some(WatermarkConfig {
            column: "updated_at".to_string(),
            kind: WatermarkKind::Timestamp,
        }),
        primary_key: vec!["id".to_string()],
        mover: MoverConfig {
            queue_capacity: 2,
            retry: fast_retry(3),
        },
    }
}

/// A flow with no watermark, for entities other than `orders`.
pub fn plain_flow(entity_name: &str, run_mode: RunMode) -> FlowConfig {
    FlowConfig {
        entity_name: entity_name.to_string(),
        watermark: None,
        ..orders_flow(run_mode)
    }
}
