//! Metric names and labels emitted through the [`metrics`] facade.
//!
//! No recorder is installed by this crate; embedding applications pick their exporter.

/// Label for the flow name.
pub const FLOW_LABEL: &str = "flow";

/// Label for the entity name.
pub const ENTITY_LABEL: &str = "entity";

/// Label for the [`crate::error::ErrorKind`] of a failure.
pub const ERROR_KIND_LABEL: &str = "error_kind";

/// Label for the terminal status of a run.
pub const STATUS_LABEL: &str = "status";

/// Label for a connection pool name.
pub const POOL_LABEL: &str = "pool";

/// Label for the reason a pooled connection was discarded.
pub const REASON_LABEL: &str = "reason";

/// Label for the journal table being written.
pub const TABLE_LABEL: &str = "table";

// Mover metrics

/// Counter of rows written to stores.
pub const HAUL_ROWS_MOVED_TOTAL: &str = "haul_rows_moved_total";

/// Counter of batches written to stores.
pub const HAUL_BATCHES_WRITTEN_TOTAL: &str = "haul_batches_written_total";

/// Counter of mover attempts started.
pub const HAUL_MOVER_ATTEMPTS_TOTAL: &str = "haul_mover_attempts_total";

/// Counter of attempts that failed with a retryable error and were retried.
pub const HAUL_MOVER_RETRIES_TOTAL: &str = "haul_mover_retries_total";

/// Counter of finished runs by status.
pub const HAUL_MOVER_RUNS_TOTAL: &str = "haul_mover_runs_total";

/// Histogram of run durations in seconds.
pub const HAUL_MOVER_DURATION_SECONDS: &str = "haul_mover_duration_seconds";

/// Histogram of the peak number of batches buffered between producer and consumer.
pub const HAUL_MOVER_PEAK_QUEUE_DEPTH: &str = "haul_mover_peak_queue_depth";

// Pool metrics

/// Histogram of time spent waiting for a pooled connection, in seconds.
pub const HAUL_POOL_ACQUIRE_WAIT_SECONDS: &str = "haul_pool_acquire_wait_seconds";

/// Counter of acquires that timed out.
pub const HAUL_POOL_EXHAUSTED_TOTAL: &str = "haul_pool_exhausted_total";

/// Counter of connections closed because they expired or failed a liveness probe.
pub const HAUL_POOL_CONNECTIONS_DISCARDED_TOTAL: &str = "haul_pool_connections_discarded_total";

// Journal and mirror metrics

/// Counter of journal tables persisted to durable storage.
pub const HAUL_JOURNAL_WRITES_TOTAL: &str = "haul_journal_writes_total";

/// Counter of journal operations that failed and were swallowed.
pub const HAUL_JOURNAL_FAILURES_TOTAL: &str = "haul_journal_failures_total";

/// Counter of mirror publications by status.
pub const HAUL_MIRROR_PUBLISHES_TOTAL: &str = "haul_mirror_publishes_total";
