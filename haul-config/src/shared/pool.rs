use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::shared::ValidationError;

/// Connection pool sizing and lifecycle settings.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct PoolConfig {
    /// Maximum number of live connections.
    #[serde(default = "default_capacity")]
    pub capacity: usize,
    /// How long `acquire` waits for a free slot before failing with `PoolExhausted`.
    #[serde(default = "default_acquire_timeout_ms")]
    pub acquire_timeout_ms: u64,
    /// Maximum age of a connection before it is closed and replaced, so that credentials and
    /// tokens are refreshed.
    #[serde(default = "default_max_lifetime_ms")]
    pub max_lifetime_ms: u64,
    /// Interval between liveness probes of idle connections.
    #[serde(default = "default_health_check_interval_ms")]
    pub health_check_interval_ms: u64,
}

impl PoolConfig {
    pub const DEFAULT_CAPACITY: usize = 4;
    pub const DEFAULT_ACQUIRE_TIMEOUT_MS: u64 = 30_000;
    pub const DEFAULT_MAX_LIFETIME_MS: u64 = 60 * 60 * 1000;
    pub const DEFAULT_HEALTH_CHECK_INTERVAL_MS: u64 = 30_000;

    pub fn acquire_timeout(&self) -> Duration {
        Duration::from_millis(self.acquire_timeout_ms)
    }

    pub fn max_lifetime(&self) -> Duration {
        Duration::from_millis(self.max_lifetime_ms)
    }

    pub fn health_check_interval(&self) -> Duration {
        Duration::from_millis(self.health_check_interval_ms)
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.capacity == 0 {
            return Err(ValidationError::invalid(
                "pool.capacity",
                "must be greater than 0",
            ));
        }

        if self.health_check_interval_ms == 0 {
            return Err(ValidationError::invalid(
                "pool.health_check_interval_ms",
                "must be greater than 0",
            ));
        }

        Ok(())
    }
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            capacity: default_capacity(),
            acquire_timeout_ms: default_acquire_timeout_ms(),
            max_lifetime_ms: default_max_lifetime_ms(),
            health_check_interval_ms: default_health_check_interval_ms(),
        }
    }
}

fn default_capacity() -> usize {
    PoolConfig::DEFAULT_CAPACITY
}

fn default_acquire_timeout_ms() -> u64 {
    PoolConfig::DEFAULT_ACQUIRE_TIMEOUT_MS
}

fn default_max_lifetime_ms() -> u64 {
    PoolConfig::DEFAULT_MAX_LIFETIME_MS
}

fn default_health_check_interval_ms() -> u64 {
    PoolConfig::DEFAULT_HEALTH_CHECK_INTERVAL_MS
}
