use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::shared::ValidationError;

/// Retry behavior applied to whole mover attempts.
///
/// The delay before attempt `n + 1` is `initial_delay_ms * backoff_multiplier^(n - 1)`, capped at
/// `max_delay_ms`, then shortened by a random fraction in `[0, jitter]` so the cap always holds.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct RetryConfig {
    /// Maximum number of attempts, including the first one.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    /// Delay before the second attempt, in milliseconds.
    #[serde(default = "default_initial_delay_ms")]
    pub initial_delay_ms: u64,
    /// Upper bound for any single delay, in milliseconds.
    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,
    /// Growth factor between consecutive delays. Must be >= 1.0.
    #[serde(default = "default_backoff_multiplier")]
    pub backoff_multiplier: f64,
    /// Maximum proportional jitter in `[0.0, 1.0]`. Zero disables jitter.
    #[serde(default = "default_jitter")]
    pub jitter: f64,
}

impl RetryConfig {
    pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;
    pub const DEFAULT_INITIAL_DELAY_MS: u64 = 1000;
    pub const DEFAULT_MAX_DELAY_MS: u64 = 30_000;
    pub const DEFAULT_BACKOFF_MULTIPLIER: f64 = 2.0;
    pub const DEFAULT_JITTER: f64 = 0.3;

    pub fn initial_delay(&self) -> Duration {
        Duration::from_millis(self.initial_delay_ms)
    }

    pub fn max_delay(&self) -> Duration {
        Duration::from_millis(self.max_delay_ms)
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.max_attempts == 0 {
            return Err(ValidationError::invalid(
                "retry.max_attempts",
                "must be greater than 0",
            ));
        }

        if self.backoff_multiplier < 1.0 {
            return Err(ValidationError::invalid(
                "retry.backoff_multiplier",
                "must be greater than or equal to 1.0",
            ));
        }

        if !(0.0..=1.0).contains(&self.jitter) {
            return Err(ValidationError::invalid(
                "retry.jitter",
                "must be between 0.0 and 1.0",
            ));
        }

        if self.initial_delay_ms > self.max_delay_ms {
            return Err(ValidationError::invalid(
                "retry.initial_delay_ms",
                "must not exceed `retry.max_delay_ms`",
            ));
        }

        Ok(())
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            initial_delay_ms: default_initial_delay_ms(),
            max_delay_ms: default_max_delay_ms(),
            backoff_multiplier: default_backoff_multiplier(),
            jitter: default_jitter(),
        }
    }
}

fn default_max_attempts() -> u32 {
    RetryConfig::DEFAULT_MAX_ATTEMPTS
}

fn default_initial_delay_ms() -> u64 {
    RetryConfig::DEFAULT_INITIAL_DELAY_MS
}

fn default_max_delay_ms() -> u64 {
    RetryConfig::DEFAULT_MAX_DELAY_MS
}

fn default_backoff_multiplier() -> f64 {
    RetryConfig::DEFAULT_BACKOFF_MULTIPLIER
}

fn default_jitter() -> f64 {
    RetryConfig::DEFAULT_JITTER
}
