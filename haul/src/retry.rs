//! Whole-attempt retry decisions with exponential backoff.
//!
//! Classification relies only on the [`crate::error::ErrorCategory`] of each error kind:
//! connection failures and pool exhaustion are retried, everything else is fatal.

use std::time::Duration;

use haul_config::shared::RetryConfig;
use rand::Rng;

use crate::error::{ErrorKind, HaulError};
use crate::haul_error;

/// Whether an error allows another attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDirective {
    Retry,
    Fatal,
}

/// Outcome of [`RetryPolicy::decide`].
#[derive(Debug)]
pub enum RetryDecision {
    /// Sleep for `delay`, then start a new attempt.
    Retry { error: HaulError, delay: Duration },
    /// Stop and report `error`.
    Fatal(HaulError),
}

/// Attempts consumed by one run.
///
/// Reset only when a whole run succeeded, never between attempts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RetryBudget {
    attempts: u32,
}

impl RetryBudget {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records the start of an attempt and returns its 1-based number.
    pub fn record_attempt(&mut self) -> u32 {
        self.attempts = self.attempts.saturating_add(1);
        self.attempts
    }

    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    pub fn reset(&mut self) {
        self.attempts = 0;
    }
}

#[derive(Debug, Clone)]
pub struct RetryPolicy {
    config: RetryConfig,
}

impl RetryPolicy {
    pub fn new(config: RetryConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &RetryConfig {
        &self.config
    }

    pub fn max_attempts(&self) -> u32 {
        self.config.max_attempts
    }

    /// Classifies `error`. An aggregate is retryable only if every error in it is.
    pub fn classify(&self, error: &HaulError) -> RetryDirective {
        let kinds = error.kinds();
        if !kinds.is_empty() && kinds.iter().all(|kind| kind.category().is_retryable()) {
            RetryDirective::Retry
        } else {
            RetryDirective::Fatal
        }
    }

    /// Returns the delay to wait after the failed attempt number `attempt` (1-based).
    ///
    /// The delay is `initial_delay * multiplier^(attempt - 1)`, capped at `max_delay`, then
    /// reduced by a random fraction of at most `jitter`. With a jitter of zero the result is
    /// deterministic.
    pub fn next_delay(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(i32::MAX as u32) as i32;
        let base_delay_ms =
            self.config.initial_delay_ms as f64 * self.config.backoff_multiplier.powi(exponent);
        let capped_delay_ms = base_delay_ms.min(self.config.max_delay_ms as f64);

        let jitter = self.config.jitter.clamp(0.0, 1.0);
        let jittered_delay_ms = if jitter > 0.0 {
            let factor = rand::rng().random_range(0.0..=jitter);
            capped_delay_ms * (1.0 - factor)
        } else {
            capped_delay_ms
        };

        Duration::from_millis(jittered_delay_ms as u64)
    }

    /// Decides what follows the failure of an attempt, given the attempts already consumed.
    ///
    /// A retryable error on the last allowed attempt becomes fatal and is wrapped in
    /// [`ErrorKind::RetryExhausted`] with the original error as source.
    pub fn decide(&self, error: HaulError, budget: &RetryBudget) -> RetryDecision {
        if self.classify(&error) == RetryDirective::Fatal {
            return RetryDecision::Fatal(error);
        }

        let attempts = budget.attempts();
        if attempts >= self.config.max_attempts {
            let exhausted = haul_error!(
                ErrorKind::RetryExhausted,
                "Retryable error persisted after all attempts",
                format!("gave up after {attempts} attempts"),
                source: error
            );

            return RetryDecision::Fatal(exhausted);
        }

        RetryDecision::Retry {
            delay: self.next_delay(attempts),
            error,
        }
    }
}
