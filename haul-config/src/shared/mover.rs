use serde::{Deserialize, Serialize};

use crate::shared::{RetryConfig, ValidationError};

/// Settings for a single mover's producer/consumer pipeline.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct MoverConfig {
    /// Number of batches that may sit between the producer and the consumer.
    ///
    /// Peak memory per mover is bounded by `queue_capacity` times the batch size of the home.
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,
    /// Whole-attempt retry behavior.
    #[serde(default)]
    pub retry: RetryConfig,
}

impl MoverConfig {
    pub const DEFAULT_QUEUE_CAPACITY: usize = 4;

    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.queue_capacity == 0 {
            return Err(ValidationError::invalid(
                "mover.queue_capacity",
                "must be greater than 0",
            ));
        }

        self.retry.validate()
    }
}

impl Default for MoverConfig {
    fn default() -> Self {
        Self {
            queue_capacity: default_queue_capacity(),
            retry: RetryConfig::default(),
        }
    }
}

fn default_queue_capacity() -> usize {
    MoverConfig::DEFAULT_QUEUE_CAPACITY
}
