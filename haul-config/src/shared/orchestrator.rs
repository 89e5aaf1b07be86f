use serde::{Deserialize, Serialize};

use crate::shared::ValidationError;

/// Settings for running many movers in one invocation.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct OrchestratorConfig {
    /// Maximum number of movers holding a concurrency slot at the same time.
    #[serde(default = "default_max_concurrent_movers")]
    pub max_concurrent_movers: usize,
    /// Whether the mirror is published once all movers finished.
    #[serde(default = "default_publish_mirror")]
    pub publish_mirror: bool,
}

impl OrchestratorConfig {
    pub const DEFAULT_MAX_CONCURRENT_MOVERS: usize = 4;

    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.max_concurrent_movers == 0 {
            return Err(ValidationError::invalid(
                "orchestrator.max_concurrent_movers",
                "must be greater than 0",
            ));
        }

        Ok(())
    }
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            max_concurrent_movers: default_max_concurrent_movers(),
            publish_mirror: default_publish_mirror(),
        }
    }
}

fn default_max_concurrent_movers() -> usize {
    OrchestratorConfig::DEFAULT_MAX_CONCURRENT_MOVERS
}

fn default_publish_mirror() -> bool {
    true
}
