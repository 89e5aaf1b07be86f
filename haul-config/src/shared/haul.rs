use std::collections::{BTreeMap, HashSet};

use serde::{Deserialize, Serialize};

use crate::load::Config;
use crate::shared::{
    FlowConfig, JournalConfig, MirrorConfig, OrchestratorConfig, PoolConfig, ValidationError,
};

/// Top-level configuration of a `haul` deployment.
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
pub struct HaulConfig {
    #[serde(default)]
    pub journal: JournalConfig,
    #[serde(default)]
    pub mirror: MirrorConfig,
    #[serde(default)]
    pub orchestrator: OrchestratorConfig,
    /// Named connection pools that stores can look up by name.
    #[serde(default)]
    pub pools: BTreeMap<String, PoolConfig>,
    #[serde(default)]
    pub flows: Vec<FlowConfig>,
}

impl HaulConfig {
    /// Validates every section and rejects duplicate entity identities.
    pub fn validate(&self) -> Result<(), ValidationError> {
        self.journal.validate()?;
        self.mirror.validate()?;
        self.orchestrator.validate()?;

        for pool in self.pools.values() {
            pool.validate()?;
        }

        let mut seen = HashSet::new();
        for flow in &self.flows {
            flow.validate()?;

            if !seen.insert((flow.flow_name.as_str(), flow.entity_name.as_str())) {
                return Err(ValidationError::DuplicateEntity {
                    flow_name: flow.flow_name.clone(),
                    entity_name: flow.entity_name.clone(),
                });
            }
        }

        Ok(())
    }

    /// Returns the configuration of the pool named `name`, if any.
    pub fn pool(&self, name: &str) -> Option<&PoolConfig> {
        self.pools.get(name)
    }
}

impl Config for HaulConfig {
    const LIST_PARSE_KEYS: &'static [&'static str] = &[];
}
