use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::RunMode;

/// Identifier shared by every mover started by one orchestrator invocation.
pub type RunId = Uuid;

/// The `(flow, entity)` pair that identifies what a mover moves.
///
/// Always supplied explicitly; never derived from naming conventions.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EntityIdentity {
    flow: String,
    entity: String,
}

impl EntityIdentity {
    pub fn new(flow: impl Into<String>, entity: impl Into<String>) -> Self {
        Self {
            flow: flow.into(),
            entity: entity.into(),
        }
    }

    pub fn flow(&self) -> &str {
        &self.flow
    }

    pub fn entity(&self) -> &str {
        &self.entity
    }
}

impl fmt::Display for EntityIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.flow, self.entity)
    }
}

/// Identifies one execution attempt of a mover.
///
/// Immutable for the life of the attempt. A retry gets a new context through
/// [`RunContext::next_attempt`] which keeps the run id, identity and mode.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunContext {
    run_id: RunId,
    identity: EntityIdentity,
    mode: RunMode,
    attempt: u32,
    started_at: DateTime<Utc>,
}

impl RunContext {
    /// Creates the context of the first attempt.
    pub fn new(run_id: RunId, identity: EntityIdentity, mode: RunMode) -> Self {
        Self {
            run_id,
            identity,
            mode,
            attempt: 1,
            started_at: Utc::now(),
        }
    }

    /// Returns the context of the following attempt, with a fresh start time.
    pub fn next_attempt(&self) -> Self {
        Self {
            run_id: self.run_id,
            identity: self.identity.clone(),
            mode: self.mode,
            attempt: self.attempt + 1,
            started_at: Utc::now(),
        }
    }

    pub fn run_id(&self) -> RunId {
        self.run_id
    }

    pub fn identity(&self) -> &EntityIdentity {
        &self.identity
    }

    pub fn mode(&self) -> RunMode {
        self.mode
    }

    pub fn attempt(&self) -> u32 {
        self.attempt
    }

    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }
}
