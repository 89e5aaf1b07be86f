use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::shared::ValidationError;

/// Selects the journal backend.
///
/// With [`JournalConfig::Disabled`] every journal operation is a no-op: run history is not kept
/// and incremental flows always read their full dataset.
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum JournalConfig {
    #[default]
    Disabled,
    /// Keeps history in process memory only.
    Memory,
    /// Persists history as JSON documents inside `path`.
    File { path: PathBuf },
}

impl JournalConfig {
    pub fn is_enabled(&self) -> bool {
        !matches!(self, JournalConfig::Disabled)
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        match self {
            JournalConfig::File { path } if path.as_os_str().is_empty() => {
                Err(ValidationError::MissingPath("journal"))
            }
            _ => Ok(()),
        }
    }
}
