use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::shared::ValidationError;

/// Selects where the journal mirror is published.
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum MirrorConfig {
    #[default]
    Disabled,
    /// Keeps publications in process memory only.
    Memory,
    /// Publishes JSON lines files and a schema manifest into `path`.
    Directory { path: PathBuf },
}

impl MirrorConfig {
    pub fn validate(&self) -> Result<(), ValidationError> {
        match self {
            MirrorConfig::Directory { path } if path.as_os_str().is_empty() => {
                Err(ValidationError::MissingPath("mirror"))
            }
            _ => Ok(()),
        }
    }
}
