use std::future::Future;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};

use haul_config::shared::MirrorConfig;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::bail;
use crate::error::{ErrorKind, HaulError, HaulResult};
#[cfg(feature = "failpoints")]
use crate::failpoints::{MIRROR_BEFORE_SWAP, haul_fail_point};
use crate::haul_error;
use crate::mirror::MirrorSnapshot;

/// File holding the manifest of every published table.
pub const MANIFEST_FILE: &str = "_manifest.json";

/// File naming the currently published version directory.
const CURRENT_FILE: &str = "CURRENT";

const VERSION_PREFIX: &str = "v-";

/// Destination of a mirror publication.
///
/// `replace_all` receives every table at once and must replace the previous publication
/// without exposing a partial or empty state.
pub trait MirrorTarget {
    fn replace_all(&self, snapshot: &MirrorSnapshot)
    -> impl Future<Output = HaulResult<()>> + Send;
}

fn io_error(description: &'static str, path: &Path, err: io::Error) -> HaulError {
    haul_error!(ErrorKind::IoError, description, path.display(), source: err)
}

async fn write_synced(path: &Path, contents: &[u8]) -> io::Result<()> {
    let mut file = fs::File::create(path).await?;
    file.write_all(contents).await?;
    file.sync_all().await
}

/// Publishes the mirror as JSON lines files under a directory.
///
/// Every publication is written to a fresh `v-<id>` directory holding one `<table>.jsonl` per
/// table and [`MANIFEST_FILE`]. The `CURRENT` file is then replaced atomically to point at it,
/// and older versions are removed. Readers resolve the published copy through
/// [`DirectoryMirrorTarget::current_dir`].
#[derive(Debug, Clone)]
pub struct DirectoryMirrorTarget {
    root: PathBuf,
}

impl DirectoryMirrorTarget {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Returns the directory of the currently published version, if any.
    ///
    /// The returned directory stays readable until the next publication after the one that
    /// replaces it.
    pub async fn current_dir(&self) -> HaulResult<Option<PathBuf>> {
        Ok(self
            .current_version()
            .await?
            .map(|version| self.root.join(version)))
    }

    async fn current_version(&self) -> HaulResult<Option<String>> {
        let pointer = self.root.join(CURRENT_FILE);
        match fs::read_to_string(&pointer).await {
            Ok(version) => Ok(Some(version.trim().to_string())),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(err) => Err(io_error("Mirror pointer could not be read", &pointer, err)),
        }
    }

    async fn write_version(&self, version_dir: &Path, snapshot: &MirrorSnapshot) -> HaulResult<()> {
        fs::create_dir_all(version_dir)
            .await
            .map_err(|err| io_error("Mirror version directory could not be created", version_dir, err))?;

        for table in &snapshot.tables {
            let path = version_dir.join(format!("{}.jsonl", table.name));
            write_synced(&path, &table.to_json_lines()?)
                .await
                .map_err(|err| io_error("Mirror table could not be written", &path, err))?;
        }

        let manifest = serde_json::to_vec_pretty(&snapshot.manifest()).map_err(|err| {
            haul_error!(
                ErrorKind::SerializationError,
                "Mirror manifest could not be serialized",
                source: err
            )
        })?;
        let path = version_dir.join(MANIFEST_FILE);
        write_synced(&path, &manifest)
            .await
            .map_err(|err| io_error("Mirror manifest could not be written", &path, err))
    }

    async fn swap_current(&self, version: &str) -> HaulResult<()> {
        let temp = self.root.join(format!(".{CURRENT_FILE}.tmp"));
        let pointer = self.root.join(CURRENT_FILE);

        write_synced(&temp, version.as_bytes())
            .await
            .map_err(|err| io_error("Mirror pointer could not be written", &temp, err))?;

        if let Err(err) = fs::rename(&temp, &pointer).await {
            let _ = fs::remove_file(&temp).await;
            return Err(io_error("Mirror pointer could not be replaced", &pointer, err));
        }

        Ok(())
    }

    /// Removes every version directory not named in `keep`. Failures are only logged.
    async fn remove_old_versions(&self, keep: &[&str]) {
        let mut entries = match fs::read_dir(&self.root).await {
            Ok(entries) => entries,
            Err(err) => {
                warn!(root = %self.root.display(), error = %err, "could not list mirror versions");
                return;
            }
        };

        loop {
            let entry = match entries.next_entry().await {
                Ok(Some(entry)) => entry,
                Ok(None) => break,
                Err(err) => {
                    warn!(root = %self.root.display(), error = %err, "could not list mirror versions");
                    break;
                }
            };

            let name = entry.file_name();
            let Some(name) = name.to_str() else {
                continue;
            };
            if !name.starts_with(VERSION_PREFIX) || keep.contains(&name) {
                continue;
            }

            if let Err(err) = fs::remove_dir_all(entry.path()).await {
                warn!(path = %entry.path().display(), error = %err, "could not remove old mirror version");
            }
        }
    }
}

impl MirrorTarget for DirectoryMirrorTarget {
    async fn replace_all(&self, snapshot: &MirrorSnapshot) -> HaulResult<()> {
        let version = format!("{VERSION_PREFIX}{}", Uuid::new_v4().simple());
        let version_dir = self.root.join(&version);
        let previous = self.current_version().await?;

        let staged = self.write_version(&version_dir, snapshot).await;

        #[cfg(feature = "failpoints")]
        let staged = staged.and_then(|()| haul_fail_point(MIRROR_BEFORE_SWAP));

        let swapped = match staged {
            Ok(()) => self.swap_current(&version).await,
            Err(err) => Err(err),
        };

        if let Err(err) = swapped {
            let _ = fs::remove_dir_all(&version_dir).await;
            return Err(err);
        }

        debug!(root = %self.root.display(), %version, "mirror version published");
        // Readers may still hold the version that was current until now.
        let mut keep = vec![version.as_str()];
        keep.extend(previous.as_deref());
        self.remove_old_versions(&keep).await;

        Ok(())
    }
}

#[derive(Debug, Default)]
struct MemoryTargetInner {
    publishes: Vec<MirrorSnapshot>,
    fail_next: bool,
}

/// In-memory mirror target for tests.
///
/// Cloning shares the recorded publications.
#[derive(Debug, Clone, Default)]
pub struct MemoryMirrorTarget {
    inner: Arc<Mutex<MemoryTargetInner>>,
}

impl MemoryMirrorTarget {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes the next `replace_all` fail without recording anything.
    pub fn fail_next_publish(&self) {
        self.inner
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .fail_next = true;
    }

    pub fn publishes(&self) -> Vec<MirrorSnapshot> {
        self.inner
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .publishes
            .clone()
    }

    pub fn latest(&self) -> Option<MirrorSnapshot> {
        self.inner
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .publishes
            .last()
            .cloned()
    }
}

impl MirrorTarget for MemoryMirrorTarget {
    async fn replace_all(&self, snapshot: &MirrorSnapshot) -> HaulResult<()> {
        let mut inner = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        if inner.fail_next {
            inner.fail_next = false;
            bail!(
                ErrorKind::IoError,
                "Memory mirror target was told to fail"
            );
        }

        inner.publishes.push(snapshot.clone());

        Ok(())
    }
}

/// Mirror target selected by [`MirrorConfig`].
#[derive(Debug, Clone)]
pub enum ConfiguredMirrorTarget {
    Directory(DirectoryMirrorTarget),
    Memory(MemoryMirrorTarget),
}

impl ConfiguredMirrorTarget {
    /// Returns `None` when the mirror is disabled.
    pub fn from_config(config: &MirrorConfig) -> HaulResult<Option<Self>> {
        config.validate()?;

        let target = match config {
            MirrorConfig::Disabled => None,
            MirrorConfig::Memory => Some(ConfiguredMirrorTarget::Memory(MemoryMirrorTarget::new())),
            MirrorConfig::Directory { path } => Some(ConfiguredMirrorTarget::Directory(
                DirectoryMirrorTarget::new(path.clone()),
            )),
        };

        Ok(target)
    }
}

impl MirrorTarget for ConfiguredMirrorTarget {
    async fn replace_all(&self, snapshot: &MirrorSnapshot) -> HaulResult<()> {
        match self {
            ConfiguredMirrorTarget::Directory(target) => target.replace_all(snapshot).await,
            ConfiguredMirrorTarget::Memory(target) => target.replace_all(snapshot).await,
        }
    }
}
