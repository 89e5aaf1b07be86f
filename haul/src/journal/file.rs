use std::collections::HashMap;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Arc, LazyLock, PoisonError, Weak};

use metrics::counter;
use serde::de::DeserializeOwned;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

#[cfg(feature = "failpoints")]
use crate::failpoints::{JOURNAL_FLUSH_BEFORE_RENAME, haul_fail_point};
use crate::error::{ErrorKind, HaulError, HaulResult};
use crate::haul_error;
use crate::journal::tables::JournalTables;
use crate::journal::{Journal, JournalSnapshot, RunEvent};
use crate::metrics::{HAUL_JOURNAL_FAILURES_TOTAL, HAUL_JOURNAL_WRITES_TOTAL, TABLE_LABEL};
use crate::types::EntityIdentity;
use crate::watermark::WatermarkState;

/// File holding the run history.
pub const RUN_EVENTS_FILE: &str = "run_events.json";

/// File holding the watermark of every entity.
pub const WATERMARKS_FILE: &str = "watermarks.json";

/// Journals currently open in this process, by canonical directory.
static OPEN_JOURNALS: LazyLock<std::sync::Mutex<HashMap<PathBuf, Weak<Shared>>>> =
    LazyLock::new(Default::default);

#[derive(Debug, Clone, Copy)]
enum Table {
    RunEvents,
    Watermarks,
}

impl Table {
    const ALL: [Table; 2] = [Table::RunEvents, Table::Watermarks];

    fn file_name(self) -> &'static str {
        match self {
            Table::RunEvents => RUN_EVENTS_FILE,
            Table::Watermarks => WATERMARKS_FILE,
        }
    }
}

fn temp_file_name(file_name: &str) -> String {
    format!(".{file_name}.tmp")
}

#[derive(Debug)]
struct State {
    tables: JournalTables,
    events_dirty: bool,
    watermarks_dirty: bool,
}

impl State {
    fn is_dirty(&self, table: Table) -> bool {
        match table {
            Table::RunEvents => self.events_dirty,
            Table::Watermarks => self.watermarks_dirty,
        }
    }

    fn set_dirty(&mut self, table: Table, dirty: bool) {
        match table {
            Table::RunEvents => self.events_dirty = dirty,
            Table::Watermarks => self.watermarks_dirty = dirty,
        }
    }

    fn serialize(&self, table: Table) -> HaulResult<Vec<u8>> {
        let serialized = match table {
            Table::RunEvents => serde_json::to_vec_pretty(self.tables.all_events()),
            Table::Watermarks => serde_json::to_vec_pretty(&self.tables.all_watermarks()),
        };

        serialized.map_err(|err| {
            haul_error!(
                ErrorKind::SerializationError,
                "Journal table could not be serialized",
                table.file_name(),
                source: err
            )
        })
    }
}

#[derive(Debug)]
struct Shared {
    directory: PathBuf,
    /// Serializes every read and write of this journal within the process.
    state: Mutex<State>,
}

/// Journal persisted as two JSON documents in a directory.
///
/// Every write serializes the whole affected table to a temporary file, syncs it and renames it
/// over the previous version, so a crash leaves either the old or the new document, never a
/// torn one. Temporary files left by a crash are removed when the journal is opened.
///
/// Opening the same directory twice in one process returns the same journal while any handle
/// is alive. Sharing a directory between processes is not supported.
#[derive(Debug, Clone)]
pub struct FileJournal {
    shared: Arc<Shared>,
}

impl FileJournal {
    /// Opens the journal stored in `directory`, creating the directory if needed.
    ///
    /// Fails with [`ErrorKind::JournalCorrupted`] if a persisted document cannot be parsed.
    pub fn open(directory: impl AsRef<Path>) -> HaulResult<Self> {
        let directory = directory.as_ref();
        std::fs::create_dir_all(directory)
            .map_err(|err| io_error("Journal directory could not be created", directory, err))?;
        let directory = std::fs::canonicalize(directory)
            .map_err(|err| io_error("Journal directory could not be resolved", directory, err))?;

        let mut open_journals = OPEN_JOURNALS.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(shared) = open_journals.get(&directory).and_then(Weak::upgrade) {
            debug!(directory = %directory.display(), "reusing open journal");
            return Ok(Self { shared });
        }

        remove_stale_temp_files(&directory)?;

        let events: Vec<RunEvent> = read_table(&directory, RUN_EVENTS_FILE)?;
        let watermarks: Vec<WatermarkState> = read_table(&directory, WATERMARKS_FILE)?;
        info!(
            directory = %directory.display(),
            events = events.len(),
            watermarks = watermarks.len(),
            "opened file journal"
        );

        let tables = JournalTables::from_parts(events, watermarks)?;
        let shared = Arc::new(Shared {
            directory: directory.clone(),
            state: Mutex::new(State {
                tables,
                events_dirty: false,
                watermarks_dirty: false,
            }),
        });

        open_journals.retain(|_, journal| journal.strong_count() > 0);
        open_journals.insert(directory, Arc::downgrade(&shared));

        Ok(Self { shared })
    }

    pub fn directory(&self) -> &Path {
        &self.shared.directory
    }

    /// Returns `true` if both handles point to the same open journal.
    pub fn same_journal(&self, other: &FileJournal) -> bool {
        Arc::ptr_eq(&self.shared, &other.shared)
    }

    async fn persist(&self, state: &mut State, table: Table) -> HaulResult<()> {
        let result = match state.serialize(table) {
            Ok(contents) => write_atomic(&self.shared.directory, table.file_name(), &contents).await,
            Err(err) => Err(err),
        };

        match result {
            Ok(()) => {
                state.set_dirty(table, false);
                counter!(HAUL_JOURNAL_WRITES_TOTAL, TABLE_LABEL => table.file_name()).increment(1);

                Ok(())
            }
            Err(err) => {
                state.set_dirty(table, true);
                counter!(HAUL_JOURNAL_FAILURES_TOTAL, TABLE_LABEL => table.file_name())
                    .increment(1);

                Err(err)
            }
        }
    }
}

impl Journal for FileJournal {
    async fn record_event(&self, event: RunEvent) -> HaulResult<()> {
        let mut state = self.shared.state.lock().await;
        state.tables.record_event(event);

        self.persist(&mut state, Table::RunEvents).await
    }

    async fn last_run(&self, identity: &EntityIdentity) -> HaulResult<Option<RunEvent>> {
        Ok(self.shared.state.lock().await.tables.last_run(identity))
    }

    async fn events(&self, identity: &EntityIdentity) -> HaulResult<Vec<RunEvent>> {
        Ok(self.shared.state.lock().await.tables.events(identity))
    }

    async fn get_watermark(&self, identity: &EntityIdentity) -> HaulResult<Option<WatermarkState>> {
        Ok(self.shared.state.lock().await.tables.get_watermark(identity))
    }

    async fn set_watermark(&self, watermark: WatermarkState) -> HaulResult<()> {
        let mut state = self.shared.state.lock().await;
        state.tables.set_watermark(watermark)?;

        self.persist(&mut state, Table::Watermarks).await
    }

    /// Rewrites every table whose last write failed.
    async fn flush(&self) -> HaulResult<()> {
        let mut state = self.shared.state.lock().await;

        let mut errors = Vec::new();
        for table in Table::ALL {
            if state.is_dirty(table)
                && let Err(err) = self.persist(&mut state, table).await
            {
                errors.push(err);
            }
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors.into())
        }
    }

    async fn snapshot(&self) -> HaulResult<JournalSnapshot> {
        Ok(self.shared.state.lock().await.tables.snapshot())
    }
}

fn io_error(description: &'static str, path: &Path, err: io::Error) -> HaulError {
    haul_error!(ErrorKind::JournalIoError, description, path.display(), source: err)
}

fn remove_stale_temp_files(directory: &Path) -> HaulResult<()> {
    for table in Table::ALL {
        let path = directory.join(temp_file_name(table.file_name()));
        match std::fs::remove_file(&path) {
            Ok(()) => warn!(path = %path.display(), "removed stale temporary journal file"),
            Err(err) if err.kind() == io::ErrorKind::NotFound => {}
            Err(err) => {
                return Err(io_error(
                    "Stale temporary journal file could not be removed",
                    &path,
                    err,
                ));
            }
        }
    }

    Ok(())
}

fn read_table<T: DeserializeOwned>(directory: &Path, file_name: &str) -> HaulResult<Vec<T>> {
    let path = directory.join(file_name);
    let contents = match std::fs::read(&path) {
        Ok(contents) => contents,
        Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(err) => return Err(io_error("Journal file could not be read", &path, err)),
    };

    serde_json::from_slice(&contents).map_err(|err| {
        haul_error!(
            ErrorKind::JournalCorrupted,
            "Journal file could not be parsed",
            path.display(),
            source: err
        )
    })
}

/// Replaces `directory/file_name` with `contents` through a synced temporary file and a rename.
///
/// A failure before the rename removes the temporary file and leaves the previous document in
/// place.
async fn write_atomic(directory: &Path, file_name: &str, contents: &[u8]) -> HaulResult<()> {
    let temp_path = directory.join(temp_file_name(file_name));
    let final_path = directory.join(file_name);

    let written = async {
        let mut file = fs::File::create(&temp_path).await?;
        file.write_all(contents).await?;
        file.sync_all().await
    }
    .await;

    if let Err(err) = written {
        let _ = fs::remove_file(&temp_path).await;
        return Err(io_error(
            "Temporary journal file could not be written",
            &temp_path,
            err,
        ));
    }

    // A failure here simulates a crash: the temporary file stays behind.
    #[cfg(feature = "failpoints")]
    haul_fail_point(JOURNAL_FLUSH_BEFORE_RENAME)?;

    if let Err(err) = fs::rename(&temp_path, &final_path).await {
        let _ = fs::remove_file(&temp_path).await;
        return Err(io_error(
            "Journal file could not be replaced",
            &final_path,
            err,
        ));
    }

    sync_directory(directory).await
}

#[cfg(unix)]
async fn sync_directory(directory: &Path) -> HaulResult<()> {
    let synced = async { fs::File::open(directory).await?.sync_all().await }.await;

    synced.map_err(|err| io_error("Journal directory could not be synced", directory, err))
}

#[cfg(not(unix))]
async fn sync_directory(_directory: &Path) -> HaulResult<()> {
    Ok(())
}
