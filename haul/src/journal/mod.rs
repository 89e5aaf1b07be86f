//! Run history and watermark persistence.
//!
//! The [`Journal`] trait records one event per mover lifecycle step and stores the watermark of
//! each entity. [`FileJournal`] persists both tables as JSON documents replaced atomically on
//! every write, [`MemoryJournal`] keeps them in memory and [`NoopJournal`] disables history.
//! [`ConfiguredJournal`] picks one of them from configuration.

mod base;
mod configured;
mod file;
mod memory;
mod models;
mod noop;
mod tables;

pub use base::Journal;
pub use configured::ConfiguredJournal;
pub use file::{FileJournal, RUN_EVENTS_FILE, WATERMARKS_FILE};
pub use memory::MemoryJournal;
pub use models::{JournalSnapshot, RunEvent, RunEventKind};
pub use noop::NoopJournal;
