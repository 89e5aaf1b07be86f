use haul_config::shared::JournalConfig;

use crate::error::HaulResult;
use crate::journal::{FileJournal, Journal, JournalSnapshot, MemoryJournal, NoopJournal, RunEvent};
use crate::types::EntityIdentity;
use crate::watermark::WatermarkState;

/// Journal backend selected by [`JournalConfig`].
#[derive(Debug, Clone)]
pub enum ConfiguredJournal {
    Disabled(NoopJournal),
    Memory(MemoryJournal),
    File(FileJournal),
}

impl ConfiguredJournal {
    pub fn from_config(config: &JournalConfig) -> HaulResult<Self> {
        config.validate()?;

        let journal = match config {
            JournalConfig::Disabled => ConfiguredJournal::Disabled(NoopJournal),
            JournalConfig::Memory => ConfiguredJournal::Memory(MemoryJournal::new()),
            JournalConfig::File { path } => ConfiguredJournal::File(FileJournal::open(path)?),
        };

        Ok(journal)
    }
}

impl Journal for ConfiguredJournal {
    fn is_enabled(&self) -> bool {
        match self {
            ConfiguredJournal::Disabled(journal) => journal.is_enabled(),
            ConfiguredJournal::Memory(journal) => journal.is_enabled(),
            ConfiguredJournal::File(journal) => journal.is_enabled(),
        }
    }

    async fn record_event(&self, event: RunEvent) -> HaulResult<()> {
        match self {
            ConfiguredJournal::Disabled(journal) => journal.record_event(event).await,
            ConfiguredJournal::Memory(journal) => journal.record_event(event).await,
            ConfiguredJournal::File(journal) => journal.record_event(event).await,
        }
    }

    async fn last_run(&self, identity: &EntityIdentity) -> HaulResult<Option<RunEvent>> {
        match self {
            ConfiguredJournal::Disabled(journal) => journal.last_run(identity).await,
            ConfiguredJournal::Memory(journal) => journal.last_run(identity).await,
            ConfiguredJournal::File(journal) => journal.last_run(identity).await,
        }
    }

    async fn events(&self, identity: &EntityIdentity) -> HaulResult<Vec<RunEvent>> {
        match self {
            ConfiguredJournal::Disabled(journal) => journal.events(identity).await,
            ConfiguredJournal::Memory(journal) => journal.events(identity).await,
            ConfiguredJournal::File(journal) => journal.events(identity).await,
        }
    }

    async fn get_watermark(&self, identity: &EntityIdentity) -> HaulResult<Option<WatermarkState>> {
        match self {
            ConfiguredJournal::Disabled(journal) => journal.get_watermark(identity).await,
            ConfiguredJournal::Memory(journal) => journal.get_watermark(identity).await,
            ConfiguredJournal::File(journal) => journal.get_watermark(identity).await,
        }
    }

    async fn set_watermark(&self, state: WatermarkState) -> HaulResult<()> {
        match self {
            ConfiguredJournal::Disabled(journal) => journal.set_watermark(state).await,
            ConfiguredJournal::Memory(journal) => journal.set_watermark(state).await,
            ConfiguredJournal::File(journal) => journal.set_watermark(state).await,
        }
    }

    async fn flush(&self) -> HaulResult<()> {
        match self {
            ConfiguredJournal::Disabled(journal) => journal.flush().await,
            ConfiguredJournal::Memory(journal) => journal.flush().await,
            ConfiguredJournal::File(journal) => journal.flush().await,
        }
    }

    async fn snapshot(&self) -> HaulResult<JournalSnapshot> {
        match self {
            ConfiguredJournal::Disabled(journal) => journal.snapshot().await,
            ConfiguredJournal::Memory(journal) => journal.snapshot().await,
            ConfiguredJournal::File(journal) => journal.snapshot().await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn disabled_journal_is_not_enabled() {
        let journal = ConfiguredJournal::from_config(&JournalConfig::Disabled).unwrap();
        assert!(!journal.is_enabled());

        let journal = ConfiguredJournal::from_config(&JournalConfig::Memory).unwrap();
        assert!(journal.is_enabled());
    }
}
